use indexmap::IndexMap;
use obj::{ObjectFile, SymbolDescription, SECTION_NAMES};

use crate::error::LinkError;
use crate::merge::MergePlan;

const TEXT: i16 = 0;
const DATA: i16 = 1;
const BSS: i16 = 2;
const RODATA: i16 = 3;

/// A symbol after placement: its section, absolute address and binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSym {
    /// -1 for still-undefined entries.
    pub section_index: i16,
    pub abs_addr: u32,
    pub bind: u8,
}

fn section_logical_size(object: &ObjectFile, index: i16) -> u32 {
    let Some(section) = object.section(index as usize) else {
        return 0;
    };
    if index == BSS {
        section.bss_size
    } else {
        section.data.len() as u32
    }
}

fn resolve_defined(
    object: &ObjectFile,
    object_index: usize,
    symbol: &SymbolDescription,
    plan: &MergePlan,
) -> Result<ResolvedSym, LinkError> {
    if symbol.section_index < 0 {
        return Ok(ResolvedSym {
            section_index: -1,
            abs_addr: 0,
            bind: symbol.bind,
        });
    }

    let logical_size = section_logical_size(object, symbol.section_index);
    if symbol.value > logical_size {
        return Err(LinkError::SymbolOutsideSection {
            name: symbol.name.clone(),
            offset: symbol.value,
            section: SECTION_NAMES
                .get(symbol.section_index as usize)
                .copied()
                .unwrap_or("<invalid>"),
            size: logical_size,
        });
    }

    let base = match symbol.section_index {
        TEXT => u64::from(plan.layout.text_base) + u64::from(plan.text_offsets[object_index]),
        BSS => u64::from(plan.layout.bss_base) + u64::from(plan.bss_offsets[object_index]),
        RODATA => {
            u64::from(plan.layout.rodata_base) + u64::from(plan.rodata_offsets[object_index])
        }
        DATA => return Err(LinkError::DataSymbol(symbol.name.clone())),
        _ => return Err(LinkError::UnsupportedSymbolSection(symbol.name.clone())),
    };

    let absolute = base + u64::from(symbol.value);
    u32::try_from(absolute)
        .map(|abs_addr| ResolvedSym {
            section_index: symbol.section_index,
            abs_addr,
            bind: symbol.bind,
        })
        .map_err(|_| LinkError::SizeOverflow)
}

fn resolve_for_reloc(
    object: &ObjectFile,
    object_index: usize,
    symbol: &SymbolDescription,
    plan: &MergePlan,
    gsym: &IndexMap<String, ResolvedSym>,
) -> Result<ResolvedSym, LinkError> {
    if symbol.section_index >= 0 {
        return resolve_defined(object, object_index, symbol, plan);
    }

    match gsym.get(&symbol.name) {
        Some(resolved) if resolved.section_index >= 0 => Ok(*resolved),
        _ => Err(LinkError::Undefined(symbol.name.clone())),
    }
}

pub struct RelocResolver;

impl RelocResolver {
    /// Builds the cross-object symbol table: every non-local defined
    /// symbol is registered at its absolute address, one definition per
    /// name; a definition satisfies earlier undefined references. Any
    /// name still undefined afterwards fails the link.
    pub fn build_global_symtab(
        objects: &[ObjectFile],
        plan: &MergePlan,
    ) -> Result<IndexMap<String, ResolvedSym>, LinkError> {
        let mut table: IndexMap<String, ResolvedSym> = IndexMap::new();

        for (object_index, object) in objects.iter().enumerate() {
            for symbol in &object.symbols {
                if symbol.section_index >= 0 {
                    let resolved = resolve_defined(object, object_index, symbol, plan)?;

                    if symbol.bind == 0 {
                        continue; // local definition
                    }

                    match table.get_mut(&symbol.name) {
                        Some(existing) => {
                            if existing.section_index >= 0 {
                                return Err(LinkError::MultipleDefinition(symbol.name.clone()));
                            }
                            *existing = resolved;
                        }
                        None => {
                            table.insert(symbol.name.clone(), resolved);
                        }
                    }
                } else if symbol.bind != 0 {
                    table.entry(symbol.name.clone()).or_insert(ResolvedSym {
                        section_index: -1,
                        abs_addr: 0,
                        bind: symbol.bind,
                    });
                }
            }
        }

        for (name, sym) in &table {
            if sym.section_index < 0 {
                return Err(LinkError::Undefined(name.clone()));
            }
        }

        Ok(table)
    }

    /// Patches every ABS16 relocation into the merged buffers.
    pub fn apply(
        objects: &[ObjectFile],
        plan: &MergePlan,
        gsym: &IndexMap<String, ResolvedSym>,
        text: &mut [u8],
        rodata: &mut [u8],
    ) -> Result<(), LinkError> {
        for (object_index, object) in objects.iter().enumerate() {
            for reloc in &object.reloc_entries {
                let symbol = object
                    .symbols
                    .get(reloc.symbol_index as usize)
                    .ok_or(LinkError::BadSymbolIndex(reloc.symbol_index))?;

                if reloc.section_index != 0 && reloc.section_index != 3 {
                    return Err(LinkError::UnsupportedRelocSection {
                        symbol: symbol.name.clone(),
                        index: reloc.section_index,
                    });
                }

                let resolved = resolve_for_reloc(object, object_index, symbol, plan, gsym)?;

                let (target, base_offset): (&mut [u8], usize) = if reloc.section_index == 0 {
                    (text, plan.text_offsets[object_index] as usize)
                } else {
                    (rodata, plan.rodata_offsets[object_index] as usize)
                };

                let patch_offset = base_offset + reloc.offset as usize;
                if patch_offset + 1 >= target.len() {
                    return Err(LinkError::RelocOutOfBounds(symbol.name.clone()));
                }

                let value = i64::from(resolved.abs_addr) + i64::from(reloc.addend);
                let value16 = u16::try_from(value)
                    .map_err(|_| LinkError::RelocOverflow(symbol.name.clone()))?;

                target[patch_offset..patch_offset + 2].copy_from_slice(&value16.to_be_bytes());
            }
        }
        Ok(())
    }
}
