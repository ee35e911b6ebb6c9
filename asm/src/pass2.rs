use arch::{EncodeTable, Reg};
use obj::{Binding, ObjectFile, RelocEntry, RelocType};

use crate::directive::{self, DataItem, SectionsScratch, WordEntry};
use crate::error::{AsmError, ErrorKind};
use crate::loc::SourceLoc;
use crate::parser::{Arg, Line};
use crate::pass1::{build_signature, Pass1State};
use crate::symtab::SectionType;

/// RAM starts here; `.bss` symbols resolve into RAM.
pub const RAM_BASE: u32 = 0x4000;

/// Section base addresses implied by the pass-1 layout: `.text` at 0,
/// `.rodata` after it, `.data` after that, `.bss` in RAM.
pub fn section_base_address(state: &Pass1State, section: SectionType) -> u32 {
    match section {
        SectionType::Text => 0,
        SectionType::RoData => state.lc_text,
        SectionType::Data => state.lc_text + state.lc_rodata,
        SectionType::Bss => RAM_BASE,
        SectionType::None => 0,
    }
}

struct Resolution {
    value: u16,
    needs_reloc: bool,
}

/// Resolves a symbol reference against the pass-1 layout. Defined
/// symbols yield their provisional absolute address and still request
/// a relocation, so the linker can re-place the section; undefined
/// globals yield a zero placeholder, undefined locals are errors.
fn resolve_symbol(
    state: &Pass1State,
    name: &str,
    loc: &SourceLoc,
) -> Result<Resolution, AsmError> {
    let sym = state
        .symbols
        .find(name)
        .ok_or_else(|| AsmError::new(loc.clone(), ErrorKind::UndefinedSymbol(name.to_string())))?;

    if !sym.defined {
        if sym.bind == Binding::Local {
            return Err(AsmError::new(
                loc.clone(),
                ErrorKind::UndefinedSymbol(name.to_string()),
            ));
        }
        return Ok(Resolution {
            value: 0,
            needs_reloc: true,
        });
    }

    let base = section_base_address(state, sym.section);
    let absolute = u64::from(base) + u64::from(sym.value);
    if absolute > 0xFFFF {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::SymbolAddressOverflow(name.to_string()),
        ));
    }

    Ok(Resolution {
        value: absolute as u16,
        needs_reloc: sym.section != SectionType::None,
    })
}

type PendingTextReloc = (usize, String, SourceLoc);

fn emit_item_into_text(
    state: &Pass1State,
    item: &DataItem,
    text: &mut Vec<u8>,
    pending: &mut Vec<PendingTextReloc>,
) -> Result<(), AsmError> {
    match item {
        DataItem::Byte { bytes, .. }
        | DataItem::Ascii { bytes, .. }
        | DataItem::Asciz { bytes, .. } => text.extend_from_slice(bytes),
        DataItem::Word { words, loc } => {
            for entry in words {
                let value = match entry {
                    WordEntry::Imm(value) => *value,
                    WordEntry::Sym(symbol) => {
                        let resolved = resolve_symbol(state, symbol, loc)?;
                        if resolved.needs_reloc {
                            pending.push((text.len(), symbol.clone(), loc.clone()));
                        }
                        resolved.value
                    }
                };
                text.extend_from_slice(&value.to_be_bytes());
            }
        }
    }
    Ok(())
}

/// Composed lookup key for the implicit-register family, e.g. `push ac`
/// becomes `"push-ac"`. Only produced when the operand shape fits.
fn implicit_reg_key(mnemonic_lower: &str, args: &[Arg]) -> Option<String> {
    if !EncodeTable::is_implicit_reg_mnemonic(mnemonic_lower) {
        return None;
    }
    match args {
        [Arg::Reg(reg)] => Some(format!("{mnemonic_lower}-{reg}")),
        _ => None,
    }
}

/// Selects the opcode byte, going through the register-indexed tables
/// for the register-parameterized families.
fn pick_opcode(
    table: &EncodeTable,
    mnemonic_lower: &str,
    args: &[Arg],
    fallback: u8,
    loc: &SourceLoc,
    display: &str,
) -> Result<u8, AsmError> {
    let invalid = || AsmError::new(loc.clone(), ErrorKind::InvalidOperands(display.to_string()));

    let picked = match (mnemonic_lower, args) {
        ("mov", [Arg::Reg(dst), Arg::Reg(src)]) => table.mov_opcode(*dst, *src).ok_or_else(invalid)?,
        ("ldi", [Arg::Reg(reg), Arg::Imm8(_)]) => {
            table.ldi_imm8_opcode(*reg).ok_or_else(invalid)?
        }
        ("ldi", [Arg::Reg(reg), Arg::Imm16(_) | Arg::Label(_)]) => {
            table.ldi_imm16_opcode(*reg).ok_or_else(invalid)?
        }
        ("ld", [Arg::Reg(reg), Arg::MemImm(_) | Arg::MemSym(_)]) => {
            table.ld_abs16_opcode(*reg).ok_or_else(invalid)?
        }
        ("st", [Arg::MemImm(_) | Arg::MemSym(_), Arg::Reg(reg)]) => {
            table.st_abs16_opcode(*reg).ok_or_else(invalid)?
        }
        _ => fallback,
    };
    Ok(picked)
}

fn emit_instruction(
    state: &Pass1State,
    table: &EncodeTable,
    mnemonic: &str,
    args: &[Arg],
    loc: &SourceLoc,
    text: &mut Vec<u8>,
    pending: &mut Vec<PendingTextReloc>,
) -> Result<(), AsmError> {
    let mnemonic_lower = mnemonic.to_ascii_lowercase();
    let start = text.len();

    if let Some(key) = implicit_reg_key(&mnemonic_lower, args) {
        let specs = table
            .find(&key, &[])
            .ok_or_else(|| AsmError::new(loc.clone(), ErrorKind::UnknownVariant(key.clone())))?;
        text.push(specs.opcode);
        if text.len() - start != usize::from(specs.size) {
            return Err(AsmError::new(
                loc.clone(),
                ErrorKind::Internal("instruction size mismatch"),
            ));
        }
        return Ok(());
    }
    if EncodeTable::is_implicit_reg_mnemonic(&mnemonic_lower) {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::ImplicitRegOperands(mnemonic.to_string()),
        ));
    }

    let signature = build_signature(args);
    let specs = table
        .find(&mnemonic_lower, &signature)
        .ok_or_else(|| AsmError::new(loc.clone(), ErrorKind::InvalidOperands(mnemonic.to_string())))?;

    let opcode = pick_opcode(table, &mnemonic_lower, args, specs.opcode, loc, mnemonic)?;
    text.push(opcode);

    for arg in args {
        match arg {
            Arg::Reg(_) => {}
            Arg::Imm8(value) => text.push((value & 0xFF) as u8),
            Arg::Imm16(value) => text.extend_from_slice(&value.to_be_bytes()),
            Arg::Label(name) | Arg::MemSym(name) => {
                let resolved = resolve_symbol(state, name, loc)?;
                if resolved.needs_reloc {
                    pending.push((text.len(), name.clone(), loc.clone()));
                }
                text.extend_from_slice(&resolved.value.to_be_bytes());
            }
            Arg::MemImm(value) => text.extend_from_slice(&value.to_be_bytes()),
        }
    }

    if text.len() - start != usize::from(specs.size) {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::Internal("instruction size mismatch"),
        ));
    }
    Ok(())
}

/// Second pass: emits `.text` in source order, inlining the data
/// directives that appeared inside `.text`, fills the data sections
/// from the staging buffers and produces the object file.
pub fn pass2(
    lines: &[Line],
    state: &Pass1State,
    scratch: &SectionsScratch,
    table: &EncodeTable,
) -> Result<ObjectFile, AsmError> {
    let mut text = Vec::with_capacity(state.lc_text as usize);
    let mut pending: Vec<PendingTextReloc> = Vec::new();
    let mut current = SectionType::Text;
    let mut item_index = 0usize;

    for line in lines {
        match line {
            Line::Label { .. } => {}
            Line::Directive { name, loc, .. } => {
                let normalized = directive::normalize_name(name);
                match normalized.as_str() {
                    "text" | "code" => current = SectionType::Text,
                    "data" => current = SectionType::Data,
                    "bss" => current = SectionType::Bss,
                    "rodata" => current = SectionType::RoData,
                    _ => {}
                }

                if current == SectionType::Text && directive::is_data_directive(&normalized) {
                    let item = scratch.text.items.get(item_index).ok_or_else(|| {
                        AsmError::new(loc.clone(), ErrorKind::Internal("staged text item missing"))
                    })?;
                    if item.loc() != loc {
                        return Err(AsmError::new(
                            loc.clone(),
                            ErrorKind::Internal("staged text item out of order"),
                        ));
                    }
                    item_index += 1;
                    emit_item_into_text(state, item, &mut text, &mut pending)?;
                }
            }
            Line::Inst {
                mnemonic,
                args,
                loc,
            } => {
                if current != SectionType::Text {
                    continue;
                }
                emit_instruction(state, table, mnemonic, args, loc, &mut text, &mut pending)?;
            }
        }
    }

    let end = SourceLoc::new(
        lines.last().map_or("<input>", |l| l.loc().file.as_str()),
        lines.last().map_or(1, |l| l.loc().line),
        1,
    );
    if item_index != scratch.text.items.len() {
        return Err(AsmError::new(
            end,
            ErrorKind::Internal("staged text items left unconsumed"),
        ));
    }
    if text.len() as u32 != state.lc_text {
        return Err(AsmError::new(
            end,
            ErrorKind::Internal("text size disagrees with pass 1"),
        ));
    }

    let (mut object, indices) = directive::emit_object(scratch, &state.symbols)?;
    object.sections[0].data = text;

    for (offset, symbol, loc) in pending {
        let symbol_index = *indices.get(&symbol).ok_or_else(|| {
            AsmError::new(loc.clone(), ErrorKind::UndefinedRelocSymbol(symbol.clone()))
        })?;
        let offset = u16::try_from(offset).map_err(|_| {
            AsmError::new(
                loc.clone(),
                ErrorKind::Internal("text relocation offset exceeds 16 bits"),
            )
        })?;
        object.reloc_entries.push(RelocEntry {
            section_index: 0,
            offset,
            ty: RelocType::Abs16,
            symbol_index,
            addend: 0,
        });
    }

    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble_text;

    #[test]
    fn implicit_register_instructions_are_one_opcode_byte() {
        let object = assemble_text(".text\npush ac\npop x\n", "t.asm").unwrap();
        let table = EncodeTable::global();
        assert_eq!(
            object.sections[0].data,
            vec![
                table.find("push-ac", &[]).unwrap().opcode,
                table.find("pop-x", &[]).unwrap().opcode,
            ]
        );
    }

    #[test]
    fn implicit_mnemonic_with_wrong_operands() {
        let err = assemble_text(".text\npush 1\n", "t.asm").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperands("push".to_string()));
        let err = assemble_text(".text\npush sp\n", "t.asm").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownVariant("push-sp".to_string()));
    }

    #[test]
    fn invalid_mov_pair() {
        let err = assemble_text(".text\nmov ac, ac\n", "t.asm").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperands("mov".to_string()));
    }

    #[test]
    fn undefined_local_symbol_is_an_error() {
        let err = assemble_text(".text\njmp nowhere\n", "t.asm").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedSymbol("nowhere".to_string()));
    }

    #[test]
    fn bss_symbol_resolves_into_ram() {
        let object = assemble_text(
            ".bss\nbuf:\n.text\nld ac, [buf]\nhlt\n",
            "t.asm",
        )
        .unwrap();
        let data = &object.sections[0].data;
        assert_eq!(&data[1..3], &[0x40, 0x00]);
    }
}
