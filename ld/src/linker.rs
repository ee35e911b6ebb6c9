use itertools::Itertools;
use obj::{bind_name, ObjectFile, SymbolDescription};

use crate::error::LinkError;
use crate::image;
use crate::merge::SectionMerger;
use crate::resolve::RelocResolver;

#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Address the ROM image is burned at.
    pub rom_base: u32,
    /// Final image size; 0 disables padding.
    pub rom_size: u32,
    pub rom_fill: u8,
    pub text_align: u32,
    pub rodata_align: u32,
    pub bss_base: u32,
    pub entry_symbol: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions {
            rom_base: 0x0000,
            rom_size: 16 * 1024,
            rom_fill: 0xFF,
            text_align: 1,
            rodata_align: 1,
            bss_base: 0x4000,
            entry_symbol: "main".to_string(),
        }
    }
}

/// Result of a successful link: the padded ROM plus the placement
/// summary and the resolved non-local symbols.
#[derive(Debug)]
pub struct LinkedImage {
    pub rom: Vec<u8>,
    pub text_base: u32,
    pub text_size: u32,
    pub rodata_base: u32,
    pub rodata_size: u32,
    pub bss_base: u32,
    pub bss_size: u32,
    /// Sorted ascending by address, ties broken by name.
    pub final_symbols: Vec<SymbolDescription>,
}

impl LinkedImage {
    /// Renders the map file text.
    pub fn render_map(&self) -> String {
        let mut map = String::new();
        map.push_str("ROM layout:\n");
        map.push_str(&format!(
            ".text base=0x{:04X} size={}\n",
            self.text_base, self.text_size
        ));
        map.push_str(&format!(
            ".rodata base=0x{:04X} size={}\n",
            self.rodata_base, self.rodata_size
        ));
        map.push_str("RAM layout:\n");
        map.push_str(&format!(
            ".bss base=0x{:04X} size={}\n",
            self.bss_base, self.bss_size
        ));
        map.push_str("Symbols:\n");
        for sym in &self.final_symbols {
            map.push_str(&format!(
                "0x{:04X} {} {}\n",
                sym.value,
                bind_name(sym.bind),
                sym.name
            ));
        }
        map
    }
}

/// Links the objects: plan placement, merge bytes, resolve and patch
/// relocations, validate the entry symbol and compose the ROM.
pub fn link(objects: &[ObjectFile], opt: &LinkOptions) -> Result<LinkedImage, LinkError> {
    let plan = SectionMerger::plan(
        objects,
        opt.rom_base,
        opt.text_align,
        opt.rodata_align,
        opt.bss_base,
    )?;

    let (mut text, mut rodata) = SectionMerger::merge_bytes(objects, &plan)?;

    let gsym = RelocResolver::build_global_symtab(objects, &plan)?;
    RelocResolver::apply(objects, &plan, &gsym, &mut text, &mut rodata)?;

    let rom = image::make_flat_rom(&text, &rodata, opt.rom_size, opt.rom_fill)?;

    let final_symbols = gsym
        .iter()
        .filter(|(_, sym)| sym.section_index >= 0)
        .map(|(name, sym)| SymbolDescription {
            name: name.clone(),
            section_index: sym.section_index,
            value: sym.abs_addr,
            bind: sym.bind,
        })
        .sorted_by(|a, b| a.value.cmp(&b.value).then_with(|| a.name.cmp(&b.name)))
        .collect::<Vec<_>>();

    let entry = gsym
        .get(&opt.entry_symbol)
        .filter(|sym| sym.section_index >= 0)
        .ok_or_else(|| LinkError::EntryUndefined(opt.entry_symbol.clone()))?;
    if entry.section_index != 0 && entry.section_index != 3 {
        return Err(LinkError::EntryNotInRom(opt.entry_symbol.clone()));
    }
    let rom_min = u64::from(opt.rom_base);
    let rom_max = rom_min + rom.len() as u64;
    let entry_addr = u64::from(entry.abs_addr);
    if entry_addr < rom_min || entry_addr >= rom_max {
        return Err(LinkError::EntryOutsideImage(opt.entry_symbol.clone()));
    }

    Ok(LinkedImage {
        rom,
        text_base: plan.layout.text_base,
        text_size: plan.layout.text_size,
        rodata_base: plan.layout.rodata_base,
        rodata_size: plan.layout.rodata_size,
        bss_base: plan.layout.bss_base,
        bss_size: plan.layout.bss_size,
        final_symbols,
    })
}
