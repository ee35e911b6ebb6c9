use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

pub const SECTION_COUNT: usize = 4;
pub const SECTION_NAMES: [&str; SECTION_COUNT] = [".text", ".data", ".bss", ".rodata"];

pub const FLAG_EXEC: u8 = 0x01;
pub const FLAG_WRITE: u8 = 0x02;
pub const FLAG_READ: u8 = 0x04;

/// Symbol binding as stored in the object file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, Display,
)]
#[repr(u8)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Binding {
    Local = 0,
    Global = 1,
    Weak = 2,
}

/// Printable name for a raw binding byte. Unknown values stay
/// printable instead of failing the dump.
pub fn bind_name(bind: u8) -> String {
    match Binding::try_from(bind) {
        Ok(binding) => binding.to_string(),
        Err(_) => "UNKNOWN".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RelocType {
    /// Patch a big-endian 16-bit word with `symbol_address + addend`.
    Abs16 = 0,
}

/// One section of a relocatable object. `.bss` never carries data;
/// its logical size lives in `bss_size` instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub name: String,
    pub flags: u8,
    pub align: u8,
    pub data: Vec<u8>,
    pub bss_size: u32,
}

/// Symbol table entry. `section_index` is -1 for undefined symbols;
/// `value` is the offset within the section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDescription {
    pub name: String,
    pub section_index: i16,
    pub value: u32,
    pub bind: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocEntry {
    pub section_index: u8,
    pub offset: u16,
    pub ty: RelocType,
    pub symbol_index: u16,
    pub addend: i16,
}

/// A relocatable translation unit: always exactly four sections in
/// the fixed order `.text`, `.data`, `.bss`, `.rodata`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectFile {
    pub sections: Vec<Section>,
    pub symbols: Vec<SymbolDescription>,
    pub reloc_entries: Vec<RelocEntry>,
}

impl ObjectFile {
    /// Empty object with the four canonical sections and their flags.
    pub fn with_standard_sections() -> Self {
        let flags = [
            FLAG_READ | FLAG_EXEC,  // .text
            FLAG_READ | FLAG_WRITE, // .data
            FLAG_READ | FLAG_WRITE, // .bss
            FLAG_READ,              // .rodata
        ];
        let sections = SECTION_NAMES
            .iter()
            .zip(flags)
            .map(|(name, flags)| Section {
                name: name.to_string(),
                flags,
                align: 1,
                data: Vec::new(),
                bss_size: 0,
            })
            .collect();
        ObjectFile {
            sections,
            symbols: Vec::new(),
            reloc_entries: Vec::new(),
        }
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_names() {
        assert_eq!(bind_name(0), "LOCAL");
        assert_eq!(bind_name(1), "GLOBAL");
        assert_eq!(bind_name(2), "WEAK");
        assert_eq!(bind_name(7), "UNKNOWN");
    }

    #[test]
    fn standard_sections() {
        let object = ObjectFile::with_standard_sections();
        assert_eq!(object.sections.len(), SECTION_COUNT);
        assert_eq!(object.sections[0].name, ".text");
        assert_eq!(object.sections[0].flags, FLAG_READ | FLAG_EXEC);
        assert_eq!(object.sections[1].flags, FLAG_READ | FLAG_WRITE);
        assert_eq!(object.sections[2].flags, FLAG_READ | FLAG_WRITE);
        assert_eq!(object.sections[3].flags, FLAG_READ);
    }
}
