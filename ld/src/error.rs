use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("initialized .data is not supported")]
    InitializedData,

    #[error("initialized .data section is not supported for symbol '{0}'")]
    DataSymbol(String),

    #[error("symbol '{name}' offset 0x{offset:X} exceeds section {section} size 0x{size:X}")]
    SymbolOutsideSection {
        name: String,
        offset: u32,
        section: &'static str,
        size: u32,
    },

    #[error("symbol '{0}' located in unsupported section")]
    UnsupportedSymbolSection(String),

    #[error("multiple definition of symbol '{0}'")]
    MultipleDefinition(String),

    #[error("undefined symbol '{0}'")]
    Undefined(String),

    #[error("relocation references invalid symbol index {0}")]
    BadSymbolIndex(u16),

    #[error("relocation for symbol '{symbol}' uses unsupported section index {index}")]
    UnsupportedRelocSection { symbol: String, index: u8 },

    #[error("relocation for symbol '{0}' writes outside section bounds")]
    RelocOutOfBounds(String),

    #[error("relocation result out of range for symbol '{0}'")]
    RelocOverflow(String),

    #[error("entry symbol '{0}' is undefined")]
    EntryUndefined(String),

    #[error("entry symbol '{0}' must reside in ROM (.text or .rodata)")]
    EntryNotInRom(String),

    #[error("entry symbol '{0}' lies outside the generated ROM image")]
    EntryOutsideImage(String),

    #[error("ROM image exceeds configured size ({size} > {limit})")]
    RomTooLarge { size: usize, limit: u32 },

    #[error("section size overflow")]
    SizeOverflow,

    #[error(transparent)]
    Obj(#[from] obj::ObjError),

    #[error("failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
