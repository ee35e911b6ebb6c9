use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("invalid object file magic")]
    BadMagic,

    #[error("unsupported object file version: {0}")]
    BadVersion(u16),

    #[error("unsupported section count in object file: {0}")]
    BadSectionCount(u16),

    #[error("section indices out of order in object file: expected {expected}, found {found}")]
    SectionIndexOrder { expected: u8, found: u8 },

    #[error(".bss section must not contain data")]
    BssHasData,

    #[error("unexpected end of file")]
    Truncated,

    #[error("unsupported relocation type: {0}")]
    BadRelocType(u8),

    #[error("relocation addend out of range: {0}")]
    AddendOutOfRange(i32),

    #[error("too many {0} to serialize")]
    TooMany(&'static str),

    #[error("symbol name too long to serialize: '{0}'")]
    NameTooLong(String),

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
