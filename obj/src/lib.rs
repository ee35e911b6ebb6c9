mod error;
mod format;
mod serialize;

pub use error::ObjError;
pub use format::{
    bind_name, Binding, ObjectFile, RelocEntry, RelocType, Section, SymbolDescription,
    FLAG_EXEC, FLAG_READ, FLAG_WRITE, SECTION_COUNT, SECTION_NAMES,
};
pub use serialize::{from_bytes, read_from_file, to_bytes, write_to_file};
