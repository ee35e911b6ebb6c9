pub mod directive;
pub mod error;
pub mod lexer;
pub mod loc;
pub mod parser;
pub mod pass1;
pub mod pass2;
pub mod symtab;
pub mod token;

pub use error::{AsmError, ErrorKind};
pub use loc::SourceLoc;

use arch::EncodeTable;

/// Assembles one already-preprocessed translation unit into a
/// relocatable object.
pub fn assemble_text(text: &str, file: &str) -> Result<obj::ObjectFile, AsmError> {
    let table = EncodeTable::global();
    let lines = parser::Parser::new(table).parse_text(text, file)?;
    let (state, scratch) = pass1::pass1(&lines, table)?;
    pass2::pass2(&lines, &state, &scratch, table)
}
