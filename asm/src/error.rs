use thiserror::Error;

use crate::loc::SourceLoc;

/// Assembler error: a kind plus the source location it was raised at.
#[derive(Debug, Error)]
#[error("{loc}: {kind}")]
pub struct AsmError {
    pub loc: SourceLoc,
    pub kind: ErrorKind,
}

impl AsmError {
    pub fn new(loc: SourceLoc, kind: ErrorKind) -> Self {
        AsmError { loc, kind }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErrorKind {
    // Lexical
    #[error("unexpected character in input: '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid line marker: {0}")]
    BadLineMarker(&'static str),

    // Number literals
    #[error("{0}")]
    BadNumber(&'static str),

    #[error("immediate value is out of range")]
    ImmediateOutOfRange,

    #[error("memory reference value is out of range")]
    MemRefOutOfRange,

    // Syntactic
    #[error("unexpected tokens after label definition")]
    TokensAfterLabel,

    #[error("unexpected comma in argument list")]
    UnexpectedComma,

    #[error("missing comma between arguments")]
    MissingComma,

    #[error("trailing comma in argument list")]
    TrailingComma,

    #[error("directive name expected after '.'")]
    DirectiveNameExpected,

    #[error("unexpected token in directive arguments")]
    BadDirectiveToken,

    #[error("unexpected token in argument")]
    BadArgumentToken,

    #[error("unexpected token at start of line")]
    BadLineStart,

    #[error("expected expression inside memory reference")]
    EmptyMemRef,

    #[error("expected number or label inside memory reference")]
    BadMemRef,

    #[error("registers are not allowed inside absolute memory references")]
    RegisterInMemRef,

    #[error("expected closing bracket in memory reference")]
    UnclosedMemRef,

    #[error("immediate value 0x{value:02X} does not fit into 8-bit operand of instruction '{mnemonic}'")]
    Imm8OperandOverflow { value: u16, mnemonic: String },

    #[error("immediate value 0x{value:02X} does not fit into 8-bit register '{reg}'")]
    Imm8RegisterOverflow { value: u16, reg: arch::Reg },

    // Pass 1
    #[error("redefinition of symbol '{0}'")]
    Redefinition(String),

    #[error("unknown directive '{0}'")]
    UnknownDirective(String),

    #[error(".{0} is not allowed in .bss section")]
    DataInBss(String),

    #[error("symbol name expected after .{0}")]
    SymbolNameExpected(String),

    #[error("invalid symbol name '{name}' in .{directive}")]
    InvalidSymbolName { name: String, directive: String },

    #[error(".{0} expects at least one argument")]
    DirectiveNeedsArgs(String),

    #[error("value 0x{value:X} is out of range for .{directive}")]
    DirectiveValueOutOfRange { value: u64, directive: String },

    #[error("invalid numeric literal '{0}'")]
    BadDirectiveNumber(String),

    #[error("negative values are not supported in directives")]
    NegativeDirectiveValue,

    #[error("expected number or string in .byte")]
    BadByteArg,

    #[error("unknown token in .word: '{0}'")]
    BadWordArg(String),

    #[error(".word does not accept string literals")]
    WordStringLiteral,

    #[error(".{0} expects a string literal")]
    StringLiteralExpected(String),

    #[error("string literal expected")]
    NotAStringLiteral,

    #[error("unterminated escape sequence in string literal")]
    UnterminatedEscape,

    #[error("unsupported escape sequence in string literal")]
    BadEscape,

    #[error("instructions are only allowed in .text section")]
    InstructionOutsideText,

    // Pass 2
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),

    #[error("invalid operands for instruction '{0}'")]
    InvalidOperands(String),

    #[error("invalid operands for instruction '{0}': expected exactly one register")]
    ImplicitRegOperands(String),

    #[error("unknown instruction variant '{0}'")]
    UnknownVariant(String),

    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    #[error("undefined symbol '{0}' in relocation")]
    UndefinedRelocSymbol(String),

    #[error("address for symbol '{0}' exceeds 16-bit range")]
    SymbolAddressOverflow(String),

    #[error("internal assembler error: {0}")]
    Internal(&'static str),
}
