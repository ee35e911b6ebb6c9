use indexmap::IndexMap;
use obj::{Binding, ObjectFile, RelocEntry, RelocType};

use crate::error::{AsmError, ErrorKind};
use crate::loc::SourceLoc;
use crate::pass1::Pass1State;
use crate::symtab::{SectionType, SymbolTable};

/// One element of a `.word` list: either a literal or a symbol name to
/// be relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordEntry {
    Imm(u16),
    Sym(String),
}

/// A directive payload staged during pass 1 and emitted during pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Byte { bytes: Vec<u8>, loc: SourceLoc },
    Word { words: Vec<WordEntry>, loc: SourceLoc },
    Ascii { bytes: Vec<u8>, loc: SourceLoc },
    Asciz { bytes: Vec<u8>, loc: SourceLoc },
}

impl DataItem {
    pub fn loc(&self) -> &SourceLoc {
        match self {
            DataItem::Byte { loc, .. }
            | DataItem::Word { loc, .. }
            | DataItem::Ascii { loc, .. }
            | DataItem::Asciz { loc, .. } => loc,
        }
    }
}

/// Per-section staging buffer: the recorded payloads and the location
/// counter mirror.
#[derive(Debug, Default)]
pub struct SectionBuffer {
    pub items: Vec<DataItem>,
    pub lc: u32,
}

/// Staging buffers for all four sections.
#[derive(Debug, Default)]
pub struct SectionsScratch {
    pub text: SectionBuffer,
    pub data: SectionBuffer,
    pub bss: SectionBuffer,
    pub rodata: SectionBuffer,
}

impl SectionsScratch {
    pub fn buffer_mut(&mut self, section: SectionType) -> Option<&mut SectionBuffer> {
        match section {
            SectionType::Text => Some(&mut self.text),
            SectionType::Data => Some(&mut self.data),
            SectionType::Bss => Some(&mut self.bss),
            SectionType::RoData => Some(&mut self.rodata),
            SectionType::None => None,
        }
    }
}

/// Lowercases and strips the leading `.` if present.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase();
    lowered.strip_prefix('.').unwrap_or(&lowered).to_string()
}

pub fn is_data_directive(normalized: &str) -> bool {
    matches!(normalized, "byte" | "word" | "ascii" | "asciz")
}

pub fn is_string_literal(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('"') && token.ends_with('"')
}

/// Identifier rule for directive arguments: letter or underscore,
/// then letters, digits, underscores or dots.
pub fn is_valid_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Decodes a quoted string literal, resolving `\\ \" \n \t \r \0`.
pub fn decode_string_literal(token: &str, loc: &SourceLoc) -> Result<Vec<u8>, AsmError> {
    if !is_string_literal(token) {
        return Err(AsmError::new(loc.clone(), ErrorKind::NotAStringLiteral));
    }

    let inner = &token.as_bytes()[1..token.len() - 1];
    let mut bytes = Vec::with_capacity(inner.len());

    let mut i = 0;
    while i < inner.len() {
        let ch = inner[i];
        if ch != b'\\' {
            bytes.push(ch);
            i += 1;
            continue;
        }

        i += 1;
        if i >= inner.len() {
            return Err(AsmError::new(loc.clone(), ErrorKind::UnterminatedEscape));
        }
        match inner[i] {
            b'\\' => bytes.push(b'\\'),
            b'"' => bytes.push(b'"'),
            b'n' => bytes.push(b'\n'),
            b't' => bytes.push(b'\t'),
            b'r' => bytes.push(b'\r'),
            b'0' => bytes.push(0),
            _ => return Err(AsmError::new(loc.clone(), ErrorKind::BadEscape)),
        }
        i += 1;
    }

    Ok(bytes)
}

/// Parses an unsigned directive argument: decimal, `0x` hex or `0b`
/// binary. Signs are rejected outright.
pub fn parse_integer_literal(text: &str, loc: &SourceLoc) -> Result<u64, AsmError> {
    if text.is_empty() {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::BadDirectiveNumber(text.to_string()),
        ));
    }
    if text.starts_with('-') || text.starts_with('+') {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::NegativeDirectiveValue,
        ));
    }

    let (digits, base) = if text.len() > 2 && (text.starts_with("0x") || text.starts_with("0X")) {
        (&text[2..], 16)
    } else if text.len() > 2 && (text.starts_with("0b") || text.starts_with("0B")) {
        (&text[2..], 2)
    } else {
        (text, 10)
    };

    let mut value: u64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(base).ok_or_else(|| {
            AsmError::new(loc.clone(), ErrorKind::BadDirectiveNumber(text.to_string()))
        })?;
        value = value
            .saturating_mul(u64::from(base))
            .saturating_add(u64::from(digit));
    }
    Ok(value)
}

fn parse_word_value(text: &str, loc: &SourceLoc) -> Result<u16, AsmError> {
    let value = parse_integer_literal(text, loc)?;
    if value > 0xFFFF {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::DirectiveValueOutOfRange {
                value,
                directive: "word".to_string(),
            },
        ));
    }
    Ok(value as u16)
}

fn parse_byte_value(text: &str, loc: &SourceLoc) -> Result<u8, AsmError> {
    let value = parse_integer_literal(text, loc)?;
    if value > 0xFF {
        return Err(AsmError::new(
            loc.clone(),
            ErrorKind::DirectiveValueOutOfRange {
                value,
                directive: "byte".to_string(),
            },
        ));
    }
    Ok(value as u8)
}

/// Consumes one directive during pass 1: switches sections, declares
/// symbols, stages data payloads and advances the location counter.
pub fn handle_pass1(
    name: &str,
    args: &[String],
    loc: &SourceLoc,
    state: &mut Pass1State,
    scratch: &mut SectionsScratch,
) -> Result<(), AsmError> {
    let directive = normalize_name(name);

    match directive.as_str() {
        "text" | "code" => {
            state.current = SectionType::Text;
            return Ok(());
        }
        "data" => {
            state.current = SectionType::Data;
            return Ok(());
        }
        "bss" => {
            state.current = SectionType::Bss;
            return Ok(());
        }
        "rodata" => {
            state.current = SectionType::RoData;
            return Ok(());
        }
        "globl" | "global" | "extern" => {
            if args.is_empty() {
                return Err(AsmError::new(
                    loc.clone(),
                    ErrorKind::SymbolNameExpected(directive.clone()),
                ));
            }
            for name in args {
                if !is_valid_identifier(name) {
                    return Err(AsmError::new(
                        loc.clone(),
                        ErrorKind::InvalidSymbolName {
                            name: name.clone(),
                            directive: directive.clone(),
                        },
                    ));
                }
                let sym = state.symbols.declare(name);
                sym.bind = Binding::Global;
                if directive == "extern" {
                    sym.defined = false;
                    sym.section = SectionType::None;
                    sym.value = 0;
                }
            }
            return Ok(());
        }
        _ => {}
    }

    if state.current == SectionType::Bss && is_data_directive(&directive) {
        return Err(AsmError::new(loc.clone(), ErrorKind::DataInBss(directive)));
    }

    let item = match directive.as_str() {
        "byte" => {
            if args.is_empty() {
                return Err(AsmError::new(
                    loc.clone(),
                    ErrorKind::DirectiveNeedsArgs(directive.clone()),
                ));
            }
            let mut bytes = Vec::new();
            for arg in args {
                if is_string_literal(arg) {
                    bytes.extend(decode_string_literal(arg, loc)?);
                } else {
                    match parse_byte_value(arg, loc) {
                        Ok(byte) => bytes.push(byte),
                        Err(err)
                            if matches!(err.kind, ErrorKind::DirectiveValueOutOfRange { .. }) =>
                        {
                            return Err(err);
                        }
                        Err(_) => {
                            return Err(AsmError::new(loc.clone(), ErrorKind::BadByteArg));
                        }
                    }
                }
            }
            DataItem::Byte {
                bytes,
                loc: loc.clone(),
            }
        }
        "word" => {
            if args.is_empty() {
                return Err(AsmError::new(
                    loc.clone(),
                    ErrorKind::DirectiveNeedsArgs(directive.clone()),
                ));
            }
            let mut words = Vec::with_capacity(args.len());
            for arg in args {
                if is_string_literal(arg) {
                    return Err(AsmError::new(loc.clone(), ErrorKind::WordStringLiteral));
                }
                if is_valid_identifier(arg) {
                    state.symbols.declare(arg);
                    words.push(WordEntry::Sym(arg.clone()));
                } else {
                    match parse_word_value(arg, loc) {
                        Ok(word) => words.push(WordEntry::Imm(word)),
                        Err(err)
                            if matches!(err.kind, ErrorKind::DirectiveValueOutOfRange { .. }) =>
                        {
                            return Err(err);
                        }
                        Err(_) => {
                            return Err(AsmError::new(
                                loc.clone(),
                                ErrorKind::BadWordArg(arg.clone()),
                            ));
                        }
                    }
                }
            }
            DataItem::Word {
                words,
                loc: loc.clone(),
            }
        }
        "ascii" | "asciz" => {
            if args.is_empty() {
                return Err(AsmError::new(
                    loc.clone(),
                    ErrorKind::StringLiteralExpected(directive.clone()),
                ));
            }
            let mut bytes = Vec::new();
            for arg in args {
                if !is_string_literal(arg) {
                    return Err(AsmError::new(
                        loc.clone(),
                        ErrorKind::StringLiteralExpected(directive.clone()),
                    ));
                }
                bytes.extend(decode_string_literal(arg, loc)?);
            }
            if directive == "asciz" {
                bytes.push(0x00);
                DataItem::Asciz {
                    bytes,
                    loc: loc.clone(),
                }
            } else {
                DataItem::Ascii {
                    bytes,
                    loc: loc.clone(),
                }
            }
        }
        _ => {
            return Err(AsmError::new(
                loc.clone(),
                ErrorKind::UnknownDirective(name.to_string()),
            ));
        }
    };

    let advance = match &item {
        DataItem::Byte { bytes, .. }
        | DataItem::Ascii { bytes, .. }
        | DataItem::Asciz { bytes, .. } => bytes.len() as u32,
        DataItem::Word { words, .. } => words.len() as u32 * 2,
    };

    let section = state.current;
    let lc = state
        .lc_mut(section)
        .ok_or_else(|| AsmError::new(loc.clone(), ErrorKind::Internal("no location counter")))?;
    *lc += advance;
    let lc = *lc;

    let buffer = scratch
        .buffer_mut(section)
        .ok_or_else(|| AsmError::new(loc.clone(), ErrorKind::Internal("no staging buffer")))?;
    buffer.lc = lc;
    buffer.items.push(item);
    Ok(())
}

fn emit_items(
    items: &[DataItem],
    section_index: u8,
    pending: &mut Vec<(u8, u16, String, SourceLoc)>,
) -> Result<Vec<u8>, AsmError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            DataItem::Byte { bytes, .. }
            | DataItem::Ascii { bytes, .. }
            | DataItem::Asciz { bytes, .. } => out.extend_from_slice(bytes),
            DataItem::Word { words, loc } => {
                for entry in words {
                    let offset = u16::try_from(out.len()).map_err(|_| {
                        AsmError::new(
                            loc.clone(),
                            ErrorKind::Internal("data relocation offset exceeds 16 bits"),
                        )
                    })?;
                    match entry {
                        WordEntry::Imm(value) => out.extend_from_slice(&value.to_be_bytes()),
                        WordEntry::Sym(symbol) => {
                            pending.push((section_index, offset, symbol.clone(), loc.clone()));
                            out.extend_from_slice(&[0, 0]);
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Builds the object skeleton after pass 2 finished layout: `.data`
/// and `.rodata` payloads from the staging buffers, the `.bss` size,
/// the alphabetically sorted symbol table and the relocations of the
/// staged `.word` symbol references. `.text` bytes are the caller's
/// business. Returns the object and the name-to-index map of the
/// sorted symbol table.
pub fn emit_object(
    scratch: &SectionsScratch,
    symtab: &SymbolTable,
) -> Result<(ObjectFile, IndexMap<String, u16>), AsmError> {
    let mut object = ObjectFile::with_standard_sections();
    object.sections[2].bss_size = scratch.bss.lc;

    let mut pending = Vec::new();
    object.sections[1].data = emit_items(&scratch.data.items, 1, &mut pending)?;
    object.sections[3].data = emit_items(&scratch.rodata.items, 3, &mut pending)?;

    let mut symbols = symtab.all_symbols();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));

    let mut indices = IndexMap::with_capacity(symbols.len());
    for (i, sym) in symbols.iter().enumerate() {
        let section_index = sym.section.index();
        object.symbols.push(obj::SymbolDescription {
            name: sym.name.clone(),
            section_index,
            value: if section_index >= 0 { sym.value } else { 0 },
            bind: sym.bind.into(),
        });
        indices.insert(sym.name.clone(), i as u16);
    }

    for (section_index, offset, symbol, loc) in pending {
        let symbol_index = *indices
            .get(&symbol)
            .ok_or_else(|| AsmError::new(loc, ErrorKind::UndefinedRelocSymbol(symbol.clone())))?;
        object.reloc_entries.push(RelocEntry {
            section_index,
            offset,
            ty: RelocType::Abs16,
            symbol_index,
            addend: 0,
        });
    }

    Ok((object, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLoc {
        SourceLoc::new("t.asm", 1, 1)
    }

    #[test]
    fn normalizes_directive_names() {
        assert_eq!(normalize_name(".TEXT"), "text");
        assert_eq!(normalize_name("Globl"), "globl");
        assert_eq!(normalize_name(".rodata"), "rodata");
    }

    #[test]
    fn identifier_rule() {
        assert!(is_valid_identifier("main"));
        assert!(is_valid_identifier("_t0"));
        assert!(is_valid_identifier("a.b_c1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier(".hidden"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn decodes_escapes() {
        let bytes = decode_string_literal("\"\\n\\0x\"", &loc()).unwrap();
        assert_eq!(bytes, vec![0x0A, 0x00, 0x78]);
        let bytes = decode_string_literal("\"a\\\"b\\\\c\"", &loc()).unwrap();
        assert_eq!(bytes, b"a\"b\\c");
        let bytes = decode_string_literal("\"\\t\\r\"", &loc()).unwrap();
        assert_eq!(bytes, vec![0x09, 0x0D]);
    }

    #[test]
    fn rejects_unknown_escape() {
        let err = decode_string_literal("\"\\q\"", &loc()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadEscape);
    }

    #[test]
    fn integer_literals() {
        assert_eq!(parse_integer_literal("255", &loc()).unwrap(), 255);
        assert_eq!(parse_integer_literal("0xFF", &loc()).unwrap(), 255);
        assert_eq!(parse_integer_literal("0b1010", &loc()).unwrap(), 10);
        assert!(parse_integer_literal("-1", &loc()).is_err());
        assert!(parse_integer_literal("0x", &loc()).is_err());
        assert!(parse_integer_literal("12q", &loc()).is_err());
    }
}
