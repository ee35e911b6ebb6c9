use arch::{EncodeTable, OperandType};

use crate::directive::{self, SectionsScratch};
use crate::error::{AsmError, ErrorKind};
use crate::parser::{Arg, Line};
use crate::symtab::{SectionType, SymbolTable};

/// Layout state accumulated by pass 1: the active section, one
/// location counter per section and the symbol table.
#[derive(Debug)]
pub struct Pass1State {
    pub current: SectionType,
    pub lc_text: u32,
    pub lc_data: u32,
    pub lc_bss: u32,
    pub lc_rodata: u32,
    pub symbols: SymbolTable,
}

impl Default for Pass1State {
    fn default() -> Self {
        Pass1State {
            current: SectionType::Text,
            lc_text: 0,
            lc_data: 0,
            lc_bss: 0,
            lc_rodata: 0,
            symbols: SymbolTable::new(),
        }
    }
}

impl Pass1State {
    pub fn lc(&self, section: SectionType) -> u32 {
        match section {
            SectionType::Text => self.lc_text,
            SectionType::Data => self.lc_data,
            SectionType::Bss => self.lc_bss,
            SectionType::RoData => self.lc_rodata,
            SectionType::None => 0,
        }
    }

    pub fn lc_mut(&mut self, section: SectionType) -> Option<&mut u32> {
        match section {
            SectionType::Text => Some(&mut self.lc_text),
            SectionType::Data => Some(&mut self.lc_data),
            SectionType::Bss => Some(&mut self.lc_bss),
            SectionType::RoData => Some(&mut self.lc_rodata),
            SectionType::None => None,
        }
    }
}

/// Maps instruction arguments to the signature used for encoding-table
/// lookups: labels travel as 16-bit immediates.
pub fn build_signature(args: &[Arg]) -> Vec<OperandType> {
    args.iter()
        .map(|arg| match arg.operand_type() {
            OperandType::Label => OperandType::Imm16,
            other => other,
        })
        .collect()
}

/// First pass: computes section layouts, sizes every instruction and
/// collects label addresses into the symbol table.
pub fn pass1(
    lines: &[Line],
    table: &EncodeTable,
) -> Result<(Pass1State, SectionsScratch), AsmError> {
    let mut state = Pass1State::default();
    let mut scratch = SectionsScratch::default();

    for line in lines {
        match line {
            Line::Label { name, loc } => {
                let current = state.current;
                let value = state.lc(current);
                let sym = state.symbols.declare(name);
                if sym.defined {
                    return Err(AsmError::new(
                        loc.clone(),
                        ErrorKind::Redefinition(name.clone()),
                    ));
                }
                sym.section = current;
                sym.value = value;
                sym.defined = true;
            }
            Line::Directive { name, args, loc } => {
                directive::handle_pass1(name, args, loc, &mut state, &mut scratch)?;
            }
            Line::Inst {
                mnemonic,
                args,
                loc,
            } => {
                if state.current != SectionType::Text {
                    return Err(AsmError::new(
                        loc.clone(),
                        ErrorKind::InstructionOutsideText,
                    ));
                }

                for arg in args {
                    match arg {
                        Arg::Label(name) | Arg::MemSym(name) => {
                            state.symbols.declare(name);
                        }
                        _ => {}
                    }
                }

                let signature = build_signature(args);
                let mnemonic_lower = mnemonic.to_ascii_lowercase();
                let specs = table.find(&mnemonic_lower, &signature).ok_or_else(|| {
                    if table.mnemonic_exists(&mnemonic_lower) {
                        AsmError::new(loc.clone(), ErrorKind::InvalidOperands(mnemonic.clone()))
                    } else {
                        AsmError::new(loc.clone(), ErrorKind::UnknownInstruction(mnemonic.clone()))
                    }
                })?;

                state.lc_text += u32::from(specs.size);
                scratch.text.lc = state.lc_text;
            }
        }
    }

    scratch.text.lc = state.lc_text;
    scratch.data.lc = state.lc_data;
    scratch.bss.lc = state.lc_bss;
    scratch.rodata.lc = state.lc_rodata;

    Ok((state, scratch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use obj::Binding;

    fn run(src: &str) -> Result<(Pass1State, SectionsScratch), AsmError> {
        let table = EncodeTable::global();
        let lines = Parser::new(table).parse_text(src, "t.asm")?;
        pass1(&lines, table)
    }

    #[test]
    fn sizes_and_labels() {
        let (state, _) = run("main:\n  ldi xh, 0xFF\n  hlt\nend:\n").unwrap();
        assert_eq!(state.lc_text, 3);
        let main = state.symbols.find("main").unwrap();
        assert_eq!((main.section, main.value, main.defined), (SectionType::Text, 0, true));
        let end = state.symbols.find("end").unwrap();
        assert_eq!(end.value, 3);
    }

    #[test]
    fn section_switches_move_the_counter() {
        let (state, scratch) =
            run(".data\nv: .word 0xBEEF\n.rodata\nmsg: .asciz \"hi\"\n.text\nnop\n").unwrap();
        assert_eq!(state.lc_data, 2);
        assert_eq!(state.lc_rodata, 3);
        assert_eq!(state.lc_text, 1);
        assert_eq!(scratch.data.items.len(), 1);
        assert_eq!(scratch.rodata.items.len(), 1);
        let v = state.symbols.find("v").unwrap();
        assert_eq!((v.section, v.value), (SectionType::Data, 0));
    }

    #[test]
    fn bss_counts_without_data() {
        let err = run(".bss\n.byte 1\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataInBss("byte".to_string()));
    }

    #[test]
    fn redefinition_is_an_error() {
        let err = run("a:\na:\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redefinition("a".to_string()));
    }

    #[test]
    fn instructions_only_in_text() {
        let err = run(".data\nnop\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InstructionOutsideText);
    }

    #[test]
    fn unknown_vs_invalid() {
        let err = run("frobnicate\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownInstruction("frobnicate".to_string()));
        let err = run("mov ac\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperands("mov".to_string()));
    }

    #[test]
    fn labels_in_args_get_declared() {
        let (state, _) = run("jmp somewhere\n").unwrap();
        let sym = state.symbols.find("somewhere").unwrap();
        assert!(!sym.defined);
        assert_eq!(sym.bind, Binding::Local);
    }

    #[test]
    fn globl_and_extern() {
        let (state, _) = run(".globl main\n.extern ext\nmain:\n  hlt\n").unwrap();
        let main = state.symbols.find("main").unwrap();
        assert_eq!(main.bind, Binding::Global);
        assert!(main.defined);
        let ext = state.symbols.find("ext").unwrap();
        assert_eq!(ext.bind, Binding::Global);
        assert!(!ext.defined);
        assert_eq!(ext.section, SectionType::None);
    }

    #[test]
    fn implicit_register_sizes() {
        let (state, _) = run("push ac\npop x\ninc zh\nadd yl\n").unwrap();
        assert_eq!(state.lc_text, 4);
    }
}
