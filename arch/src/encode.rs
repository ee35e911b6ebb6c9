use indexmap::IndexMap;
use once_cell::sync::Lazy;
use strum::EnumCount;

use crate::operand::OperandType;
use crate::reg::Reg;

const NREGS: usize = Reg::COUNT;

/// Mnemonics whose sole operand is a register and whose opcode is
/// selected per register through a composed `"<mnemonic>-<reg>"` key.
pub const IMPLICIT_REG_MNEMONICS: &[&str] = &[
    "push", "pop", "add", "sub", "nand", "xor", "nor", "adc", "sbb", "inc", "dec", "icc",
    "dcb", "not", "cmp", "ldx", "stx",
];

/// Encoding of one instruction variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeSpecs {
    pub opcode: u8,
    /// Total instruction size in bytes, opcode included.
    pub size: u8,
    pub signature: Vec<OperandType>,
    /// The instruction carries a 16-bit absolute operand that a label
    /// may end up in. Advisory; emission decides per operand.
    pub needs_reloc: bool,
    /// Byte offset of the immediate within the instruction.
    pub imm_offset: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    mnemonic: String,
    signature: Vec<OperandType>,
}

/// Instruction encoding table. Built once from the declarative listing
/// in [`EncodeTable::new`]; lookups never mutate. The process-wide
/// instance is [`EncodeTable::global`], but tests may construct and
/// inject their own.
pub struct EncodeTable {
    table: IndexMap<Key, OpcodeSpecs>,
    mov: [[Option<u8>; NREGS]; NREGS],
    ldi8: [Option<u8>; NREGS],
    ldi16: [Option<u8>; NREGS],
    ld16: [Option<u8>; NREGS],
    st16: [Option<u8>; NREGS],
}

impl EncodeTable {
    pub fn global() -> &'static EncodeTable {
        static TABLE: Lazy<EncodeTable> = Lazy::new(EncodeTable::new);
        &TABLE
    }

    /// Exact-match lookup by lowercase mnemonic and operand signature.
    pub fn find(&self, mnemonic: &str, signature: &[OperandType]) -> Option<&OpcodeSpecs> {
        let key = Key {
            mnemonic: mnemonic.to_string(),
            signature: signature.to_vec(),
        };
        self.table.get(&key)
    }

    /// Whether any table entry exists for this mnemonic, regardless of
    /// signature. Distinguishes "unknown instruction" from "invalid
    /// operands".
    pub fn mnemonic_exists(&self, mnemonic: &str) -> bool {
        self.table.keys().any(|k| k.mnemonic == mnemonic)
    }

    pub fn is_implicit_reg_mnemonic(mnemonic: &str) -> bool {
        IMPLICIT_REG_MNEMONICS.contains(&mnemonic)
    }

    /// Immediate widths accepted by `mnemonic` at argument `position`:
    /// `(imm8_allowed, imm16_allowed)`.
    pub fn imm_widths(&self, mnemonic: &str, position: usize) -> (bool, bool) {
        let mut allow8 = false;
        let mut allow16 = false;
        for (key, _) in &self.table {
            if key.mnemonic != mnemonic {
                continue;
            }
            match key.signature.get(position) {
                Some(OperandType::Imm8) => allow8 = true,
                Some(OperandType::Imm16) => allow16 = true,
                _ => {}
            }
        }
        (allow8, allow16)
    }

    pub fn mov_opcode(&self, dst: Reg, src: Reg) -> Option<u8> {
        self.mov[dst as usize][src as usize]
    }

    pub fn ldi_imm8_opcode(&self, r: Reg) -> Option<u8> {
        self.ldi8[r as usize]
    }

    pub fn ldi_imm16_opcode(&self, r: Reg) -> Option<u8> {
        self.ldi16[r as usize]
    }

    pub fn ld_abs16_opcode(&self, r: Reg) -> Option<u8> {
        self.ld16[r as usize]
    }

    pub fn st_abs16_opcode(&self, r: Reg) -> Option<u8> {
        self.st16[r as usize]
    }
}

impl Default for EncodeTable {
    fn default() -> Self {
        Self::new()
    }
}

struct Builder {
    out: EncodeTable,
    next_opcode: u16,
}

impl Builder {
    fn alloc(&mut self) -> u8 {
        let opcode = self.next_opcode;
        assert!(opcode <= 0xFF, "opcode space exhausted");
        self.next_opcode += 1;
        opcode as u8
    }

    fn entry(signature: &[OperandType], opcode: u8) -> OpcodeSpecs {
        let size = 1 + signature.iter().map(|t| t.width()).sum::<u8>();
        let needs_reloc = signature
            .iter()
            .any(|t| matches!(t, OperandType::Imm16 | OperandType::MemAbs16));
        OpcodeSpecs {
            opcode,
            size,
            signature: signature.to_vec(),
            needs_reloc,
            imm_offset: 1,
        }
    }

    fn insert(&mut self, mnemonic: &str, signature: &[OperandType], opcode: u8) {
        let key = Key {
            mnemonic: mnemonic.to_string(),
            signature: signature.to_vec(),
        };
        let prev = self.out.table.insert(key, Self::entry(signature, opcode));
        assert!(prev.is_none(), "duplicate encoding entry for {mnemonic}");
    }

    /// Family-generic entry used by pass 1 for sizing and by the parser
    /// for immediate narrowing. First registration wins; the stored
    /// opcode is never used for emission.
    fn insert_generic(&mut self, mnemonic: &str, signature: &[OperandType], opcode: u8) {
        let key = Key {
            mnemonic: mnemonic.to_string(),
            signature: signature.to_vec(),
        };
        self.out
            .table
            .entry(key)
            .or_insert_with(|| Self::entry(signature, opcode));
    }

    fn simple(&mut self, mnemonic: &str, signature: &[OperandType]) {
        let opcode = self.alloc();
        self.insert(mnemonic, signature, opcode);
    }

    fn implicit(&mut self, mnemonic: &str, regs: &[Reg]) {
        for &reg in regs {
            let opcode = self.alloc();
            self.insert(&format!("{mnemonic}-{reg}"), &[], opcode);
            self.insert_generic(mnemonic, &[OperandType::Reg], opcode);
        }
    }

    fn ldi8(&mut self, reg: Reg) {
        let opcode = self.alloc();
        self.out.ldi8[reg as usize] = Some(opcode);
        self.insert_generic("ldi", &[OperandType::Reg, OperandType::Imm8], opcode);
    }

    fn ldi16(&mut self, reg: Reg) {
        let opcode = self.alloc();
        self.out.ldi16[reg as usize] = Some(opcode);
        self.insert_generic("ldi", &[OperandType::Reg, OperandType::Imm16], opcode);
    }

    fn ld_abs16(&mut self, reg: Reg) {
        let opcode = self.alloc();
        self.out.ld16[reg as usize] = Some(opcode);
        self.insert_generic("ld", &[OperandType::Reg, OperandType::MemAbs16], opcode);
    }

    fn st_abs16(&mut self, reg: Reg) {
        let opcode = self.alloc();
        self.out.st16[reg as usize] = Some(opcode);
        self.insert_generic("st", &[OperandType::MemAbs16, OperandType::Reg], opcode);
    }

    fn mov(&mut self, dst: Reg, src: Reg) {
        let opcode = self.alloc();
        self.out.mov[dst as usize][src as usize] = Some(opcode);
        self.insert_generic("mov", &[OperandType::Reg, OperandType::Reg], opcode);
    }
}

/// 8-bit registers, in encoding order.
const R8: [Reg; 7] = [
    Reg::AC,
    Reg::XH,
    Reg::YL,
    Reg::YH,
    Reg::ZL,
    Reg::ZH,
    Reg::FR,
];

/// Registers the single-byte ALU family operates on.
const ALU_REGS: [Reg; 6] = [Reg::AC, Reg::XH, Reg::YL, Reg::YH, Reg::ZL, Reg::ZH];

/// Registers addressable through the Z-indexed `ldx`/`stx` forms.
const IDX_REGS: [Reg; 5] = [Reg::AC, Reg::XH, Reg::YL, Reg::YH, Reg::FR];

impl EncodeTable {
    /// Builds the full CPU8 table. Opcodes are assigned sequentially
    /// from 0x00 in declaration order; the listing order is therefore
    /// part of the encoding and must not be reshuffled.
    pub fn new() -> Self {
        use OperandType::{Imm16, Imm8};

        let mut b = Builder {
            out: EncodeTable {
                table: IndexMap::new(),
                mov: [[None; NREGS]; NREGS],
                ldi8: [None; NREGS],
                ldi16: [None; NREGS],
                ld16: [None; NREGS],
                st16: [None; NREGS],
            },
            next_opcode: 0,
        };

        b.simple("nop", &[]);
        b.simple("hlt", &[]);
        b.simple("inte", &[]);
        b.simple("intd", &[]);
        b.simple("inth", &[]);

        for reg in R8 {
            b.ldi8(reg);
        }
        for reg in [Reg::SP, Reg::X, Reg::Y, Reg::Z] {
            b.ldi16(reg);
        }

        for reg in R8 {
            b.ld_abs16(reg);
        }
        b.implicit("ldx", &IDX_REGS);

        for reg in R8 {
            b.st_abs16(reg);
        }
        b.implicit("stx", &IDX_REGS);

        for dst in R8 {
            for src in R8 {
                if dst != src {
                    b.mov(dst, src);
                }
            }
        }
        b.mov(Reg::SP, Reg::Z);
        b.mov(Reg::Z, Reg::SP);
        b.mov(Reg::Z, Reg::PC);

        b.implicit(
            "push",
            &[
                Reg::AC,
                Reg::XH,
                Reg::YL,
                Reg::YH,
                Reg::ZL,
                Reg::ZH,
                Reg::FR,
                Reg::PC,
                Reg::X,
                Reg::Y,
                Reg::Z,
            ],
        );
        b.implicit(
            "pop",
            &[
                Reg::AC,
                Reg::XH,
                Reg::YL,
                Reg::YH,
                Reg::ZL,
                Reg::ZH,
                Reg::FR,
                Reg::X,
                Reg::Y,
                Reg::Z,
            ],
        );

        // Conditional control flow. The unconditional spelling falls
        // out of the suffix: j + "mp", c + "all", r + "et".
        for cond in ["nz", "z", "nc", "c", "p", "m", "mp"] {
            b.simple(&format!("j{cond}"), &[Imm16]);
            b.simple(&format!("j{cond}x"), &[]);
        }
        for cond in ["nz", "z", "nc", "c", "p", "m", "all"] {
            b.simple(&format!("c{cond}"), &[Imm16]);
        }
        for cond in ["nz", "z", "nc", "c", "p", "m", "et"] {
            b.simple(&format!("r{cond}"), &[]);
        }

        for mnemonic in ["inc", "dec", "icc", "dcb", "not", "cmp"] {
            b.implicit(mnemonic, &ALU_REGS);
        }
        for mnemonic in ["add", "sub", "nand", "xor", "nor", "adc", "sbb"] {
            b.implicit(mnemonic, &ALU_REGS);
        }
        for mnemonic in [
            "addi", "subi", "nandi", "xori", "nori", "adci", "sbbi", "cmpi",
        ] {
            b.simple(mnemonic, &[Imm8]);
        }

        b.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperandType::{Imm16, Imm8, MemAbs16, Reg as TReg};

    #[test]
    fn sizes_match_signatures() {
        let table = EncodeTable::new();
        for (key, specs) in &table.table {
            let expected = 1 + specs.signature.iter().map(|t| t.width()).sum::<u8>();
            assert_eq!(specs.size, expected, "entry {:?}", key.mnemonic);
            assert_eq!(specs.signature, key.signature);
            assert_eq!(specs.imm_offset, 1);
        }
    }

    #[test]
    fn opcodes_are_unique() {
        // Generic family entries alias a register-specific opcode by
        // construction; everything else must be distinct. Generic
        // entries are exactly the ones with a Reg in the signature.
        let table = EncodeTable::new();
        let mut seen = std::collections::BTreeSet::new();
        let mut claim = |opcode: u8| {
            assert!(seen.insert(opcode), "opcode {opcode:#04X} assigned twice");
        };

        for (key, specs) in &table.table {
            if key.signature.contains(&TReg) {
                continue;
            }
            claim(specs.opcode);
        }
        for row in &table.mov {
            for opcode in row.iter().flatten() {
                claim(*opcode);
            }
        }
        for bank in [&table.ldi8, &table.ldi16, &table.ld16, &table.st16] {
            for opcode in bank.iter().flatten() {
                claim(*opcode);
            }
        }
        assert_eq!(seen.len(), 220);
    }

    #[test]
    fn nop_is_opcode_zero() {
        let table = EncodeTable::new();
        assert_eq!(table.find("nop", &[]).unwrap().opcode, 0x00);
    }

    #[test]
    fn generic_entries_cover_register_families() {
        let table = EncodeTable::new();
        assert_eq!(table.find("ldi", &[TReg, Imm8]).unwrap().size, 2);
        assert_eq!(table.find("ldi", &[TReg, Imm16]).unwrap().size, 3);
        assert_eq!(table.find("ld", &[TReg, MemAbs16]).unwrap().size, 3);
        assert_eq!(table.find("st", &[MemAbs16, TReg]).unwrap().size, 3);
        assert_eq!(table.find("mov", &[TReg, TReg]).unwrap().size, 1);
        assert_eq!(table.find("push", &[TReg]).unwrap().size, 1);
        assert!(table.find("push", &[]).is_none());
    }

    #[test]
    fn register_tables_reject_wrong_widths() {
        let table = EncodeTable::new();
        assert!(table.ldi_imm8_opcode(Reg::AC).is_some());
        assert!(table.ldi_imm8_opcode(Reg::SP).is_none());
        assert!(table.ldi_imm16_opcode(Reg::SP).is_some());
        assert!(table.ldi_imm16_opcode(Reg::PC).is_none());
        assert!(table.ld_abs16_opcode(Reg::FR).is_some());
        assert!(table.ld_abs16_opcode(Reg::X).is_none());
        assert!(table.st_abs16_opcode(Reg::ZH).is_some());
        assert!(table.st_abs16_opcode(Reg::SP).is_none());
    }

    #[test]
    fn mov_pairs() {
        let table = EncodeTable::new();
        assert!(table.mov_opcode(Reg::AC, Reg::XH).is_some());
        assert!(table.mov_opcode(Reg::AC, Reg::AC).is_none());
        assert!(table.mov_opcode(Reg::SP, Reg::Z).is_some());
        assert!(table.mov_opcode(Reg::Z, Reg::SP).is_some());
        assert!(table.mov_opcode(Reg::Z, Reg::PC).is_some());
        assert!(table.mov_opcode(Reg::PC, Reg::Z).is_none());
    }

    #[test]
    fn imm_width_scan() {
        let table = EncodeTable::new();
        assert_eq!(table.imm_widths("ldi", 1), (true, true));
        assert_eq!(table.imm_widths("addi", 0), (true, false));
        assert_eq!(table.imm_widths("jmp", 0), (false, true));
        assert_eq!(table.imm_widths("nop", 0), (false, false));
    }

    #[test]
    fn control_flow_spellings() {
        let table = EncodeTable::new();
        for mnemonic in ["jnz", "jz", "jnc", "jc", "jp", "jm", "jmp"] {
            assert!(table.find(mnemonic, &[Imm16]).is_some(), "{mnemonic}");
            let indirect = format!("{mnemonic}x");
            assert!(table.find(&indirect, &[]).is_some(), "{indirect}");
        }
        for mnemonic in ["cnz", "cz", "cnc", "cc", "cp", "cm", "call"] {
            assert!(table.find(mnemonic, &[Imm16]).is_some(), "{mnemonic}");
        }
        for mnemonic in ["rnz", "rz", "rnc", "rc", "rp", "rm", "ret"] {
            assert!(table.find(mnemonic, &[]).is_some(), "{mnemonic}");
        }
    }

    macro_rules! test_implicit_family {
        ($($name:ident: $mnemonic:literal => $regs:expr, $absent:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let table = EncodeTable::new();
                    for reg in $regs {
                        let key = format!(concat!($mnemonic, "-{}"), reg);
                        assert!(table.find(&key, &[]).is_some(), "{key}");
                    }
                    for reg in $absent {
                        let key = format!(concat!($mnemonic, "-{}"), reg);
                        assert!(table.find(&key, &[]).is_none(), "{key}");
                    }
                }
            )*
        };
    }

    test_implicit_family! {
        implicit_push: "push" => [Reg::AC, Reg::FR, Reg::PC, Reg::X, Reg::Y, Reg::Z], [Reg::SP],
        implicit_pop: "pop" => [Reg::AC, Reg::FR, Reg::X, Reg::Y, Reg::Z], [Reg::PC, Reg::SP],
        implicit_add: "add" => ALU_REGS, [Reg::FR, Reg::SP, Reg::X],
        implicit_cmp: "cmp" => ALU_REGS, [Reg::FR, Reg::PC],
        implicit_inc: "inc" => ALU_REGS, [Reg::FR],
        implicit_ldx: "ldx" => IDX_REGS, [Reg::ZL, Reg::ZH, Reg::Z],
        implicit_stx: "stx" => IDX_REGS, [Reg::ZL, Reg::ZH, Reg::Z],
    }

    #[test]
    fn implicit_mnemonic_set() {
        assert!(EncodeTable::is_implicit_reg_mnemonic("push"));
        assert!(EncodeTable::is_implicit_reg_mnemonic("cmp"));
        assert!(!EncodeTable::is_implicit_reg_mnemonic("mov"));
        assert!(!EncodeTable::is_implicit_reg_mnemonic("ldi"));
        assert!(!EncodeTable::is_implicit_reg_mnemonic("jmp"));
    }
}
