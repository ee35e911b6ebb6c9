use serde::{Deserialize, Serialize};

/// Operand type of a single instruction argument. A signature is the
/// vector of operand types of all arguments, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandType {
    None,
    Reg,
    Imm8,
    Imm16,
    Label,
    MemAbs16,
}

impl OperandType {
    /// Bytes this operand contributes after the opcode byte.
    pub fn width(self) -> u8 {
        match self {
            OperandType::None | OperandType::Reg => 0,
            OperandType::Imm8 => 1,
            OperandType::Imm16 | OperandType::Label | OperandType::MemAbs16 => 2,
        }
    }
}
