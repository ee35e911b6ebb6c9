pub mod encode;
pub mod operand;
pub mod reg;

pub use encode::{EncodeTable, OpcodeSpecs};
pub use operand::OperandType;
pub use reg::Reg;
