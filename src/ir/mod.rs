//! The typed SSA IR core (§3, §4.1-§4.4): types, values, constants,
//! instructions, basic blocks, and the function arena that owns them all.

pub mod block;
pub mod constant;
pub mod function;
pub mod instructions;
pub mod types;
pub mod value;

pub use block::BlockData;
pub use constant::ConstantPool;
pub use function::IrFunction;
pub use instructions::{CompareOp, Instruction, Opcode};
pub use types::{PointerWidth, Type};
pub use value::{AnyEntity, Argument, ArgumentData, Block, Constant, ConstantData, Inst, Literal, Value};
