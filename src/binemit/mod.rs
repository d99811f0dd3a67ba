//! Binary emission: the external allocator/assembler interfaces (§6) and the
//! driver that walks a function against them (§4.6).

pub mod emit;
pub mod plan;

pub use emit::{emit_function, BackendConfig};
pub use plan::{AbstractMove, AllocationPlan, Assembler, InstrAllocation, JccCond, Label, Operand, StackMap};
