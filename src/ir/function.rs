//! `IrFunction`: the arena that owns a function's values, instructions and
//! blocks (Design Notes §9 "Cyclic graphs ... require arena-with-index
//! representation").
//!
//! Everything that would be a pointer or `Rc` cycle in a naive port —
//! instruction↔block, use↔dest, block↔CFG — is instead a small `Copy` index
//! into one of the arenas owned here, exactly as `cranelift-codegen::ir`
//! splits this responsibility between `DataFlowGraph` and `Layout`. This
//! crate collapses both into one `IrFunction`, since its scope (one
//! self-contained IR + emission core, not a multi-target compiler with
//! serialization and legalization passes) doesn't need them kept separate.

use crate::entity::PrimaryMap;
use crate::ir::block::BlockData;
use crate::ir::constant::ConstantPool;
use crate::ir::instructions::Instruction;
use crate::ir::types::{PointerWidth, Type};
use crate::ir::value::{Argument, ArgumentData, Block, Inst, Literal, Value};
use crate::result::IrResult;
use std::fmt;

/// Owns a function body: its formal parameters, constant pool, basic blocks
/// and instructions, and the pointer width its session was configured with
/// (needed to resolve `pint`-dependent instruction rules, e.g. `sub(rptr,
/// rptr)`).
#[derive(Clone)]
pub struct IrFunction {
    /// User-visible function name, for pretty-printing.
    pub name: String,
    /// Target pointer width this function was built for.
    pub pointer_width: PointerWidth,
    /// Formal parameters, in declaration order.
    pub arguments: PrimaryMap<Argument, ArgumentData>,
    /// Uniqued constant pool.
    pub constants: ConstantPool,
    /// All basic blocks belonging to this function.
    pub blocks: PrimaryMap<Block, BlockData>,
    /// All instructions belonging to this function.
    pub insts: PrimaryMap<Inst, Instruction>,
    entry: Option<Block>,
}

impl IrFunction {
    /// Create a new, empty function.
    pub fn new(name: impl Into<String>, pointer_width: PointerWidth) -> Self {
        IrFunction {
            name: name.into(),
            pointer_width,
            arguments: PrimaryMap::new(),
            constants: ConstantPool::new(),
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            entry: None,
        }
    }

    /// Declare a formal parameter, returning a [`Value`] naming it.
    pub fn append_argument(&mut self, name: impl Into<String>, ty: Type) -> Value {
        let index = self.arguments.len() as u32;
        let arg = self.arguments.push(ArgumentData { ty, name: name.into(), index });
        Value::Arg(arg)
    }

    /// Request a uniqued constant, returning a [`Value`] naming it.
    pub fn const_value(&mut self, literal: Literal, ty: Type) -> Value {
        Value::Const(self.constants.get_const(literal, ty))
    }

    /// Create a new empty basic block. The first block created becomes the
    /// entry block.
    pub fn create_block(&mut self, name: impl Into<String>) -> Block {
        let mut data = BlockData::new();
        data.name = Some(name.into());
        let b = self.blocks.push(data);
        if self.entry.is_none() {
            self.entry = Some(b);
        }
        b
    }

    /// The function's entry block, if any has been created.
    pub fn entry_block(&self) -> Option<Block> {
        self.entry
    }

    /// The type of any value reachable from this function: a constant's
    /// declared type, an argument's declared type, or an instruction's
    /// output type.
    pub fn value_type(&self, v: Value) -> Type {
        match v {
            Value::Const(c) => self.constants.data(c).ty,
            Value::Arg(a) => self.arguments[a].ty,
            Value::Inst(i) => self.insts[i].ty,
        }
    }

    /// Append `inst` to the end of `block`, wiring the use→dest back-links
    /// (§3: `a ∈ b.dests ⇔ b ∈ a.uses`) and, if `inst` is a branch, the
    /// block-level CFG edges to its targets.
    ///
    /// This is the one place those links are established: the
    /// `ir::instructions` constructors can't reach into another arena slot
    /// themselves, since at construction time the instruction isn't in any
    /// arena yet.
    pub fn append_inst(&mut self, block: Block, inst: Instruction) -> Inst {
        let targets = inst.targets.clone();
        let uses = inst.uses.clone();
        let id = self.insts.push(inst);
        self.insts[id].parent = Some(block);
        self.blocks[block].push_inst(id);

        for u in uses {
            if let Value::Inst(producer) = u {
                self.insts[producer].add_dest(id);
            }
        }
        for t in targets {
            self.blocks[block].add_succ(t);
            self.blocks[t].add_pred(block);
            log::trace!("cfg: {} -> {}", block, t);
        }
        id
    }

    /// Append an incoming `(value, pred)` pair to a phi instruction already
    /// inserted into the graph, maintaining the dest back-link if the
    /// incoming value is itself an instruction (§4.4).
    pub fn phi_add_incoming(&mut self, phi: Inst, value: Value, pred: Block) -> IrResult<()> {
        let value_ty = self.value_type(value);
        self.insts[phi].add_incoming(value, value_ty, pred)?;
        if let Value::Inst(producer) = value {
            self.insts[producer].add_dest(phi);
        }
        Ok(())
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "function {}() {{", self.name)?;
        for (b, data) in self.blocks.iter() {
            writeln!(f, "{}:", data.name.as_deref().unwrap_or(&b.to_string()))?;
            for &inst in &data.insts {
                writeln!(f, "    {}", self.insts[inst])?;
            }
        }
        write!(f, "}}")
    }
}
