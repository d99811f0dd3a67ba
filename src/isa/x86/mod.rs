//! x86 backend policy descriptors.
//!
//! Rather than one policy *object* per instruction *kind* threaded through
//! prototype sharing, this crate renders the policy table as a single
//! zero-sized [`X86Policy`] implementing one [`InstrPolicy`] trait, whose
//! methods match on [`Opcode`] (and, where the x86 encoding depends on it, on
//! the instruction's own `ty`). Family commonality — e.g. every two-address
//! arithmetic op sharing `dest_is_opnd0 == true` — lives in ordinary match
//! arms grouped by family, shared helper functions rather than inheritance.
//!
//! Every `box`-typed arithmetic, bitwise, or comparison instruction, and
//! every HIR op, lowers to a call through [`GenInfo::helper_symbol`] rather
//! than a direct x86 encoding: the runtime object model (property lookup,
//! generic numeric coercion, boxed equality, ...) is an external
//! collaborator, and this core only needs to know *where* to call it, not
//! what it does once called. `box`/non-`box` bitwise mixes (e.g.
//! `and<i32>(box, i32)`) are the one exception: this backend assumes a
//! pointer-tagging scheme with a zero tag bit on small integers, so raw
//! bitwise ops on a tagged `box` operand are valid x86 encodings without
//! untagging first, the way a tagged-integer JS VM typically arranges it.

pub mod backend;
pub mod registers;

pub use backend::X86Backend;

use crate::binemit::plan::{Assembler, JccCond, Operand};
use crate::entity::EntityRef;
use crate::ir::{AnyEntity, Block, CompareOp, Instruction, Opcode, Type};
use crate::isa::call_conv::CallConv;
use crate::result::FatalError;
use registers::Reg;

const RAX: &[Reg] = &[Reg::Rax];
const RDX: &[Reg] = &[Reg::Rdx];

/// A sentinel `rax` value the call family and `throw` use to signal "an
/// exception propagated" across the pseudo-ABI boundary, since nothing in
/// this core's scope defines the real boxed-exception encoding (a runtime
/// object-model concern). Chosen as a value no legal `box` pointer or
/// SMI can take: the all-ones pattern.
pub const EXCEPTION_SENTINEL: i64 = -1;

/// Shared, read-only backend context threaded through every `gen_code` call:
/// register width, stack pointer register, call-convention lookup, plus the
/// label/symbol resolution hooks `genCode` needs to emit branch targets,
/// runtime helper calls, and epilogue bookkeeping.
pub struct GenInfo<'a> {
    /// Target pointer width, for `pint`-sized lowering decisions (e.g.
    /// `cqo` vs `cdq` in `gen_divmod`).
    pub pointer_width: crate::ir::PointerWidth,
    /// The calling convention in effect, resolving argument/return
    /// registers for helper calls.
    pub call_conv: CallConv,
    /// Register reserved for the current runtime-context pointer
    /// (`get_ctx`/`set_ctx`). A fixed, allocator-excluded register rather
    /// than a spill slot, the way a JS VM conventionally pins its
    /// context/thread pointer for the life of a call.
    pub context_reg: Reg,
    /// Resolve a CFG edge to its edge-transition label.
    pub edge_label: &'a dyn Fn(Block, Block) -> crate::binemit::plan::Label,
    /// Resolve an opcode to the callable operand for its runtime helper.
    pub helper_symbol: &'a dyn Fn(Opcode) -> Operand,
    /// Each callee-save register's resolved spill-slot operand, in
    /// restore order.
    pub callee_saves: &'a [(Reg, Operand)],
    /// Total spill area size in bytes (0 if none).
    pub spill_size: i32,
}

/// The backend policy contract every instruction kind satisfies.
pub trait InstrPolicy {
    /// Operand `idx` cannot be a memory or immediate location.
    fn opnd_must_be_reg(&self, instr: &Instruction, idx: usize) -> bool;
    /// Restrict operand `idx` to a specific register set, if any.
    fn opnd_reg_set(&self, instr: &Instruction, idx: usize, call_conv: CallConv) -> Option<&'static [Reg]>;
    /// May an immediate of `bit_size` bits occupy operand `idx`?
    fn opnd_can_be_imm(&self, instr: &Instruction, idx: usize, bit_size: u8) -> bool;
    /// Upper bound on the number of immediate operands.
    fn max_imm_opnds(&self, instr: &Instruction) -> usize;
    /// Must the result slot be a register (as opposed to memory)?
    fn dest_must_be_reg(&self, instr: &Instruction) -> bool;
    /// Restrict the result slot to a specific register set, if any.
    fn dest_reg_set(&self, instr: &Instruction) -> Option<&'static [Reg]>;
    /// Does the result reuse operand-0's storage (two-address x86 forms)?
    fn dest_is_opnd0(&self, instr: &Instruction) -> bool;
    /// Additional registers clobbered beyond `dest` (e.g. `rdx` by unsigned
    /// `mul`).
    fn write_reg_set(&self, instr: &Instruction) -> Option<&'static [Reg]>;
    /// Emit assembly for `instr`.
    fn gen_code(
        &self,
        instr: &Instruction,
        opnds: &[Operand],
        dest: Option<Operand>,
        scratch: &[Reg],
        asm: &mut dyn Assembler,
        info: &GenInfo,
    ) -> Result<(), FatalError>;
}

fn unsupported(instr: &Instruction, what: impl Into<String>) -> FatalError {
    let at = instr.parent.map(AnyEntity::Block).unwrap_or_else(|| AnyEntity::Block(Block::new(0)));
    let what = what.into();
    log::debug!("x86: no lowering for {} ({})", instr.mnemonic, what);
    FatalError::Unsupported { at, what: format!("{}: {}", instr.mnemonic, what) }
}

fn jcc_for(op: CompareOp, signed: bool) -> JccCond {
    match (op, signed) {
        (CompareOp::Lt, true) => JccCond::Lt,
        (CompareOp::Lt, false) => JccCond::Below,
        (CompareOp::Lte, true) => JccCond::Le,
        (CompareOp::Lte, false) => JccCond::BelowEq,
        (CompareOp::Gt, true) => JccCond::Gt,
        (CompareOp::Gt, false) => JccCond::Above,
        (CompareOp::Gte, true) => JccCond::Ge,
        (CompareOp::Gte, false) => JccCond::AboveEq,
        (CompareOp::Eq, _) | (CompareOp::Seq, _) => JccCond::Eq,
        (CompareOp::Neq, _) | (CompareOp::Nseq, _) => JccCond::Ne,
    }
}

/// Every HIR op, plus the call family, always lowers through a runtime
/// helper call; arithmetic/bitwise/compare instructions join them only when
/// their own output type is `box` (see the module doc for the box/int
/// bitwise-mix exception).
fn is_helper_call(instr: &Instruction) -> bool {
    use Opcode::*;
    match instr.opcode {
        LNot | Typeof | InstanceOf | Catch | HasProp | EnumProps | DelPropVal | ArgObject | NewCell
        | GetCell | PutCell | NewClos | GetClos | PutClos | NewObj | NewArr | Call | Construct
        | GetPropVal | PutPropVal => true,
        Add | Sub | Mul | Div | Mod | AddOvf | SubOvf | MulOvf | BAnd | BOr | BXor | Shl | Shr | BNot
        | Compare => instr.ty == Type::Box,
        _ => false,
    }
}

/// Emit the "call a runtime helper with boxed arguments" lowering shared by
/// every HIR op and the call family: move `opnds` into the calling
/// convention's integer argument registers (in order; arities beyond the
/// available registers are a known limitation of this pseudo-backend, noted
/// in `DESIGN.md`), then call the resolved symbol. The result, if any, lands
/// in `rax` by calling-convention default.
fn gen_helper_call(
    instr: &Instruction,
    opnds: &[Operand],
    asm: &mut dyn Assembler,
    info: &GenInfo,
) -> Result<(), FatalError> {
    log::trace!("x86: {} routes through a runtime helper call", instr.mnemonic);
    let arg_regs = info.call_conv.int_arg_regs();
    for (i, &opnd) in opnds.iter().enumerate() {
        if i >= arg_regs.len() {
            return Err(unsupported(instr, "call arity exceeds modeled argument registers"));
        }
        asm.mov(Operand::Reg(arg_regs[i]), opnd);
    }
    asm.call((info.helper_symbol)(instr.opcode));
    Ok(())
}

/// After a helper call that may have raised (the call family, and
/// `box`-operand `add_ovf`/`sub_ovf`/`mul_ovf`), branch to `exceptional`
/// (the throw/overflow edge) when `rax` carries [`EXCEPTION_SENTINEL`],
/// otherwise fall through to `normal` if one is given.
fn gen_sentinel_branch(
    pred: Block,
    exceptional: Option<Block>,
    normal: Option<Block>,
    asm: &mut dyn Assembler,
    info: &GenInfo,
) {
    if let Some(exc) = exceptional {
        asm.cmp(Operand::Reg(Reg::Rax), Operand::Imm(EXCEPTION_SENTINEL));
        asm.jcc(JccCond::Eq, (info.edge_label)(pred, exc));
    }
    if let Some(n) = normal {
        asm.jmp((info.edge_label)(pred, n));
    }
}

fn reg_of(op: Operand, instr: &Instruction) -> Result<Reg, FatalError> {
    match op {
        Operand::Reg(r) => Ok(r),
        _ => Err(unsupported(instr, "pointer operand must resolve to a register")),
    }
}

fn imm_of(op: Operand, instr: &Instruction) -> Result<i32, FatalError> {
    match op {
        Operand::Imm(v) if v >= i32::min_value() as i64 && v <= i32::max_value() as i64 => Ok(v as i32),
        // A non-constant offset would need a base+index addressing mode;
        // `Assembler::mem`'s (bitsize, base, offset) shape has no slot
        // for an index register, so this is a real limitation of the
        // modeled assembler interface, not a shortcut taken here.
        _ => Err(unsupported(instr, "load/store offset must be a constant that fits i32")),
    }
}

fn gen_mul(instr: &Instruction, opnds: &[Operand], dest: Option<Operand>, asm: &mut dyn Assembler) -> Result<(), FatalError> {
    if instr.ty.is_signed() == Some(false) {
        // Unsigned mul: single-operand form, multiplicand pinned to
        // rax/eax by the policy, result in rdx:rax.
        asm.mul(opnds[1]);
        return Ok(());
    }
    let d = dest.ok_or_else(|| unsupported(instr, "missing dest"))?;
    if opnds[1].fits_imm(32) {
        asm.imul3(d, opnds[0], opnds[1]);
    } else {
        asm.imul2(d, opnds[1]);
    }
    Ok(())
}

fn gen_divmod(instr: &Instruction, opnds: &[Operand], asm: &mut dyn Assembler, info: &GenInfo) {
    if instr.ty.is_signed() == Some(true) {
        match info.pointer_width {
            crate::ir::PointerWidth::Bits64 if instr.ty.bytes() == 8 => asm.cqo(),
            _ => asm.cdq(),
        }
        asm.idiv(opnds[1]);
    } else {
        asm.mov(Operand::Reg(Reg::Rdx), Operand::Imm(0));
        asm.div(opnds[1]);
    }
}

fn gen_compare(instr: &Instruction, opnds: &[Operand], dest: Option<Operand>, asm: &mut dyn Assembler) -> Result<(), FatalError> {
    let op = instr.compare_op.ok_or_else(|| unsupported(instr, "compare with no comparison token"))?;
    let d = dest.ok_or_else(|| unsupported(instr, "missing dest"))?;
    // `box` is treated as signed (§4.1); an absent type param (shouldn't
    // happen for a validly-constructed `compare`) falls back to signed too.
    let signed = instr.type_params.get(0).copied().and_then(Type::is_signed).unwrap_or(true);
    asm.cmp(opnds[0], opnds[1]);
    asm.setcc(jcc_for(op, signed), d);
    Ok(())
}

fn gen_if(instr: &Instruction, opnds: &[Operand], pred: Block, asm: &mut dyn Assembler, info: &GenInfo) -> Result<(), FatalError> {
    // `If` carries only the single boolean operand its own validating
    // constructor requires, not the two-operand pair its stored
    // `CompareOp` would suggest fusing with a producing `compare`.
    // Reaching back into the graph for that producer isn't possible from
    // `gen_code`'s narrow (instr, opnds, dest, ...) signature, so this
    // tests the already-materialized `i8`/`box` value for truthiness
    // directly, against a literal zero, rather than re-deriving a second
    // operand. `compare_op` stays on the instruction for a front-end
    // peephole pass to consume; this emitter doesn't need it.
    let then_blk = instr.targets[0];
    let else_blk = instr.targets[1];
    asm.cmp(opnds[0], Operand::Imm(0));
    asm.jcc(JccCond::Ne, (info.edge_label)(pred, then_blk));
    asm.jmp((info.edge_label)(pred, else_blk));
    Ok(())
}

fn gen_move(instr: &Instruction, dest: Operand, src: Operand, asm: &mut dyn Assembler) -> Result<(), FatalError> {
    if let (Operand::Mem { .. }, Operand::Mem { .. }) = (dest, src) {
        return Err(unsupported(instr, "memory-to-memory move; the allocator must route through a register"));
    }
    asm.mov(dest, src);
    Ok(())
}

/// The x86 backend's sole policy object. A zero-sized singleton; no
/// per-session state lives here — policy tables are read-only after
/// module init.
pub struct X86Policy;

impl InstrPolicy for X86Policy {
    fn opnd_must_be_reg(&self, instr: &Instruction, idx: usize) -> bool {
        use Opcode::*;
        if is_helper_call(instr) {
            return true;
        }
        match instr.opcode {
            Add | Sub | Mul | AddOvf | SubOvf | MulOvf | BAnd | BOr | BXor | Shl | Shr | BNot | Compare => idx == 0,
            Div | Mod => true,
            Load | Store => idx == 0,
            Unbox | Box | ICast | IToF | FToI => idx == 0,
            SetCtx | Ret => true,
            Move => false,
            _ => false,
        }
    }

    fn opnd_reg_set(&self, instr: &Instruction, idx: usize, call_conv: CallConv) -> Option<&'static [Reg]> {
        use Opcode::*;
        if is_helper_call(instr) {
            let regs = call_conv.int_arg_regs();
            return if idx < regs.len() { Some(&regs[idx..idx + 1]) } else { None };
        }
        match instr.opcode {
            Mul if instr.ty.is_signed() == Some(false) && idx == 0 => Some(RAX),
            Div | Mod if idx == 0 => Some(RAX),
            Ret if idx == 0 => Some(RAX),
            _ => None,
        }
    }

    fn opnd_can_be_imm(&self, instr: &Instruction, idx: usize, bit_size: u8) -> bool {
        use Opcode::*;
        if is_helper_call(instr) {
            return false;
        }
        match instr.opcode {
            Add | Sub | Compare => idx == 1 && bit_size <= 32,
            Mul if instr.ty.is_signed() != Some(false) => idx == 1 && bit_size <= 32,
            BAnd | BOr | BXor => idx == 1 && bit_size <= 32,
            Shl | Shr => idx == 1 && bit_size <= 8,
            Load if idx == 1 => bit_size <= 32,
            Store if idx == 1 || idx == 2 => bit_size <= 32,
            _ => false,
        }
    }

    fn max_imm_opnds(&self, instr: &Instruction) -> usize {
        use Opcode::*;
        if is_helper_call(instr) {
            return 0;
        }
        match instr.opcode {
            Add | Sub | Compare | Mul | BAnd | BOr | BXor | Shl | Shr => 1,
            Store => 2,
            Load => 1,
            Move => 1,
            _ => 0,
        }
    }

    fn dest_must_be_reg(&self, instr: &Instruction) -> bool {
        !matches!(instr.opcode, Opcode::Store | Opcode::SetCtx | Opcode::Jump | Opcode::Ret | Opcode::Throw)
            && instr.ty != Type::None
    }

    fn dest_reg_set(&self, instr: &Instruction) -> Option<&'static [Reg]> {
        use Opcode::*;
        if is_helper_call(instr) {
            return if instr.ty == Type::None { None } else { Some(RAX) };
        }
        match instr.opcode {
            Mul if instr.ty.is_signed() == Some(false) => Some(RAX),
            Div => Some(RAX),
            Mod => Some(RDX),
            _ => None,
        }
    }

    fn dest_is_opnd0(&self, instr: &Instruction) -> bool {
        use Opcode::*;
        if is_helper_call(instr) {
            return false;
        }
        match instr.opcode {
            // Unsigned mul is fixed-register (rdx:rax), not two-address:
            // its destination is pinned via `dest_reg_set`/`write_reg_set`,
            // not a reuse of operand 0's storage.
            Mul if instr.ty.is_signed() == Some(false) => false,
            Add | Sub | Mul | AddOvf | SubOvf | MulOvf | BAnd | BOr | BXor | Shl | Shr | BNot => true,
            _ => false,
        }
    }

    fn write_reg_set(&self, instr: &Instruction) -> Option<&'static [Reg]> {
        use Opcode::*;
        match instr.opcode {
            Mul if instr.ty.is_signed() == Some(false) => Some(RDX),
            Div => Some(RDX),
            Mod => Some(RAX),
            _ => None,
        }
    }

    fn gen_code(
        &self,
        instr: &Instruction,
        opnds: &[Operand],
        dest: Option<Operand>,
        scratch: &[Reg],
        asm: &mut dyn Assembler,
        info: &GenInfo,
    ) -> Result<(), FatalError> {
        use Opcode::*;
        let _ = scratch;
        let pred = instr.parent.ok_or_else(|| unsupported(instr, "unattached instruction"))?;

        if is_helper_call(instr) {
            gen_helper_call(instr, opnds, asm, info)?;
            match instr.opcode {
                Call | Construct | GetPropVal | PutPropVal => {
                    gen_sentinel_branch(pred, instr.throw_target(), instr.continue_target(), asm, info);
                }
                AddOvf | SubOvf | MulOvf => {
                    gen_sentinel_branch(pred, instr.targets.get(1).copied(), instr.targets.get(0).copied(), asm, info);
                }
                _ => {}
            }
            return Ok(());
        }

        match instr.opcode {
            Add => asm.add(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            Sub => asm.sub(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            Mul => gen_mul(instr, opnds, dest, asm)?,
            Div => gen_divmod(instr, opnds, asm, info),
            Mod => gen_divmod(instr, opnds, asm, info),
            AddOvf | SubOvf | MulOvf => {
                let d = dest.ok_or_else(|| unsupported(instr, "missing dest"))?;
                match instr.opcode {
                    AddOvf => asm.add(d, opnds[1]),
                    SubOvf => asm.sub(d, opnds[1]),
                    MulOvf => asm.imul2(d, opnds[1]),
                    _ => unreachable!(),
                }
                let normal = instr.targets.get(0).copied();
                let overflow = instr.targets.get(1).copied();
                if let Some(ov) = overflow {
                    asm.jcc(JccCond::Overflow, (info.edge_label)(pred, ov));
                }
                if let Some(n) = normal {
                    asm.jmp((info.edge_label)(pred, n));
                }
            }
            BAnd => asm.and(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            BOr => asm.or(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            BXor => asm.xor(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            Shl => asm.sal(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            Shr => asm.sar(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[1]),
            BNot => asm.not(dest.ok_or_else(|| unsupported(instr, "missing dest"))?),
            Compare => gen_compare(instr, opnds, dest, asm)?,
            Jump => {
                let target = instr.targets[0];
                asm.jmp((info.edge_label)(pred, target));
            }
            Ret => {
                for &(reg, slot) in info.callee_saves {
                    asm.mov(Operand::Reg(reg), slot);
                }
                if info.spill_size != 0 {
                    asm.add(Operand::Reg(Reg::Rsp), Operand::Imm(info.spill_size as i64));
                }
                asm.ret();
            }
            If => gen_if(instr, opnds, pred, asm, info)?,
            Throw => {
                asm.mov(Operand::Reg(info.call_conv.int_arg_regs()[0]), opnds[0]);
                asm.call((info.helper_symbol)(Opcode::Throw));
                if let Some(catch) = instr.targets.get(0).copied() {
                    asm.jmp((info.edge_label)(pred, catch));
                }
            }
            Unbox | Box | ICast => asm.mov(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[0]),
            IToF => asm.cvt_i2f(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[0]),
            FToI => asm.cvt_f2i(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, opnds[0]),
            Load => {
                let ptr = reg_of(opnds[0], instr)?;
                let offset = imm_of(opnds[1], instr)?;
                let mem = asm.mem(instr.ty.bytes() * 8, ptr, offset);
                asm.mov(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, mem);
            }
            Store => {
                let ptr = reg_of(opnds[0], instr)?;
                let offset = imm_of(opnds[1], instr)?;
                let value_ty = instr.type_params.get(0).copied().unwrap_or(Type::Rptr);
                let mem = asm.mem(value_ty.bytes() * 8, ptr, offset);
                asm.mov(mem, opnds[2]);
            }
            GetCtx => asm.mov(dest.ok_or_else(|| unsupported(instr, "missing dest"))?, Operand::Reg(info.context_reg)),
            SetCtx => asm.mov(Operand::Reg(info.context_reg), opnds[0]),
            Move => {
                let d = dest.ok_or_else(|| unsupported(instr, "missing dest"))?;
                gen_move(instr, d, opnds[0], asm)?;
            }
            Arg | GetNumArgs | GetArgTable | Phi => {
                return Err(unsupported(instr, "pseudo-instruction reached gen_code"));
            }
            _ => return Err(unsupported(instr, "no x86 lowering for this opcode")),
        }
        Ok(())
    }
}

/// The x86 backend's single policy object.
pub fn policy() -> &'static dyn InstrPolicy {
    &X86Policy
}
