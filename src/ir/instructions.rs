//! The instruction taxonomy (§4.3) and phi/branch linkage (§4.4).
//!
//! Rather than a prototype chain with per-family subclasses, each kind of
//! instruction is a tag on one [`Opcode`] enum and every instance is a single
//! [`Instruction`] struct carrying the union of fields any kind might need.
//! Family commonality (arithmetic, compare, call) lives in free validating
//! functions, not inheritance; `Opcode` is the only thing that distinguishes
//! "what kind of instruction is this" at runtime.
//!
//! Constructors validate eagerly and return [`IrResult`], wrapping failures
//! with the mnemonic per §7. They take already-typed operands (`(Value,
//! Type)` pairs) rather than reaching into a graph themselves: resolving a
//! `Value`'s type, and wiring `dests` back-links, is `IrFunction`'s job
//! (`ir/function.rs`), not this module's.

use crate::ir::types::{PointerWidth, Type};
use crate::ir::value::{Block, Inst, Value};
use crate::result::{FatalError, InvalidInstruction, IrResult};
use std::fmt;

/// Comparison token shared between `if`/compare instructions and the x86
/// jcc selection in the emitter (§4.6 "If-instruction lowering").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Abstract (JS `==`) equality.
    Eq,
    /// Abstract (JS `!=`) inequality.
    Neq,
    /// Strict JS equality (`===`); accepts any `box` pair.
    Seq,
    /// Strict JS inequality (`!==`); accepts any `box` pair.
    Nseq,
}

impl CompareOp {
    /// Is this one of the two strict-equality tokens? Strict tokens accept
    /// any `box` pair rather than requiring both operands to be numeric.
    pub fn is_strict(self) -> bool {
        matches!(self, CompareOp::Seq | CompareOp::Nseq)
    }

    fn mnemonic(self) -> &'static str {
        match self {
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Eq => "eq",
            CompareOp::Neq => "neq",
            CompareOp::Seq => "seq",
            CompareOp::Nseq => "nseq",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The kind of an instruction. Determines which fields of [`Instruction`]
/// are meaningful and which family rule validated its construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    // HIR (boxed) family.
    /// Logical not on a `box` value.
    LNot,
    /// JS `typeof`.
    Typeof,
    /// JS `instanceof`.
    InstanceOf,
    /// Materialize the in-flight exception at a catch block's entry.
    Catch,
    /// JS `in` property test.
    HasProp,
    /// Enumerate an object's own/inherited enumerable property keys.
    EnumProps,
    /// JS `delete obj[key]`.
    DelPropVal,
    /// Create the `arguments` object for the current call.
    ArgObject,
    /// Allocate a fresh mutable cell (captured-variable storage).
    NewCell,
    /// Read a mutable cell's current value.
    GetCell,
    /// Write a mutable cell's value.
    PutCell,
    /// Allocate a closure object.
    NewClos,
    /// Read a closure's captured slot.
    GetClos,
    /// Write a closure's captured slot.
    PutClos,
    /// Allocate a fresh plain object.
    NewObj,
    /// Allocate a fresh array of the given length.
    NewArr,

    // Arithmetic.
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Mod,
    /// Addition with an overflow-detection branch.
    AddOvf,
    /// Subtraction with an overflow-detection branch.
    SubOvf,
    /// Multiplication with an overflow-detection branch.
    MulOvf,

    // Bitwise.
    /// Bitwise AND.
    BAnd,
    /// Bitwise OR.
    BOr,
    /// Bitwise XOR.
    BXor,
    /// Left shift.
    Shl,
    /// Right shift.
    Shr,
    /// Bitwise NOT (unary).
    BNot,

    // Comparison.
    /// A comparison; the specific operator is carried in `compare_op`.
    Compare,

    // Control flow.
    /// Unconditional branch.
    Jump,
    /// Function return.
    Ret,
    /// Conditional branch.
    If,
    /// Throw the given `box` value as an exception.
    Throw,

    // Call family.
    /// JS function call.
    Call,
    /// JS `new` construction.
    Construct,
    /// JS property read, which may invoke a getter.
    GetPropVal,
    /// JS property write, which may invoke a setter.
    PutPropVal,

    // Conversions.
    /// Unbox a `box` value to a raw numeric/pointer type.
    Unbox,
    /// Box a raw numeric/pointer value.
    Box,
    /// Integer-width (or box/rptr) cast.
    ICast,
    /// Integer-to-float conversion.
    IToF,
    /// Float-to-integer conversion.
    FToI,

    // Memory.
    /// Load a typed value from memory.
    Load,
    /// Store a typed value to memory.
    Store,
    /// Read the current runtime-context pointer.
    GetCtx,
    /// Write the current runtime-context pointer.
    SetCtx,

    // LIR.
    /// A register-allocator-introduced move (`move src, dst`).
    Move,
    /// An SSA phi node.
    Phi,

    // Pseudo (skipped during emission, §4.6 step 3c).
    /// Pseudo-instruction naming a formal parameter.
    Arg,
    /// Pseudo-instruction yielding the caller-supplied argument count.
    GetNumArgs,
    /// Pseudo-instruction yielding a pointer to the raw argument table.
    GetArgTable,
}

impl Opcode {
    /// Base mnemonic before type-suffix synthesis (§3 "Mnemonic synthesis").
    fn base(self) -> &'static str {
        use Opcode::*;
        match self {
            LNot => "not",
            Typeof => "typeof",
            InstanceOf => "instanceof",
            Catch => "catch",
            HasProp => "has_prop",
            EnumProps => "enum_props",
            DelPropVal => "del_prop_val",
            ArgObject => "arg_object",
            NewCell => "new_cell",
            GetCell => "get_cell",
            PutCell => "put_cell",
            NewClos => "new_clos",
            GetClos => "get_clos",
            PutClos => "put_clos",
            NewObj => "new_obj",
            NewArr => "new_arr",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            AddOvf => "add_ovf",
            SubOvf => "sub_ovf",
            MulOvf => "mul_ovf",
            BAnd => "and",
            BOr => "or",
            BXor => "xor",
            Shl => "shl",
            Shr => "shr",
            BNot => "bnot",
            Compare => "cmp",
            Jump => "jump",
            Ret => "ret",
            If => "if",
            Throw => "throw",
            Call => "call",
            Construct => "construct",
            GetPropVal => "get_prop_val",
            PutPropVal => "put_prop_val",
            Unbox => "unbox",
            Box => "box",
            ICast => "icast",
            IToF => "itof",
            FToI => "ftoi",
            Load => "load",
            Store => "store",
            GetCtx => "get_ctx",
            SetCtx => "set_ctx",
            Move => "move",
            Phi => "phi",
            Arg => "arg",
            GetNumArgs => "get_num_args",
            GetArgTable => "get_arg_table",
        }
    }

    /// Is this one of the pseudo-instructions the emitter skips outright?
    pub fn is_pseudo(self) -> bool {
        matches!(self, Opcode::Arg | Opcode::GetNumArgs | Opcode::GetArgTable | Opcode::Phi)
    }
}

/// Build the synthesized mnemonic for an instruction with no caller-fixed
/// name, per §3: explicit type params win; else a single shared, non-`box`
/// input type; else every input type in order.
fn synthesize_mnemonic(base: &str, type_params: &[Type], input_types: &[Type]) -> String {
    if !type_params.is_empty() {
        let mut s = base.to_string();
        for t in type_params {
            s.push('_');
            s.push_str(t.name());
        }
        return s;
    }
    if !input_types.is_empty() {
        let first = input_types[0];
        if first != Type::Box && input_types.iter().all(|&t| t == first) {
            return format!("{}_{}", base, first.name());
        }
    }
    if input_types.is_empty() {
        return base.to_string();
    }
    let mut s = base.to_string();
    for t in input_types {
        s.push('_');
        s.push_str(t.name());
    }
    s
}

/// A single IR instruction (§3 "Instruction").
///
/// `dests` is maintained by `IrFunction`, not by the constructors here: an
/// instruction has no way to reach into another instruction's storage until
/// both live in the same arena.
#[derive(Clone, Debug)]
pub struct Instruction {
    /// The operation this instruction performs.
    pub opcode: Opcode,
    /// Result type; `Type::None` if the instruction produces no value.
    pub ty: Type,
    /// Explicit output name, if the front end set one; else the printer
    /// synthesizes `$t_<id>` from the instruction's arena index.
    pub name: Option<String>,
    /// The printable mnemonic, possibly type-suffixed (`synthesize_mnemonic`).
    pub mnemonic: String,
    /// Explicit type parameters, e.g. the `T` in `icast<T>`/`unbox<T>`.
    pub type_params: Vec<Type>,
    /// Operand values, in operand order.
    pub uses: Vec<Value>,
    /// Branch targets, if any; empty for non-branching instructions.
    pub targets: Vec<Block>,
    /// Whether this instruction has an observable side effect and must not
    /// be reordered or eliminated even if its result is unused.
    pub side_effects: bool,
    /// The block this instruction currently belongs to, if appended.
    pub parent: Option<Block>,
    /// Instructions that consume this instruction's value, i.e. the
    /// use-list inverted: `self ∈ other.uses ⇒ other ∈ self.dests`.
    pub dests: Vec<Inst>,
    /// Parallel to `uses`, one predecessor block per incoming value.
    /// Non-empty only for `Opcode::Phi`.
    pub preds: Vec<Block>,
    /// The comparison token for `Opcode::Compare`/`Opcode::If`; `None` for
    /// every other opcode.
    pub compare_op: Option<CompareOp>,
}

impl Instruction {
    /// Build an instruction whose mnemonic carries no type suffix (control
    /// flow, phi, pseudo-instructions — kinds where §3's synthesis rule
    /// would either be moot or is overridden explicitly by the caller).
    fn new(opcode: Opcode, ty: Type, uses: Vec<Value>, targets: Vec<Block>, side_effects: bool) -> Self {
        Instruction::new_with_types(opcode, ty, uses, &[], targets, side_effects)
    }

    /// Build an instruction, synthesizing its mnemonic from `input_types`
    /// per §3: a single shared non-`box` type gets one suffix, otherwise
    /// every input type is appended in order.
    fn new_with_types(
        opcode: Opcode,
        ty: Type,
        uses: Vec<Value>,
        input_types: &[Type],
        targets: Vec<Block>,
        side_effects: bool,
    ) -> Self {
        let mnemonic = synthesize_mnemonic(opcode.base(), &[], input_types);
        Instruction {
            opcode,
            ty,
            name: None,
            mnemonic,
            type_params: Vec::new(),
            uses,
            targets,
            side_effects,
            parent: None,
            dests: Vec::new(),
            preds: Vec::new(),
            compare_op: None,
        }
    }

    /// Is this instruction a branch? True whenever it has explicit targets,
    /// and unconditionally true for `ret`/`throw` even though they carry at
    /// most one (for `throw`, optional) target (§4.4).
    pub fn is_branch(&self) -> bool {
        !self.targets.is_empty() || matches!(self.opcode, Opcode::Ret | Opcode::Throw)
    }

    /// Produce an orphan clone: same mnemonic, type parameters, uses,
    /// targets and output name, but no parent block and no dests (§3
    /// "Lifecycles").
    pub fn copy(&self) -> Instruction {
        Instruction {
            opcode: self.opcode,
            ty: self.ty,
            name: self.name.clone(),
            mnemonic: self.mnemonic.clone(),
            type_params: self.type_params.clone(),
            uses: self.uses.clone(),
            targets: self.targets.clone(),
            side_effects: self.side_effects,
            parent: None,
            dests: Vec::new(),
            preds: self.preds.clone(),
            compare_op: self.compare_op,
        }
    }

    /// Replace every occurrence of `old` in `uses` with `new`. Set-semantic
    /// `dests` bookkeeping on the referenced instructions is the caller's
    /// (`IrFunction`'s) responsibility, since it touches other arena slots.
    pub fn repl_use(&mut self, old: Value, new: Value) {
        for u in self.uses.iter_mut() {
            if *u == old {
                *u = new;
            }
        }
    }

    /// Replace every occurrence of `old` in `dests` with `new`. The source
    /// names this `replDest`; per Design Notes §9 it is treated as a typo
    /// for the obviously-intended mirror of [`Instruction::repl_use`].
    pub fn repl_dest(&mut self, old: Inst, new: Inst) {
        for d in self.dests.iter_mut() {
            if *d == old {
                *d = new;
            }
        }
    }

    /// Idempotently add `d` to `dests`.
    pub fn add_dest(&mut self, d: Inst) {
        if !self.dests.contains(&d) {
            self.dests.push(d);
        }
    }

    /// Idempotently remove `d` from `dests`.
    pub fn remove_dest(&mut self, d: Inst) {
        self.dests.retain(|&x| x != d);
    }

    // ---- Phi linkage (§4.4) -------------------------------------------

    /// Construct an empty phi; its type becomes concrete on the first
    /// `add_incoming` call.
    pub fn phi() -> Instruction {
        Instruction::new(Opcode::Phi, Type::None, Vec::new(), Vec::new(), false)
    }

    /// Append an incoming `(value, pred)` pair. The first call fixes the
    /// phi's type; later calls must agree with it.
    pub fn add_incoming(&mut self, value: Value, value_ty: Type, pred: Block) -> IrResult<()> {
        debug_assert_eq!(self.opcode, Opcode::Phi);
        if self.uses.is_empty() {
            self.ty = value_ty;
        } else if self.ty != value_ty {
            return Err(InvalidInstruction::new(
                &self.mnemonic,
                format!("phi type mismatch: expected {}, got {}", self.ty, value_ty),
            ));
        }
        self.uses.push(value);
        self.preds.push(pred);
        Ok(())
    }

    /// The value flowing in from `pred`, or a fatal error if `pred` is not
    /// one of this phi's recorded predecessors.
    pub fn get_incoming(&self, pred: Block) -> Result<Value, FatalError> {
        self.preds
            .iter()
            .position(|&p| p == pred)
            .map(|i| self.uses[i])
            .ok_or_else(|| FatalError::UnknownPredecessor(pred.to_string()))
    }

    /// Rewrite a predecessor slot in place, leaving the matching `uses`
    /// entry untouched.
    pub fn repl_pred(&mut self, old: Block, new: Block) -> Result<(), FatalError> {
        let slot = self
            .preds
            .iter_mut()
            .find(|p| **p == old)
            .ok_or_else(|| FatalError::UnknownPredecessor(old.to_string()))?;
        *slot = new;
        Ok(())
    }

    // ---- Call-family continuation/throw targets ------------------------
    //
    // Stored positionally in `targets`, trimming trailing absent roles
    // (§4.3): `[]`, `[continue]`, or `[continue, throw]`. A `throw` target
    // without a `continue` target cannot be represented positionally and is
    // not a combination the source ever produces.

    /// The block execution resumes in after a successful call, if any.
    pub fn continue_target(&self) -> Option<Block> {
        self.targets.get(0).copied()
    }

    /// The block execution transfers to if the call raises, if any.
    pub fn throw_target(&self) -> Option<Block> {
        if self.targets.len() == 2 {
            Some(self.targets[1])
        } else {
            None
        }
    }

    /// Set this call-family instruction's continue/throw targets.
    pub fn set_call_targets(&mut self, continue_target: Option<Block>, throw_target: Option<Block>) {
        self.targets.clear();
        if let Some(c) = continue_target {
            self.targets.push(c);
            if let Some(t) = throw_target {
                self.targets.push(t);
            }
        }
    }
}

// ---- Family validation helpers (Design Notes §9: shared helpers, not
// inheritance) --------------------------------------------------------

fn all_boxed(types: &[Type]) -> bool {
    types.iter().all(|&t| t == Type::Box)
}

fn wrap<T>(mnemonic: &str, r: Result<T, String>) -> IrResult<T> {
    r.map_err(|reason| InvalidInstruction::new(mnemonic, reason))
}

// ---- HIR family (§4.3 "HIR family (boxed)") --------------------------
//
// All inputs box; output box unless void; side effects set for mutating ops.

fn hir(opcode: Opcode, inputs: Vec<(Value, Type)>, side_effects: bool, out_ty: Type) -> IrResult<Instruction> {
    let mnemonic = opcode.base();
    let types: Vec<Type> = inputs.iter().map(|(_, t)| *t).collect();
    wrap(mnemonic, if all_boxed(&types) { Ok(()) } else { Err("all HIR operands must be box".into()) })?;
    let uses = inputs.into_iter().map(|(v, _)| v).collect();
    Ok(Instruction::new_with_types(opcode, out_ty, uses, &types, Vec::new(), side_effects))
}

impl Instruction {
    /// Logical not on a `box` value.
    pub fn lnot(v: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::LNot, vec![v], false, Type::Box)
    }
    /// JS `typeof`.
    pub fn typeof_(v: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::Typeof, vec![v], false, Type::Box)
    }
    /// JS `instanceof`.
    pub fn instance_of(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::InstanceOf, vec![a, b], false, Type::Box)
    }
    /// Fetch the currently-propagating exception value.
    pub fn catch() -> IrResult<Instruction> {
        hir(Opcode::Catch, vec![], false, Type::Box)
    }
    /// JS `in` operator.
    pub fn has_prop(obj: (Value, Type), key: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::HasProp, vec![obj, key], false, Type::Box)
    }
    /// Build an iterator over an object's enumerable property names.
    pub fn enum_props(obj: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::EnumProps, vec![obj], false, Type::Box)
    }
    /// JS `delete obj[key]`.
    pub fn del_prop_val(obj: (Value, Type), key: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::DelPropVal, vec![obj, key], true, Type::Box)
    }
    /// Build the `arguments` object for the current call.
    pub fn arg_object() -> IrResult<Instruction> {
        hir(Opcode::ArgObject, vec![], false, Type::Box)
    }
    /// Allocate a new closure variable cell.
    pub fn new_cell(v: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::NewCell, vec![v], false, Type::Box)
    }
    /// Read the current value of a closure variable cell.
    pub fn get_cell(cell: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::GetCell, vec![cell], false, Type::Box)
    }
    /// Write a new value into a closure variable cell.
    pub fn put_cell(cell: (Value, Type), v: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::PutCell, vec![cell, v], true, Type::None)
    }
    /// Allocate a new closure object.
    pub fn new_clos() -> IrResult<Instruction> {
        hir(Opcode::NewClos, vec![], false, Type::Box)
    }
    /// Read a captured cell out of a closure by index.
    pub fn get_clos(clos: (Value, Type), idx: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::GetClos, vec![clos, idx], false, Type::Box)
    }
    /// Write a captured cell into a closure by index.
    pub fn put_clos(clos: (Value, Type), idx: (Value, Type), v: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::PutClos, vec![clos, idx, v], true, Type::None)
    }
    /// Allocate a new plain object.
    pub fn new_obj() -> IrResult<Instruction> {
        hir(Opcode::NewObj, vec![], false, Type::Box)
    }
    /// Allocate a new array of the given length.
    pub fn new_arr(len: (Value, Type)) -> IrResult<Instruction> {
        hir(Opcode::NewArr, vec![len], false, Type::Box)
    }

    // ---- Arithmetic (§4.3 "Arithmetic (no overflow)") ------------------

    /// Addition. Accepts matching numeric types, or a pointer-arithmetic
    /// overload of `rptr + pint`.
    pub fn add(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        // The pointer-arithmetic overload keeps the bare mnemonic rather
        // than a type-suffixed one (§8 "add(ptrVal:rptr, offsetVal:pint)
        // ... mnemonic add"); only the uniform-type case gets a suffix.
        let (out, mnemonic_types): (Type, &[Type]) = if aty == bty {
            (aty, &[aty, bty][..])
        } else if aty == Type::Rptr && bty.is_int() {
            (Type::Rptr, &[][..])
        } else {
            return Err(InvalidInstruction::new(
                Opcode::Add.base(),
                format!("incompatible operand types {} and {}", aty, bty),
            ));
        };
        Ok(Instruction::new_with_types(Opcode::Add, out, vec![av, bv], mnemonic_types, Vec::new(), false))
    }

    /// Subtraction. Accepts matching numeric types, `rptr - pint`, or
    /// `rptr - rptr` (yielding `pint` at `width`).
    pub fn sub(a: (Value, Type), b: (Value, Type), width: PointerWidth) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        let (out, mnemonic_types): (Type, &[Type]) = if aty == bty && aty != Type::Rptr {
            (aty, &[aty, bty][..])
        } else if aty == Type::Rptr && bty.is_int() {
            (Type::Rptr, &[][..])
        } else if aty == Type::Rptr && bty == Type::Rptr {
            (Type::pint(width), &[][..])
        } else {
            return Err(InvalidInstruction::new(
                Opcode::Sub.base(),
                format!("incompatible operand types {} and {}", aty, bty),
            ));
        };
        Ok(Instruction::new_with_types(Opcode::Sub, out, vec![av, bv], mnemonic_types, Vec::new(), false))
    }

    fn default_arith(opcode: Opcode, a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        if aty != bty {
            return Err(InvalidInstruction::new(
                opcode.base(),
                format!("operand types {} and {} must match", aty, bty),
            ));
        }
        Ok(Instruction::new_with_types(opcode, aty, vec![av, bv], &[aty, bty], Vec::new(), false))
    }

    /// Multiplication on a pair of matching numeric types.
    pub fn mul(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::default_arith(Opcode::Mul, a, b)
    }
    /// Division on a pair of matching numeric types.
    pub fn div(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::default_arith(Opcode::Div, a, b)
    }
    /// Remainder on a pair of matching numeric types.
    pub fn modulo(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::default_arith(Opcode::Mod, a, b)
    }

    // ---- Arithmetic with overflow --------------------------------------

    fn arith_ovf(
        opcode: Opcode,
        a: (Value, Type),
        b: (Value, Type),
        normal: Block,
        overflow: Block,
        width: PointerWidth,
    ) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        if aty != bty || !(aty == Type::Box || aty == Type::pint(width)) {
            return Err(InvalidInstruction::new(
                opcode.base(),
                format!("operands must both be pint or both be box, got {} and {}", aty, bty),
            ));
        }
        Ok(Instruction::new_with_types(opcode, aty, vec![av, bv], &[aty, bty], vec![normal, overflow], false))
    }

    /// Addition with an overflow-detection branch to `overflow`; falls
    /// through to `normal` otherwise.
    pub fn add_ovf(a: (Value, Type), b: (Value, Type), normal: Block, overflow: Block, width: PointerWidth) -> IrResult<Instruction> {
        Instruction::arith_ovf(Opcode::AddOvf, a, b, normal, overflow, width)
    }
    /// Subtraction with an overflow-detection branch.
    pub fn sub_ovf(a: (Value, Type), b: (Value, Type), normal: Block, overflow: Block, width: PointerWidth) -> IrResult<Instruction> {
        Instruction::arith_ovf(Opcode::SubOvf, a, b, normal, overflow, width)
    }
    /// Multiplication with an overflow-detection branch.
    pub fn mul_ovf(a: (Value, Type), b: (Value, Type), normal: Block, overflow: Block, width: PointerWidth) -> IrResult<Instruction> {
        Instruction::arith_ovf(Opcode::MulOvf, a, b, normal, overflow, width)
    }

    // ---- Bitwise ---------------------------------------------------------

    fn bitwise(opcode: Opcode, a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        let legal = (aty == Type::Box && bty == Type::Box)
            || (aty == Type::Box && bty.is_int())
            || (aty.is_int() && bty.is_int() && aty == bty);
        if !legal {
            return Err(InvalidInstruction::new(
                opcode.base(),
                format!("illegal bitwise operand combination {} / {}", aty, bty),
            ));
        }
        Ok(Instruction::new_with_types(opcode, bty, vec![av, bv], &[aty, bty], Vec::new(), false))
    }

    /// Bitwise and.
    pub fn bitand(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::bitwise(Opcode::BAnd, a, b)
    }
    /// Bitwise or.
    pub fn bitor(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::bitwise(Opcode::BOr, a, b)
    }
    /// Bitwise xor.
    pub fn bitxor(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::bitwise(Opcode::BXor, a, b)
    }
    /// Left shift.
    pub fn shl(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::bitwise(Opcode::Shl, a, b)
    }
    /// Right shift.
    pub fn shr(a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        Instruction::bitwise(Opcode::Shr, a, b)
    }

    /// Bitwise complement.
    pub fn bnot(v: (Value, Type)) -> IrResult<Instruction> {
        let (val, ty) = v;
        if !(ty == Type::Box || ty.is_int()) {
            return Err(InvalidInstruction::new(Opcode::BNot.base(), format!("illegal operand type {}", ty)));
        }
        Ok(Instruction::new_with_types(Opcode::BNot, ty, vec![val], &[ty], Vec::new(), false))
    }

    // ---- Comparison --------------------------------------------------

    /// A comparison; the specific operator is carried in `compare_op`.
    pub fn compare(op: CompareOp, a: (Value, Type), b: (Value, Type)) -> IrResult<Instruction> {
        let (av, aty) = a;
        let (bv, bty) = b;
        if aty != bty {
            return Err(InvalidInstruction::new(Opcode::Compare.base(), format!("operand types {} and {} must match", aty, bty)));
        }
        if !(aty == Type::Box || aty.is_number()) {
            return Err(InvalidInstruction::new(Opcode::Compare.base(), format!("operand type {} must be box or numeric", aty)));
        }
        let out = if aty == Type::Box { Type::Box } else { Type::I8 };
        let mut inst = Instruction::new(Opcode::Compare, out, vec![av, bv], Vec::new(), false);
        inst.mnemonic = format!("cmp_{}", op);
        inst.compare_op = Some(op);
        // Operand type isn't otherwise recoverable from `Instruction` alone
        // (uses are bare `Value`s); the emitter needs it to pick a signed vs
        // unsigned jcc (§4.6 "selects a signed or unsigned jump mnemonic
        // based on input signedness").
        inst.type_params = vec![aty];
        Ok(inst)
    }

    // ---- Control flow --------------------------------------------------

    /// Unconditional jump to `target`.
    pub fn jump(target: Block) -> Instruction {
        Instruction::new(Opcode::Jump, Type::None, Vec::new(), vec![target], true)
    }

    /// Return `v` from the function.
    pub fn ret(v: (Value, Type)) -> Instruction {
        let (val, _ty) = v;
        Instruction::new(Opcode::Ret, Type::None, vec![val], Vec::new(), true)
    }

    /// Conditional branch: `then_blk` if `cond` satisfies `op`, else `else_blk`.
    pub fn if_(cond: (Value, Type), op: CompareOp, then_blk: Block, else_blk: Block) -> IrResult<Instruction> {
        let (val, ty) = cond;
        if !(ty == Type::Box || ty == Type::I8) {
            return Err(InvalidInstruction::new(Opcode::If.base(), format!("condition must be box or i8, got {}", ty)));
        }
        let mut inst = Instruction::new(Opcode::If, Type::None, vec![val], vec![then_blk, else_blk], true);
        inst.compare_op = Some(op);
        Ok(inst)
    }

    /// Throw `v`, optionally branching to a local `catch` handler.
    pub fn throw_(v: (Value, Type), catch_target: Option<Block>) -> IrResult<Instruction> {
        let (val, ty) = v;
        if ty != Type::Box {
            return Err(InvalidInstruction::new(Opcode::Throw.base(), format!("throw operand must be box, got {}", ty)));
        }
        let targets = catch_target.into_iter().collect();
        Ok(Instruction::new(Opcode::Throw, Type::None, vec![val], targets, true))
    }

    // ---- Call family --------------------------------------------------

    /// Call `func` with receiver `this_v` and `args`, all boxed.
    pub fn call(
        func: (Value, Type),
        this_v: (Value, Type),
        args: Vec<(Value, Type)>,
        continue_target: Option<Block>,
        throw_target: Option<Block>,
        ret_ty: Type,
    ) -> IrResult<Instruction> {
        let mut all = vec![func, this_v];
        all.extend(args);
        let types: Vec<Type> = all.iter().map(|(_, t)| *t).collect();
        if !all_boxed(&types) {
            return Err(InvalidInstruction::new(Opcode::Call.base(), "call operands (func, this, args) must all be box".into()));
        }
        let uses = all.into_iter().map(|(v, _)| v).collect();
        let mut inst = Instruction::new(Opcode::Call, ret_ty, uses, Vec::new(), true);
        inst.set_call_targets(continue_target, throw_target);
        Ok(inst)
    }

    /// `new func(args)`, always producing a `box` result.
    pub fn construct(
        func: (Value, Type),
        this_v: (Value, Type),
        args: Vec<(Value, Type)>,
        continue_target: Option<Block>,
        throw_target: Option<Block>,
    ) -> IrResult<Instruction> {
        let mut inst = Instruction::call(func, this_v, args, continue_target, throw_target, Type::Box)?;
        inst.opcode = Opcode::Construct;
        inst.mnemonic = synthesize_mnemonic(Opcode::Construct.base(), &[], &[]);
        Ok(inst)
    }

    /// Read a property by key, which may invoke a getter and therefore
    /// carries continue/throw targets.
    pub fn get_prop_val(
        obj: (Value, Type),
        key: (Value, Type),
        continue_target: Option<Block>,
        throw_target: Option<Block>,
    ) -> IrResult<Instruction> {
        let types = [obj.1, key.1];
        if !all_boxed(&types) {
            return Err(InvalidInstruction::new(Opcode::GetPropVal.base(), "get_prop_val operands must be box".into()));
        }
        let mut inst = Instruction::new(Opcode::GetPropVal, Type::Box, vec![obj.0, key.0], Vec::new(), true);
        inst.set_call_targets(continue_target, throw_target);
        Ok(inst)
    }

    /// Write a property by key, which may invoke a setter and therefore
    /// carries continue/throw targets.
    pub fn put_prop_val(
        obj: (Value, Type),
        key: (Value, Type),
        val: (Value, Type),
        continue_target: Option<Block>,
        throw_target: Option<Block>,
    ) -> IrResult<Instruction> {
        let types = [obj.1, key.1, val.1];
        if !all_boxed(&types) {
            return Err(InvalidInstruction::new(Opcode::PutPropVal.base(), "put_prop_val operands must be box".into()));
        }
        let mut inst = Instruction::new(Opcode::PutPropVal, Type::None, vec![obj.0, key.0, val.0], Vec::new(), true);
        inst.set_call_targets(continue_target, throw_target);
        Ok(inst)
    }

    // ---- Type conversions --------------------------------------------

    /// Unbox a `box` value into a raw `out_ty`.
    pub fn unbox(v: (Value, Type), out_ty: Type) -> IrResult<Instruction> {
        let (val, ty) = v;
        if ty != Type::Box {
            return Err(InvalidInstruction::new(Opcode::Unbox.base(), format!("unbox input must be box, got {}", ty)));
        }
        let mut inst = Instruction::new(Opcode::Unbox, out_ty, vec![val], Vec::new(), false);
        inst.type_params = vec![out_ty];
        inst.mnemonic = synthesize_mnemonic(Opcode::Unbox.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    /// Box a raw numeric or pointer value.
    pub fn box_(v: (Value, Type)) -> IrResult<Instruction> {
        let (val, ty) = v;
        if !(ty.is_number() || ty.is_ptr()) || ty == Type::Box {
            return Err(InvalidInstruction::new(Opcode::Box.base(), format!("box input must be a raw numeric or pointer type, got {}", ty)));
        }
        Ok(Instruction::new(Opcode::Box, Type::Box, vec![val], Vec::new(), false))
    }

    /// Reinterpreting cast between integer, `box`, and `rptr` types.
    pub fn icast(v: (Value, Type), target_ty: Type) -> IrResult<Instruction> {
        let (val, ty) = v;
        let legal = |t: Type| t.is_int() || t == Type::Box || t == Type::Rptr;
        if !legal(ty) || !legal(target_ty) {
            return Err(InvalidInstruction::new(Opcode::ICast.base(), format!("icast requires int/box/rptr, got {} -> {}", ty, target_ty)));
        }
        let mut inst = Instruction::new(Opcode::ICast, target_ty, vec![val], Vec::new(), false);
        inst.type_params = vec![target_ty];
        inst.mnemonic = synthesize_mnemonic(Opcode::ICast.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    /// Convert an integer to `f64`.
    pub fn itof(v: (Value, Type)) -> IrResult<Instruction> {
        let (val, ty) = v;
        if !ty.is_int() {
            return Err(InvalidInstruction::new(Opcode::IToF.base(), format!("itof input must be an integer type, got {}", ty)));
        }
        let mut inst = Instruction::new(Opcode::IToF, Type::F64, vec![val], Vec::new(), false);
        inst.type_params = vec![Type::F64];
        inst.mnemonic = synthesize_mnemonic(Opcode::IToF.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    /// Truncate an `f64` to an integer type.
    pub fn ftoi(v: (Value, Type), target_ty: Type) -> IrResult<Instruction> {
        let (val, ty) = v;
        if ty != Type::F64 || !target_ty.is_int() {
            return Err(InvalidInstruction::new(Opcode::FToI.base(), format!("ftoi requires f64 input and integer output, got {} -> {}", ty, target_ty)));
        }
        let mut inst = Instruction::new(Opcode::FToI, target_ty, vec![val], Vec::new(), false);
        inst.type_params = vec![target_ty];
        inst.mnemonic = synthesize_mnemonic(Opcode::FToI.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    // ---- Memory --------------------------------------------------------

    /// Load a `ty` value from `ptr + offset`.
    pub fn load(ptr: (Value, Type), offset: (Value, Type), ty: Type) -> IrResult<Instruction> {
        let (ptr_v, ptr_ty) = ptr;
        let (off_v, off_ty) = offset;
        if !ptr_ty.is_ptr() {
            return Err(InvalidInstruction::new(Opcode::Load.base(), format!("load pointer must be box or rptr, got {}", ptr_ty)));
        }
        if !off_ty.is_int() {
            return Err(InvalidInstruction::new(Opcode::Load.base(), format!("load offset must be an integer type, got {}", off_ty)));
        }
        let mut inst = Instruction::new(Opcode::Load, ty, vec![ptr_v, off_v], Vec::new(), false);
        inst.type_params = vec![ty];
        inst.mnemonic = synthesize_mnemonic(Opcode::Load.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    /// Store `value` at `ptr + offset`.
    pub fn store(ptr: (Value, Type), offset: (Value, Type), value: (Value, Type)) -> IrResult<Instruction> {
        let (ptr_v, ptr_ty) = ptr;
        let (off_v, off_ty) = offset;
        let (val_v, val_ty) = value;
        if !ptr_ty.is_ptr() {
            return Err(InvalidInstruction::new(Opcode::Store.base(), format!("store pointer must be box or rptr, got {}", ptr_ty)));
        }
        if !off_ty.is_int() {
            return Err(InvalidInstruction::new(Opcode::Store.base(), format!("store offset must be an integer type, got {}", off_ty)));
        }
        let mut inst = Instruction::new(Opcode::Store, Type::None, vec![ptr_v, off_v, val_v], Vec::new(), true);
        inst.type_params = vec![val_ty];
        inst.mnemonic = synthesize_mnemonic(Opcode::Store.base(), &inst.type_params, &[]);
        Ok(inst)
    }

    /// Read the current runtime-context pointer.
    pub fn get_ctx() -> Instruction {
        Instruction::new(Opcode::GetCtx, Type::Rptr, Vec::new(), Vec::new(), false)
    }

    /// Set the current runtime-context pointer.
    pub fn set_ctx(v: (Value, Type)) -> IrResult<Instruction> {
        let (val, ty) = v;
        if ty != Type::Rptr {
            return Err(InvalidInstruction::new(Opcode::SetCtx.base(), format!("set_ctx input must be rptr, got {}", ty)));
        }
        Ok(Instruction::new(Opcode::SetCtx, Type::None, vec![val], Vec::new(), true))
    }

    // ---- LIR move --------------------------------------------------------

    /// `move <src>, <dst>`. Produced only by register allocation and
    /// edge-transition insertion (§4.3), never by front-end lowering.
    pub fn mov(src: Value, dst: Value) -> Instruction {
        Instruction::new(Opcode::Move, Type::None, vec![src, dst], Vec::new(), false)
    }

    // ---- Pseudo-instructions (skipped during emission) -----------------

    /// Pseudo-instruction naming the `index`th formal parameter.
    pub fn arg(index: u32, ty: Type) -> Instruction {
        let mut inst = Instruction::new(Opcode::Arg, ty, Vec::new(), Vec::new(), false);
        inst.name = Some(format!("arg{}", index));
        inst
    }

    /// Pseudo-instruction reading the caller-supplied argument count.
    pub fn get_num_args() -> Instruction {
        Instruction::new(Opcode::GetNumArgs, Type::I32, Vec::new(), Vec::new(), false)
    }

    /// Pseudo-instruction reading the raw argument table pointer.
    pub fn get_arg_table() -> Instruction {
        Instruction::new(Opcode::GetArgTable, Type::Rptr, Vec::new(), Vec::new(), false)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.opcode == Opcode::Phi {
            write!(f, "{} {} = {}", self.ty, self.name.as_deref().unwrap_or("$t"), self.mnemonic)?;
            for (i, (v, p)) in self.uses.iter().zip(self.preds.iter()).enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                } else {
                    write!(f, " ")?;
                }
                write!(f, "[{} {}]", v, p)?;
            }
            return Ok(());
        }
        if self.opcode == Opcode::Move {
            return write!(f, "move {}, {}", self.uses[0], self.uses[1]);
        }
        write!(f, "{} {} = {}", self.ty, self.name.as_deref().unwrap_or("$t"), self.mnemonic)?;
        for (i, u) in self.uses.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, u)?;
        }
        let role_names: &[&str] = match self.opcode {
            Opcode::If => &["then", "else"],
            Opcode::AddOvf | Opcode::SubOvf | Opcode::MulOvf => &["normal", "overflow"],
            Opcode::Call | Opcode::Construct | Opcode::GetPropVal | Opcode::PutPropVal => &["continue", "throw"],
            _ => &[],
        };
        for (i, t) in self.targets.iter().enumerate() {
            let role = role_names.get(i).copied().unwrap_or("target");
            write!(f, " {} {}", role, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    fn val(n: u32) -> Value {
        Value::Inst(Inst::new(n as usize))
    }

    #[test]
    fn add_matching_types() {
        let inst = Instruction::add((val(0), Type::I32), (val(1), Type::I32)).unwrap();
        assert_eq!(inst.ty, Type::I32);
        assert_eq!(inst.mnemonic, "add_i32");
    }

    #[test]
    fn add_rptr_pint() {
        let inst = Instruction::add((val(0), Type::Rptr), (val(1), Type::I32)).unwrap();
        assert_eq!(inst.ty, Type::Rptr);
    }

    #[test]
    fn sub_rptr_rptr_yields_pint() {
        let inst = Instruction::sub((val(0), Type::Rptr), (val(1), Type::Rptr), PointerWidth::Bits64).unwrap();
        assert_eq!(inst.ty, Type::I64);
    }

    #[test]
    fn add_mismatched_types_fails() {
        assert!(Instruction::add((val(0), Type::I32), (val(1), Type::F64)).is_err());
    }

    #[test]
    fn mul_ovf_is_branch_with_two_targets() {
        let inst = Instruction::mul_ovf((val(0), Type::I64), (val(1), Type::I64), Block::new(0), Block::new(1), PointerWidth::Bits64).unwrap();
        assert!(inst.is_branch());
        assert_eq!(inst.targets.len(), 2);
    }

    #[test]
    fn mul_ovf_rejects_mismatched_types() {
        assert!(Instruction::mul_ovf((val(0), Type::I64), (val(1), Type::Box), Block::new(0), Block::new(1), PointerWidth::Bits64).is_err());
    }

    #[test]
    fn add_ovf_rejects_non_pint_integer_width() {
        // §4.3: overflow arithmetic admits only pint or box, not every
        // integer width.
        assert!(Instruction::add_ovf((val(0), Type::I8), (val(1), Type::I8), Block::new(0), Block::new(1), PointerWidth::Bits64).is_err());
        assert!(Instruction::add_ovf((val(0), Type::I32), (val(1), Type::I32), Block::new(0), Block::new(1), PointerWidth::Bits32).is_ok());
        assert!(Instruction::add_ovf((val(0), Type::I32), (val(1), Type::I32), Block::new(0), Block::new(1), PointerWidth::Bits64).is_err());
    }

    #[test]
    fn bitwise_box_pint_allowed() {
        let inst = Instruction::bitand((val(0), Type::Box), (val(1), Type::I32)).unwrap();
        assert_eq!(inst.ty, Type::I32);
    }

    #[test]
    fn compare_numeric_yields_i8() {
        let inst = Instruction::compare(CompareOp::Lt, (val(0), Type::I32), (val(1), Type::I32)).unwrap();
        assert_eq!(inst.ty, Type::I8);
        assert_eq!(inst.compare_op, Some(CompareOp::Lt));
    }

    #[test]
    fn compare_records_operand_type_for_signedness_lowering() {
        let signed = Instruction::compare(CompareOp::Lt, (val(0), Type::I32), (val(1), Type::I32)).unwrap();
        assert_eq!(signed.type_params, vec![Type::I32]);
        let unsigned = Instruction::compare(CompareOp::Lt, (val(0), Type::U32), (val(1), Type::U32)).unwrap();
        assert_eq!(unsigned.type_params, vec![Type::U32]);
    }

    #[test]
    fn compare_box_yields_box() {
        let inst = Instruction::compare(CompareOp::Seq, (val(0), Type::Box), (val(1), Type::Box)).unwrap();
        assert_eq!(inst.ty, Type::Box);
    }

    #[test]
    fn phi_type_fixed_on_first_incoming_and_checked_after() {
        let mut phi = Instruction::phi();
        assert_eq!(phi.ty, Type::None);
        phi.add_incoming(val(0), Type::Box, Block::new(0)).unwrap();
        assert_eq!(phi.ty, Type::Box);
        let err = phi.add_incoming(val(1), Type::I32, Block::new(1));
        assert!(err.is_err());
    }

    #[test]
    fn phi_get_incoming_unknown_pred_is_fatal() {
        let mut phi = Instruction::phi();
        phi.add_incoming(val(0), Type::Box, Block::new(0)).unwrap();
        assert!(phi.get_incoming(Block::new(5)).is_err());
        assert_eq!(phi.get_incoming(Block::new(0)).unwrap(), val(0));
    }

    #[test]
    fn unbox_requires_box_input() {
        assert!(Instruction::unbox((val(0), Type::I32), Type::I32).is_err());
        let inst = Instruction::unbox((val(0), Type::Box), Type::I64).unwrap();
        assert_eq!(inst.ty, Type::I64);
        assert_eq!(inst.mnemonic, "unbox_i64");
    }

    #[test]
    fn call_targets_trim_trailing_absent() {
        let f = (val(0), Type::Box);
        let t = (val(1), Type::Box);
        let inst = Instruction::call(f, t, vec![], Some(Block::new(2)), None, Type::Box).unwrap();
        assert_eq!(inst.continue_target(), Some(Block::new(2)));
        assert_eq!(inst.throw_target(), None);
        assert_eq!(inst.targets.len(), 1);
    }

    #[test]
    fn call_rejects_non_box_operands() {
        let f = (val(0), Type::Box);
        let t = (val(1), Type::I32);
        assert!(Instruction::call(f, t, vec![], None, None, Type::Box).is_err());
    }

    #[test]
    fn copy_clears_parent_and_dests() {
        let mut inst = Instruction::add((val(0), Type::I32), (val(1), Type::I32)).unwrap();
        inst.parent = Some(Block::new(0));
        inst.add_dest(Inst::new(9));
        let orphan = inst.copy();
        assert!(orphan.parent.is_none());
        assert!(orphan.dests.is_empty());
        assert_eq!(orphan.uses, inst.uses);
    }

    #[test]
    fn repl_use_rewrites_matching_entries() {
        let mut inst = Instruction::add((val(0), Type::I32), (val(1), Type::I32)).unwrap();
        inst.repl_use(val(0), val(9));
        assert_eq!(inst.uses[0], val(9));
        assert_eq!(inst.uses[1], val(1));
    }

    #[test]
    fn display_formats_ordinary_instruction() {
        let inst = Instruction::add((val(0), Type::I32), (val(1), Type::I32)).unwrap();
        assert_eq!(inst.to_string(), "i32 $t = add_i32 $t0, $t1");
    }
}
