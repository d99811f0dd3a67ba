//! Black-box tests driving a whole `IrFunction` through `emit_function`,
//! the way `cranelift-codegen`'s sibling crates exercise a full compilation
//! against a mock backend rather than reaching into the library's own
//! private test modules. The assembler here is a pseudo-assembly tracer
//! (a `Vec<String>`, per `SPEC_FULL.md` §A.5) since a real assembler is an
//! out-of-scope external collaborator (§1).

use tachyon_ir::binemit::{
    emit_function, AbstractMove, AllocationPlan, Assembler, BackendConfig, InstrAllocation, JccCond, Label, Operand,
};
use tachyon_ir::ir::{CompareOp, Instruction, IrFunction, PointerWidth, Type, Value};
use tachyon_ir::isa::call_conv::CallConv;
use tachyon_ir::isa::x86::registers::Reg;
use tachyon_ir::isa::x86::X86Policy;

struct TraceAsm {
    log: Vec<String>,
    next_label: u32,
}

impl TraceAsm {
    fn new() -> Self {
        TraceAsm { log: Vec::new(), next_label: 0 }
    }
}

impl Assembler for TraceAsm {
    fn new_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }
    fn bind(&mut self, label: Label) {
        self.log.push(format!("L{}:", label.0));
    }
    fn mov(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("mov {:?}, {:?}", dst, src));
    }
    fn add(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("add {:?}, {:?}", dst, src));
    }
    fn sub(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("sub {:?}, {:?}", dst, src));
    }
    fn mul(&mut self, src: Operand) {
        self.log.push(format!("mul {:?}", src));
    }
    fn imul2(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("imul {:?}, {:?}", dst, src));
    }
    fn imul3(&mut self, dst: Operand, src: Operand, imm: Operand) {
        self.log.push(format!("imul {:?}, {:?}, {:?}", dst, src, imm));
    }
    fn div(&mut self, src: Operand) {
        self.log.push(format!("div {:?}", src));
    }
    fn idiv(&mut self, src: Operand) {
        self.log.push(format!("idiv {:?}", src));
    }
    fn cqo(&mut self) {
        self.log.push("cqo".to_string());
    }
    fn cdq(&mut self) {
        self.log.push("cdq".to_string());
    }
    fn sal(&mut self, dst: Operand, imm: Operand) {
        self.log.push(format!("sal {:?}, {:?}", dst, imm));
    }
    fn sar(&mut self, dst: Operand, imm: Operand) {
        self.log.push(format!("sar {:?}, {:?}", dst, imm));
    }
    fn and(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("and {:?}, {:?}", dst, src));
    }
    fn or(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("or {:?}, {:?}", dst, src));
    }
    fn xor(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("xor {:?}, {:?}", dst, src));
    }
    fn not(&mut self, dst: Operand) {
        self.log.push(format!("not {:?}", dst));
    }
    fn cmp(&mut self, a: Operand, b: Operand) {
        self.log.push(format!("cmp {:?}, {:?}", a, b));
    }
    fn jmp(&mut self, label: Label) {
        self.log.push(format!("jmp L{}", label.0));
    }
    fn jcc(&mut self, cc: JccCond, label: Label) {
        self.log.push(format!("j{:?} L{}", cc, label.0));
    }
    fn ret(&mut self) {
        self.log.push("ret".to_string());
    }
    fn nop(&mut self) {
        self.log.push("nop".to_string());
    }
    fn call(&mut self, target: Operand) {
        self.log.push(format!("call {:?}", target));
    }
    fn cvt_i2f(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("cvtsi2sd {:?}, {:?}", dst, src));
    }
    fn cvt_f2i(&mut self, dst: Operand, src: Operand) {
        self.log.push(format!("cvttsd2si {:?}, {:?}", dst, src));
    }
    fn setcc(&mut self, cc: JccCond, dst: Operand) {
        self.log.push(format!("set{:?} {:?}", cc, dst));
    }
}

fn helper(_: tachyon_ir::ir::Opcode) -> Operand {
    Operand::Imm(0xDEAD)
}

fn config<'a>(helper: &'a dyn Fn(tachyon_ir::ir::Opcode) -> Operand) -> BackendConfig<'a> {
    BackendConfig {
        pointer_width: PointerWidth::Bits64,
        call_conv: CallConv::SystemV,
        context_reg: Reg::R15,
        helper_symbol: helper,
        callee_saves: &[],
        spill_size: 0,
    }
}

/// §8 concrete scenario: a diamond CFG where `entry` branches on `if` to a
/// then/else pair that both merge into `join`, where a `phi` selects between
/// two incoming values. Each of `entry`'s two outgoing edges gets its own
/// edge-transition stub, and the merge move resolving the phi's incoming
/// value appears between that stub's label and its closing jump.
#[test]
fn diamond_phi_merge_moves_land_between_stub_label_and_jump() {
    let mut func = IrFunction::new("select", PointerWidth::Bits64);
    let entry = func.create_block("entry");
    let then_blk = func.create_block("then");
    let else_blk = func.create_block("else");
    let join = func.create_block("join");

    let cond = func.append_argument("c", Type::I8);
    let a = func.append_argument("a", Type::I32);
    let b = func.append_argument("b", Type::I32);

    let if_inst = Instruction::if_((cond, Type::I8), CompareOp::Eq, then_blk, else_blk).unwrap();
    let if_id = func.append_inst(entry, if_inst);
    func.append_inst(then_blk, Instruction::jump(join));
    func.append_inst(else_blk, Instruction::jump(join));

    let mut phi = Instruction::phi();
    phi.add_incoming(a, Type::I32, then_blk).unwrap();
    phi.add_incoming(b, Type::I32, else_blk).unwrap();
    let phi_id = func.append_inst(join, phi);
    func.append_inst(join, Instruction::ret((Value::Inst(phi_id), Type::I32)));

    let mut plan = AllocationPlan::new(vec![entry, then_blk, else_blk, join]);
    plan.record(if_id, InstrAllocation { opnds: vec![Operand::Reg(Reg::Rax)], ..Default::default() });
    plan.merge_moves.insert(
        (then_blk, join),
        vec![AbstractMove { src: Operand::Reg(Reg::Rcx), dst: Operand::Reg(Reg::Rax) }],
    );
    plan.merge_moves.insert(
        (else_blk, join),
        vec![AbstractMove { src: Operand::Reg(Reg::Rdx), dst: Operand::Reg(Reg::Rax) }],
    );

    let cfg = config(&helper);
    let mut asm = TraceAsm::new();
    emit_function(&func, &plan, &X86Policy, &cfg, &mut asm).unwrap();

    // then/else each have a single successor (join), so per §4.6 step 3d
    // their merge moves fold in right before their own (implicit) fall
    // through -- here realized as the unconditional `jump` to `join`.
    let then_move = asm.log.iter().position(|l| l == "mov Reg(Rax), Reg(Rcx)").unwrap();
    let then_jump = asm.log.iter().position(|l| l == "jmp L3").unwrap();
    assert!(then_move < then_jump, "then's merge move must precede its jump to join");

    let else_move = asm.log.iter().position(|l| l == "mov Reg(Rax), Reg(Rdx)").unwrap();
    assert!(else_move > then_jump, "else's block must come after then's in emission order");
}

/// §8: "Emitting an unsigned mul where operand 0 is rax issues a single
/// operand mul; where result signedness is signed and operand 1 is a 16-bit
/// immediate, emits three-operand imul dest, op0, op1."
#[test]
fn unsigned_mul_is_single_operand_signed_mul_with_imm_is_three_operand() {
    let mut func = IrFunction::new("muls", PointerWidth::Bits64);
    let entry = func.create_block("entry");
    let a = func.append_argument("a", Type::U32);
    let b = func.append_argument("b", Type::U32);
    let umul = Instruction::mul((a, Type::U32), (b, Type::U32)).unwrap();
    let umul_id = func.append_inst(entry, umul);
    func.append_inst(entry, Instruction::ret((Value::Inst(umul_id), Type::U32)));

    let mut plan = AllocationPlan::new(vec![entry]);
    plan.record(
        umul_id,
        InstrAllocation { opnds: vec![Operand::Reg(Reg::Rax), Operand::Reg(Reg::Rcx)], dest: Some(Operand::Reg(Reg::Rax)), ..Default::default() },
    );
    let cfg = config(&helper);
    let mut asm = TraceAsm::new();
    emit_function(&func, &plan, &X86Policy, &cfg, &mut asm).unwrap();
    assert!(asm.log.contains(&"mul Reg(Rcx)".to_string()));

    let mut func2 = IrFunction::new("muls2", PointerWidth::Bits64);
    let entry2 = func2.create_block("entry");
    let x = func2.append_argument("x", Type::I32);
    let smul = Instruction::mul((x, Type::I32), (x, Type::I32)).unwrap();
    let smul_id = func2.append_inst(entry2, smul);
    func2.append_inst(entry2, Instruction::ret((Value::Inst(smul_id), Type::I32)));

    let mut plan2 = AllocationPlan::new(vec![entry2]);
    plan2.record(
        smul_id,
        InstrAllocation { opnds: vec![Operand::Reg(Reg::Rax), Operand::Imm(7)], dest: Some(Operand::Reg(Reg::Rax)), ..Default::default() },
    );
    let mut asm2 = TraceAsm::new();
    emit_function(&func2, &plan2, &X86Policy, &cfg, &mut asm2).unwrap();
    assert!(asm2.log.contains(&"imul Reg(Rax), Reg(Rax), Imm(7)".to_string()));
}

/// §6 "Textual pretty-printing": the whole-function `Display` composes each
/// block's header and its instructions' own `Display` impls.
#[test]
fn whole_function_display_lists_blocks_and_instructions_in_order() {
    let mut func = IrFunction::new("f", PointerWidth::Bits64);
    let entry = func.create_block("entry");
    let a = func.append_argument("a", Type::I32);
    let b = func.append_argument("b", Type::I32);
    let add = Instruction::add((a, Type::I32), (b, Type::I32)).unwrap();
    let add_id = func.append_inst(entry, add);
    func.append_inst(entry, Instruction::ret((Value::Inst(add_id), Type::I32)));

    let text = func.to_string();
    assert!(text.contains("function f()"));
    assert!(text.contains("entry:"));
    assert!(text.contains("add_i32"));
    assert!(text.contains("ret"));
}
