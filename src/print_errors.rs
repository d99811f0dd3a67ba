//! Pretty-printing for construction-time validation failures.
//!
//! Grounded on `cranelift-codegen::print_errors`: that module renders a
//! verifier error beneath the pretty-printed function line it refers to,
//! with a `^~~~` caret line pointing at the offending text. This crate has
//! no multi-error verifier pass (§7: there is exactly one
//! [`InvalidInstruction`] per failed construction, raised immediately, not
//! accumulated), so the rendering collapses to a single instruction plus its
//! one error, but keeps the same two-line shape.

use crate::result::InvalidInstruction;
use std::fmt::Write;

/// Render `instr`'s pretty-printed text together with `err`, annotated with
/// a caret line under the whole instruction (this crate has no per-operand
/// source span to narrow the caret to, unlike a textual assembler's
/// diagnostics).
///
/// ```text
/// i32 $t = add_i32 $t0, $t1
/// ^~~~~~~~~~~~~~~~~~~~~~~~~
/// error: add_i32: operand types i32 and f64 must match
/// ```
pub fn pretty_validation_error(instr_text: &str, err: &InvalidInstruction) -> String {
    let mut out = String::new();
    let trimmed = instr_text.trim_end();
    let indent = trimmed.len() - trimmed.trim_start().len();
    let _ = writeln!(out, "{}", trimmed);
    let _ = write!(out, "{:indent$}", "", indent = indent);
    let _ = writeln!(out, "^{}", "~".repeat(trimmed.trim().len().saturating_sub(1)));
    let _ = write!(out, "error: {}", err);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::{CompareOp, Inst, Instruction, Type, Value};

    fn val(n: u32) -> Value {
        Value::Inst(Inst::new(n as usize))
    }

    #[test]
    fn caret_line_spans_the_instruction_text() {
        let err = Instruction::compare(CompareOp::Lt, (val(0), Type::I32), (val(1), Type::F64)).unwrap_err();
        let rendered = pretty_validation_error("i32 $t = cmp_lt $t0, $t1", &err);
        let mut lines = rendered.lines();
        let text = lines.next().unwrap();
        let caret = lines.next().unwrap();
        assert_eq!(caret.trim_start().chars().next(), Some('^'));
        assert_eq!(caret.len(), text.len());
        assert!(lines.next().unwrap().starts_with("error: "));
    }
}
