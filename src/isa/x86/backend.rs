//! The explicit compile-session view of the x86 backend.
//!
//! Process-wide constant maps, type singletons and policy-descriptor tables
//! are kept out of `static`/`lazy_static` globals and instead live on an
//! explicit session. [`X86Policy`] is already a stateless singleton (policy
//! descriptors are read-only after module init), so the only per-session
//! state left to make explicit is the handful of facts the policy and
//! emitter need about *this* compilation's target: its pointer width, its
//! calling convention, and the register reserved for the runtime-context
//! pointer. `X86Backend` bundles those,
//! mirroring the relationship `cranelift-codegen::isa::TargetIsa` has to its
//! (also stateless) `Context` in `context.rs`: one backend value per target,
//! constructed once and threaded through every function compiled against it.

use crate::binemit::plan::Operand;
use crate::binemit::BackendConfig;
use crate::ir::{Opcode, PointerWidth};
use crate::isa::call_conv::CallConv;
use crate::isa::x86::registers::Reg;
use crate::isa::x86::{policy, InstrPolicy};
use target_lexicon::Triple;

/// A fully-resolved x86 compilation target: pointer width, calling
/// convention, and the fixed context-pointer register, plus access to the
/// (stateless, singleton) policy descriptor table.
///
/// Constructed once per target and reused across every `IrFunction` compiled
/// against it, the way a single `TargetIsa` is shared by many `Context`s.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct X86Backend {
    pointer_width: PointerWidth,
    call_conv: CallConv,
    context_reg: Reg,
}

impl X86Backend {
    /// Resolve a backend from a target triple, picking up its default
    /// calling convention and pointer width. `context_reg` is the GP
    /// register this backend pins to the runtime-context pointer for the
    /// life of a call; it must not appear in `call_conv`'s argument or
    /// callee-save lists.
    pub fn for_triple(triple: &Triple, context_reg: Reg) -> Self {
        let pointer_width = match triple.pointer_width() {
            Ok(target_lexicon::PointerWidth::U64) => PointerWidth::Bits64,
            Ok(target_lexicon::PointerWidth::U32) | Ok(target_lexicon::PointerWidth::U16) | Err(()) => {
                PointerWidth::Bits32
            }
        };
        X86Backend {
            pointer_width,
            call_conv: CallConv::triple_default(triple),
            context_reg,
        }
    }

    /// Build a backend directly from its resolved parts, bypassing triple
    /// inspection (e.g. in tests, or when the caller already knows exactly
    /// what it wants to target).
    pub fn new(pointer_width: PointerWidth, call_conv: CallConv, context_reg: Reg) -> Self {
        X86Backend { pointer_width, call_conv, context_reg }
    }

    /// This session's pointer width.
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    /// This session's calling convention.
    pub fn call_conv(&self) -> CallConv {
        self.call_conv
    }

    /// The fixed register reserved for `get_ctx`/`set_ctx`.
    pub fn context_reg(&self) -> Reg {
        self.context_reg
    }

    /// The (stateless, shared) x86 policy descriptor table.
    pub fn policy(&self) -> &'static dyn InstrPolicy {
        policy()
    }

    /// Assemble the per-function emission config from this session plus the
    /// one piece that genuinely varies per function: the register
    /// allocator's spill-slot plan for this function's callee-saves.
    pub fn backend_config<'a>(
        &self,
        helper_symbol: &'a dyn Fn(Opcode) -> Operand,
        callee_saves: &'a [(Reg, Operand)],
        spill_size: i32,
    ) -> BackendConfig<'a> {
        BackendConfig {
            pointer_width: self.pointer_width,
            call_conv: self.call_conv,
            context_reg: self.context_reg,
            helper_symbol,
            callee_saves,
            spill_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_pointer_width_from_triple() {
        let triple: Triple = "x86_64-unknown-linux-gnu".parse().unwrap();
        let backend = X86Backend::for_triple(&triple, Reg::R15);
        assert_eq!(backend.pointer_width(), PointerWidth::Bits64);
        assert_eq!(backend.call_conv(), CallConv::SystemV);
    }

    #[test]
    fn explicit_construction_bypasses_triple_inspection() {
        let backend = X86Backend::new(PointerWidth::Bits32, CallConv::WindowsFastcall, Reg::Rbx);
        assert_eq!(backend.pointer_width(), PointerWidth::Bits32);
        assert_eq!(backend.context_reg(), Reg::Rbx);
    }

    #[test]
    fn backend_config_carries_session_fields_through() {
        let backend = X86Backend::new(PointerWidth::Bits64, CallConv::SystemV, Reg::R15);
        fn helper(_: Opcode) -> Operand {
            Operand::Imm(0)
        }
        let config = backend.backend_config(&helper, &[], 0);
        assert_eq!(config.pointer_width, PointerWidth::Bits64);
        assert_eq!(config.call_conv, CallConv::SystemV);
        assert_eq!(config.context_reg, Reg::R15);
    }
}
