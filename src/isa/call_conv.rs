//! Calling convention resolution: return-value register, callee-save
//! registers, per-convention argument register resolution.

use crate::isa::x86::registers::Reg;
use core::fmt;
use core::str;
use target_lexicon::{CallingConvention, Triple};

/// Calling convention identifiers. Trimmed to the two conventions the x86
/// backend actually needs to resolve register roles for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// System V AMD64 ABI, used on Linux/macOS/BSD.
    SystemV,
    /// Windows x64 "fastcall" convention.
    WindowsFastcall,
}

impl CallConv {
    /// Return the default calling convention for the given target triple.
    pub fn triple_default(triple: &Triple) -> Self {
        match triple.default_calling_convention() {
            Ok(CallingConvention::WindowsFastcall) => CallConv::WindowsFastcall,
            Ok(CallingConvention::SystemV) | Err(()) => CallConv::SystemV,
            Ok(unimp) => unimplemented!("calling convention: {:?}", unimp),
        }
    }

    /// Register holding a scalar return value.
    pub fn ret_reg(self) -> Reg {
        match self {
            CallConv::SystemV => Reg::Rax,
            CallConv::WindowsFastcall => Reg::Rax,
        }
    }

    /// Registers the callee must preserve across the call.
    pub fn callee_save(self) -> &'static [Reg] {
        match self {
            CallConv::SystemV => &[Reg::Rbx, Reg::Rbp, Reg::R12, Reg::R13, Reg::R14, Reg::R15],
            CallConv::WindowsFastcall => &[
                Reg::Rbx, Reg::Rbp, Reg::Rdi, Reg::Rsi, Reg::R12, Reg::R13, Reg::R14, Reg::R15,
            ],
        }
    }

    /// Registers used to pass the first integer/pointer arguments, in order.
    pub fn int_arg_regs(self) -> &'static [Reg] {
        match self {
            CallConv::SystemV => &[Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9],
            CallConv::WindowsFastcall => &[Reg::Rcx, Reg::Rdx, Reg::R8, Reg::R9],
        }
    }
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            CallConv::SystemV => "system_v",
            CallConv::WindowsFastcall => "windows_fastcall",
        })
    }
}

impl str::FromStr for CallConv {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_v" => Ok(CallConv::SystemV),
            "windows_fastcall" => Ok(CallConv::WindowsFastcall),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_v_uses_rax_for_return() {
        assert_eq!(CallConv::SystemV.ret_reg(), Reg::Rax);
    }

    #[test]
    fn windows_fastcall_passes_first_args_in_rcx_rdx() {
        let regs = CallConv::WindowsFastcall.int_arg_regs();
        assert_eq!(&regs[..2], &[Reg::Rcx, Reg::Rdx]);
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        assert_eq!("system_v".parse::<CallConv>().unwrap(), CallConv::SystemV);
        assert_eq!(CallConv::WindowsFastcall.to_string(), "windows_fastcall");
    }
}
