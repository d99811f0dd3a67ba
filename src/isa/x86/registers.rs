//! x86-64 general-purpose register descriptions.
//!
//! `cranelift-codegen` generates this table from `meta/`'s register DSL at
//! build time (`include!(concat!(env!("OUT_DIR"), "/registers-x86.rs"))`).
//! With that meta-DSL build step out of scope here, the encodings below are
//! hand-written instead, using the
//! same non-alphabetical x86 encoding order the generated table would have
//! produced (rax=0, rcx=1, rdx=2, rbx=3, rsp=4, rbp=5, rsi=6, rdi=7, r8-r15).

use std::fmt;

/// A general-purpose x86-64 register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    /// Accumulator; fixed operand/result register for `mul`/`div`/`mod`.
    Rax,
    /// Counter register.
    Rcx,
    /// Data register; clobbered by `mul`/`div`/`mod`.
    Rdx,
    /// Callee-save base register.
    Rbx,
    /// Stack pointer.
    Rsp,
    /// Frame/base pointer; callee-save.
    Rbp,
    /// Source index register.
    Rsi,
    /// Destination index register.
    Rdi,
    /// Extended register 8.
    R8,
    /// Extended register 9.
    R9,
    /// Extended register 10.
    R10,
    /// Extended register 11.
    R11,
    /// Extended register 12; callee-save.
    R12,
    /// Extended register 13; callee-save.
    R13,
    /// Extended register 14; callee-save.
    R14,
    /// Extended register 15; callee-save.
    R15,
}

impl Reg {
    /// The register's x86 encoding number (the low 4 bits of ModRM/REX).
    pub fn encoding(self) -> u8 {
        use Reg::*;
        match self {
            Rax => 0,
            Rcx => 1,
            Rdx => 2,
            Rbx => 3,
            Rsp => 4,
            Rbp => 5,
            Rsi => 6,
            Rdi => 7,
            R8 => 8,
            R9 => 9,
            R10 => 10,
            R11 => 11,
            R12 => 12,
            R13 => 13,
            R14 => 14,
            R15 => 15,
        }
    }

    /// 32-bit name, used when an instruction's operand width is `i32`/`u32`.
    pub fn name32(self) -> &'static str {
        use Reg::*;
        match self {
            Rax => "eax",
            Rcx => "ecx",
            Rdx => "edx",
            Rbx => "ebx",
            Rsp => "esp",
            Rbp => "ebp",
            Rsi => "esi",
            Rdi => "edi",
            R8 => "r8d",
            R9 => "r9d",
            R10 => "r10d",
            R11 => "r11d",
            R12 => "r12d",
            R13 => "r13d",
            R14 => "r14d",
            R15 => "r15d",
        }
    }

    /// 64-bit name.
    pub fn name64(self) -> &'static str {
        use Reg::*;
        match self {
            Rax => "rax",
            Rcx => "rcx",
            Rdx => "rdx",
            Rbx => "rbx",
            Rsp => "rsp",
            Rbp => "rbp",
            Rsi => "rsi",
            Rdi => "rdi",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            R12 => "r12",
            R13 => "r13",
            R14 => "r14",
            R15 => "r15",
        }
    }

    /// The register's name at the given operand width in bytes (4 or 8).
    pub fn name_at_width(self, bytes: u8) -> &'static str {
        if bytes == 4 {
            self.name32()
        } else {
            self.name64()
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name64())
    }
}
