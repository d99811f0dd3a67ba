//! The IR type lattice.
//!
//! Types are process-wide singletons: two `Type` values compare equal iff
//! they are the same singleton, so `==` is always identity comparison on a
//! plain `Copy` enum, no interning table required.

use std::fmt;

/// Width of the platform pointer, in bits. Chosen once per compilation
/// session and threaded through anywhere `pint`'s identity matters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerWidth {
    /// 32-bit target: `pint` aliases `i32`, no native `i64`/`u64`.
    Bits32,
    /// 64-bit target: `pint` aliases `i64`.
    Bits64,
}

impl PointerWidth {
    /// Pointer size in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

/// An IR value type: `none`, `box`, `rptr`, the sized integers, or `f64`.
///
/// On a 32-bit platform `I64`/`U64` are simply never produced or accepted;
/// rather than remove them from the enum (which would require two different
/// enums for two platforms) platform selection is expressed as
/// a predicate, [`Type::is_available`], checked once at construction sites
/// that matter (in practice: nowhere in this crate, since only `Pint::new`
/// needs to pick a concrete width — everything else is platform-agnostic
/// until the backend is selected).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Void marker: the output type of instructions executed for effect.
    None,
    /// Tagged JS value: either an immediate or an object pointer.
    Box,
    /// Untagged machine pointer.
    Rptr,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer. Only available on 64-bit platforms.
    I64,
    /// Unsigned 64-bit integer. Only available on 64-bit platforms.
    U64,
    /// IEEE-754 double precision float.
    F64,
}

impl Type {
    /// The platform-width signed integer type: `i64` on 64-bit platforms,
    /// `i32` on 32-bit platforms.
    pub fn pint(width: PointerWidth) -> Type {
        match width {
            PointerWidth::Bits32 => Type::I32,
            PointerWidth::Bits64 => Type::I64,
        }
    }

    /// Is this type available on a platform with the given pointer width?
    /// `I64`/`U64` don't exist on 32-bit targets (§4.1).
    pub fn is_available(self, width: PointerWidth) -> bool {
        match (self, width) {
            (Type::I64, PointerWidth::Bits32) | (Type::U64, PointerWidth::Bits32) => false,
            _ => true,
        }
    }

    /// Name used in mnemonic suffixes and pretty-printing.
    pub fn name(self) -> &'static str {
        match self {
            Type::None => "none",
            Type::Box => "box",
            Type::Rptr => "rptr",
            Type::I8 => "i8",
            Type::U8 => "u8",
            Type::I16 => "i16",
            Type::U16 => "u16",
            Type::I32 => "i32",
            Type::U32 => "u32",
            Type::I64 => "i64",
            Type::U64 => "u64",
            Type::F64 => "f64",
        }
    }

    /// Size in bytes. `None` has no representation and is sized 0.
    pub fn bytes(self) -> u8 {
        match self {
            Type::None => 0,
            Type::Box | Type::Rptr => 8,
            Type::I8 | Type::U8 => 1,
            Type::I16 | Type::U16 => 2,
            Type::I32 | Type::U32 => 4,
            Type::I64 | Type::U64 => 8,
            Type::F64 => 8,
        }
    }

    /// `box` or `rptr`: a pointer-sized reference type.
    pub fn is_ptr(self) -> bool {
        matches!(self, Type::Box | Type::Rptr)
    }

    /// Any integer width, signed or unsigned.
    pub fn is_int(self) -> bool {
        matches!(
            self,
            Type::I8 | Type::U8 | Type::I16 | Type::U16 | Type::I32 | Type::U32 | Type::I64 | Type::U64
        )
    }

    /// `f64`.
    pub fn is_fp(self) -> bool {
        matches!(self, Type::F64)
    }

    /// Integer or float.
    pub fn is_number(self) -> bool {
        self.is_int() || self.is_fp()
    }

    /// Is this an integer type, and if so, is it signed?
    ///
    /// `box` is treated as signed for the purposes of comparison lowering
    /// (§4.6 "If-instruction lowering"): `None` is returned for non-integer,
    /// non-`box` types.
    pub fn is_signed(self) -> Option<bool> {
        match self {
            Type::Box => Some(true),
            Type::I8 | Type::I16 | Type::I32 | Type::I64 => Some(true),
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
