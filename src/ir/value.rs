//! The IR value hierarchy (§3 "IR Value").
//!
//! Rather than a polymorphic base class with three subclasses, the Rust
//! rendering is a small `Copy` sum type over three entity references, one per
//! concrete variant. Each variant's actual data (`ConstantData`,
//! `ArgumentData`) lives in an arena on `DataFlowGraph`; instructions are
//! `Inst` references into the function's own instruction arena.

use crate::entity::entity_impl;
use crate::ir::Type;
use std::fmt;

/// Reference to a uniqued constant; see [`crate::ir::constant::ConstantPool`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Constant(u32);
entity_impl!(Constant, "c");

/// Reference to a formal parameter.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Argument(u32);
entity_impl!(Argument, "a");

/// Reference to an instruction in a function's instruction arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "t");

/// Reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// The literal payload of a constant. Integer-typed constants hold
/// [`Literal::Int`]; float-typed constants hold [`Literal::Float`]; string
/// literals are only permitted at type `box` (§4.2).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// A whole-number literal, for any integer-typed constant.
    Int(i64),
    /// A numeric literal, for `f64`-typed constants (and `box`-typed numeric
    /// constants, which store the JS number as a double).
    Float(u64), // bit pattern of the f64, so Literal can implement Eq/Hash
    /// A string literal. Only valid at type `box`.
    Str(String),
}

impl Literal {
    /// Construct a float literal from an `f64`, bit-packed so it can be
    /// hashed and compared for exact identity (constant uniquing needs
    /// `Eq`, not approximate float comparison).
    pub fn float(v: f64) -> Literal {
        Literal::Float(v.to_bits())
    }

    /// Recover the `f64` value of a [`Literal::Float`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

impl Eq for Literal {}

impl std::hash::Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Literal::Int(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Literal::Float(bits) => {
                1u8.hash(state);
                bits.hash(state);
            }
            Literal::Str(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// The data behind a [`Constant`] reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstantData {
    /// The literal value.
    pub literal: Literal,
    /// The type this constant was requested at.
    pub ty: Type,
}

/// The data behind an [`Argument`] reference.
#[derive(Clone, Debug)]
pub struct ArgumentData {
    /// Declared type of the parameter.
    pub ty: Type,
    /// User-visible name, e.g. for pretty-printing.
    pub name: String,
    /// Zero-based parameter index.
    pub index: u32,
}

/// The polymorphic root for everything an instruction may consume (§3).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A uniqued constant.
    Const(Constant),
    /// A formal parameter.
    Arg(Argument),
    /// The result of another instruction.
    Inst(Inst),
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        Value::Const(c)
    }
}

impl From<Argument> for Value {
    fn from(a: Argument) -> Self {
        Value::Arg(a)
    }
}

impl From<Inst> for Value {
    fn from(i: Inst) -> Self {
        Value::Inst(i)
    }
}

/// A reference to any named entity, for diagnostics that need to point at
/// "the value/block at fault" uniformly (grounded on
/// `cranelift-codegen::ir::entities::AnyEntity`).
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum AnyEntity {
    /// A value (constant, argument, or instruction result).
    Value(Value),
    /// A basic block.
    Block(Block),
}

impl From<Value> for AnyEntity {
    fn from(v: Value) -> Self {
        AnyEntity::Value(v)
    }
}

impl From<Inst> for AnyEntity {
    fn from(i: Inst) -> Self {
        AnyEntity::Value(Value::Inst(i))
    }
}

impl From<Block> for AnyEntity {
    fn from(b: Block) -> Self {
        AnyEntity::Block(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{}", c),
            Value::Arg(a) => write!(f, "{}", a),
            Value::Inst(i) => write!(f, "${}", i),
        }
    }
}

impl fmt::Display for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnyEntity::Value(v) => write!(f, "{}", v),
            AnyEntity::Block(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    #[test]
    fn float_literal_roundtrips_through_bits() {
        let lit = Literal::float(3.5);
        assert_eq!(lit.as_f64(), Some(3.5));
    }

    #[test]
    fn entity_refs_print_with_prefix() {
        assert_eq!(Inst::new(4).to_string(), "t4");
        assert_eq!(Block::new(2).to_string(), "block2");
    }
}
