//! Constant uniquing (§4.2).
//!
//! Mirrors `cranelift-codegen::ir::constant::ConstantPool` (insert-dedups,
//! hand back a stable handle) but keyed on a two-level `(Literal, Type)` pair
//! instead of raw bytes, since two equal bit patterns at different IR types
//! (e.g. integer `0` at `box` and at `i32`) must stay distinct per §3.

use crate::entity::PrimaryMap;
use crate::ir::value::{Constant, ConstantData, Literal};
use crate::ir::Type;
use std::collections::HashMap;

/// Maintains the mapping between a [`Constant`] handle and its
/// `(Literal, Type)` payload, deduplicating on insertion.
///
/// Per §4.2's "two-level map" framing: the outer key is the literal value,
/// the inner key is the type, so two requests for the same literal at
/// different types never collide.
#[derive(Clone, Default)]
pub struct ConstantPool {
    handles: PrimaryMap<Constant, ConstantData>,
    by_value: HashMap<Literal, HashMap<Type, Constant>>,
}

impl ConstantPool {
    /// Create an empty constant pool.
    pub fn new() -> Self {
        Self {
            handles: PrimaryMap::new(),
            by_value: HashMap::new(),
        }
    }

    /// Factory `getConst(value, type)`: return the unique constant for the
    /// pair, creating it on first request.
    ///
    /// # Panics
    ///
    /// Panics if the literal isn't legal at `ty`: integer types require
    /// [`Literal::Int`], `f64` requires [`Literal::Float`], and only `Type::Box`
    /// admits [`Literal::Str`]. These are construction-time assertions per
    /// §4.2, not recoverable conditions.
    pub fn get_const(&mut self, literal: Literal, ty: Type) -> Constant {
        assert_legal(&literal, ty);

        if let Some(existing) = self.by_value.get(&literal).and_then(|m| m.get(&ty)) {
            return *existing;
        }

        let handle = self.handles.push(ConstantData {
            literal: literal.clone(),
            ty,
        });
        log::trace!("constant pool: new entry {:?} at {} ({})", literal, handle, ty);
        self.by_value
            .entry(literal)
            .or_insert_with(HashMap::new)
            .insert(ty, handle);
        handle
    }

    /// Retrieve the data behind a constant handle.
    pub fn data(&self, c: Constant) -> &ConstantData {
        self.handles
            .get(c)
            .expect("Constant handle must have been created by this pool")
    }

    /// Number of distinct constants in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }
}

fn assert_legal(literal: &Literal, ty: Type) {
    match literal {
        Literal::Int(_) => assert!(
            ty.is_int() || ty == Type::Box,
            "integer literal requires an integer type or box, got {}",
            ty
        ),
        Literal::Float(_) => assert!(
            ty.is_fp() || ty == Type::Box,
            "float literal requires f64 or box, got {}",
            ty
        ),
        Literal::Str(_) => assert!(
            ty == Type::Box,
            "string literals are only permitted at type box, got {}",
            ty
        ),
    }
}
