//! Typed SSA intermediate representation and x86 emission driver for a JS
//! compiler's optimizing tier.
//!
//! The crate is organized the way `cranelift-codegen` organizes an IR core:
//! entity references and arena maps ([`entity`]) underneath a typed
//! instruction graph ([`ir`]), with code generation split into the
//! ISA-specific policy descriptors ([`isa`]) and the external-interface
//! shapes they're driven through ([`binemit`]). `result` carries the error
//! types shared across all of it.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod binemit;
pub mod entity;
pub mod ir;
pub mod isa;
pub mod print_errors;
pub mod result;

mod partition_slice;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
