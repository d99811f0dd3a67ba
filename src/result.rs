//! Error types for the IR core.
//!
//! Per the error handling design, the core never rolls back state: a failure
//! here means a compiler pass violated one of the IR's invariants. These
//! types exist so passes can report precisely *what* was violated and wrap it
//! with the offending mnemonic, not so they can recover.

use crate::ir::AnyEntity;
use failure_derive::Fail;

/// Failure constructing or validating an instruction.
///
/// Always carries the mnemonic that was being constructed so the message is
/// meaningful out of context (e.g. in a panic backtrace or a pass's own
/// wrapped diagnostic).
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
#[fail(display = "{}: {}", mnemonic, reason)]
pub struct InvalidInstruction {
    /// The mnemonic of the instruction under construction.
    pub mnemonic: String,
    /// What went wrong.
    pub reason: String,
}

impl InvalidInstruction {
    /// Wrap a bare validation failure with the mnemonic of the instruction
    /// kind that produced it, per the §4.3 "wrap with mnemonic" contract.
    pub fn new(mnemonic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            reason: reason.into(),
        }
    }
}

/// Result of a construction-time validation.
pub type IrResult<T> = Result<T, InvalidInstruction>;

/// A fatal error raised by pass bookkeeping (`replPred`/`getIncoming` on an
/// unknown predecessor) or by the emission driver (unsupported comparison
/// token, missing policy hook). Per §7 there is nothing to recover from: the
/// caller is expected to log this and abort compilation of the function.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// A pass queried or rewrote a phi edge for a block that is not one of
    /// its recorded predecessors.
    #[fail(display = "{} is not a predecessor of this phi", _0)]
    UnknownPredecessor(String),

    /// The emitter was asked to lower a construct it doesn't know how to
    /// encode (e.g. an unrecognised comparison token, or an instruction with
    /// no policy descriptor).
    #[fail(display = "unsupported construct at {}: {}", at, what)]
    Unsupported {
        /// The entity (instruction/block) where the failure was detected.
        at: AnyEntity,
        /// Human-readable description of the unsupported construct.
        what: String,
    },
}
