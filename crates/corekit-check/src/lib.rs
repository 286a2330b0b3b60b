//! # corekit-check
//!
//! The type-check and validation kernel: a registry of named checks and an
//! evaluator for validation-instruction trees.
//!
//! ## Architecture
//!
//! ```text
//! Value / Config        ← Dynamic data (JSON or runtime objects)
//!     │
//! Check                 ← Named predicate (+ optional descriptor)
//!     │
//! CheckRegistry         ← Case-insensitive index, descriptive matching
//!     │
//! Instruction           ← Tree of check refs: leaf | $all | $any, negate
//!     │
//! Validator             ← Short-circuit evaluation, typed guard errors
//! ```
//!
//! Built-in checks live in [`builtin`] and are registered through
//! [`CheckRegistry::with_builtins`]. The built-in set always contains the
//! `isAny` catch-all, so descriptive matching never fails for it.

pub mod builtin;
pub mod check;
pub mod error;
pub mod instruction;
pub mod registry;
pub mod validator;
pub mod value;

pub use check::{Arity, ArgumentError, Check, CheckSummary};
pub use error::{CheckError, InstructionError, ValidationError};
pub use instruction::{CheckRef, Instruction};
pub use registry::{CheckRegistry, DescriptiveMatch};
pub use validator::{ValidationResult, Validator};
pub use value::{Config, ObjectRef, RuntimeObject, Value};
