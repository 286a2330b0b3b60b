//! Error types for check registration, instruction parsing and validation.

use crate::instruction::Instruction;

/// Errors raised by the check registry and by check evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    /// A different check is already registered under this name.
    #[error("duplicate check: `{0}` is already registered")]
    DuplicateCheck(String),

    #[error("unknown check: `{0}`")]
    UnknownCheck(String),

    /// No descriptive check matched the value.
    #[error("no descriptive check matches value of type {type_name}")]
    NoDescriptiveMatch { type_name: String },

    /// Descriptors are only evaluated without arguments.
    #[error("check `{0}` takes arguments and cannot be descriptive")]
    NotDescribable(String),

    #[error("check `{check}` expects {expected} argument(s), got {actual}")]
    Arity {
        check: String,
        expected: String,
        actual: usize,
    },

    #[error("check `{check}` received an invalid argument: {message}")]
    InvalidArgument { check: String, message: String },

    #[error(transparent)]
    Instruction(#[from] InstructionError),
}

/// Errors raised while parsing a validation instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionError {
    #[error("`{0}` combinator must contain at least one instruction")]
    EmptyCombinator(&'static str),

    #[error("instruction mixes `$all` and `$any`")]
    AmbiguousCombinator,

    #[error("malformed instruction at {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Failed guarded validation. Each variant names the call site.
///
/// Messages embed the expected instruction and a description of the
/// offending value, e.g. `expected isString, got: Array (length=3)`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid parameter `{name}`: expected {expected}, got: {actual}")]
    Param {
        name: String,
        expected: Instruction,
        actual: String,
    },

    #[error("invalid property `{name}`: expected {expected}, got: {actual}")]
    Property {
        name: String,
        expected: Instruction,
        actual: String,
    },

    #[error("invalid dependency `{name}`: expected {expected}, got: {actual}")]
    Dependency {
        name: String,
        expected: Instruction,
        actual: String,
    },

    #[error("invalid value: expected {expected}, got: {actual}")]
    Value {
        expected: Instruction,
        actual: String,
    },

    #[error(transparent)]
    Check(#[from] CheckError),
}

impl ValidationError {
    /// The instruction that failed, when the error is a validation failure.
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            ValidationError::Param { expected, .. }
            | ValidationError::Property { expected, .. }
            | ValidationError::Dependency { expected, .. }
            | ValidationError::Value { expected, .. } => Some(expected),
            ValidationError::Check(_) => None,
        }
    }

    /// Description of the offending value.
    pub fn actual(&self) -> Option<&str> {
        match self {
            ValidationError::Param { actual, .. }
            | ValidationError::Property { actual, .. }
            | ValidationError::Dependency { actual, .. }
            | ValidationError::Value { actual, .. } => Some(actual),
            ValidationError::Check(_) => None,
        }
    }
}
