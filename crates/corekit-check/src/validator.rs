//! Evaluation of validation instructions against values.
//!
//! `$all` stops at the first failing child and records its failures.
//! `$any` stops at the first passing child; if none passes, the failures of
//! every child are recorded. A leaf passes when the check's result differs
//! from its `negate` flag.

use crate::check::Check;
use crate::error::{CheckError, ValidationError};
use crate::instruction::{CheckRef, Instruction};
use crate::registry::CheckRegistry;
use crate::value::Value;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Outcome of [`Validator::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub success: bool,
    /// Failing leaves, in evaluation order.
    pub failures: Vec<CheckRef>,
    /// Description of the value, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Validation engine bound to a check registry.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<CheckRegistry>,
}

impl Validator {
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self { registry }
    }

    /// Validator over the built-in check set.
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(CheckRegistry::with_builtins()))
    }

    pub fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }

    pub fn describe(&self, value: &Value) -> Result<String, CheckError> {
        self.registry.describe(value)
    }

    /// Verify that every combinator has children and every leaf names a
    /// registered check with a valid arity.
    pub fn compile(&self, instruction: &Instruction) -> Result<(), CheckError> {
        instruction.check_shape()?;
        for leaf in instruction.leaves() {
            self.registry.get(&leaf.name)?.check_arity(leaf.args.len())?;
        }
        Ok(())
    }

    /// Evaluate `instruction` against `value`.
    ///
    /// Unknown checks and rejected arguments are errors, not failed
    /// validations.
    pub fn validate(
        &self,
        value: &Value,
        instruction: &Instruction,
    ) -> Result<ValidationResult, CheckError> {
        instruction.check_shape()?;
        let mut failures = Vec::new();
        let success = self.eval(value, instruction, &mut failures)?;
        trace!(%instruction, success, "validated value");
        let actual = if success {
            failures.clear();
            None
        } else {
            Some(self.registry.describe(value)?)
        };
        Ok(ValidationResult {
            success,
            failures,
            actual,
        })
    }

    /// Boolean shorthand for [`validate`](Self::validate).
    pub fn is_valid(&self, value: &Value, instruction: &Instruction) -> Result<bool, CheckError> {
        instruction.check_shape()?;
        let mut failures = Vec::new();
        self.eval(value, instruction, &mut failures)
    }

    fn eval(
        &self,
        value: &Value,
        instruction: &Instruction,
        failures: &mut Vec<CheckRef>,
    ) -> Result<bool, CheckError> {
        match instruction {
            Instruction::Check(leaf) => {
                let check: Arc<Check> = self.registry.get(&leaf.name)?;
                let passed = check.evaluate(value, &leaf.args)? != leaf.negate;
                if !passed {
                    failures.push(leaf.clone());
                }
                Ok(passed)
            }
            Instruction::All(children) => {
                for child in children {
                    if !self.eval(value, child, failures)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Instruction::Any(children) => {
                let mark = failures.len();
                for child in children {
                    if self.eval(value, child, failures)? {
                        failures.truncate(mark);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluate and return the description of a failing value.
    fn guard(
        &self,
        value: &Value,
        instruction: &Instruction,
    ) -> Result<Option<String>, ValidationError> {
        let result = self.validate(value, instruction)?;
        Ok(result.actual.filter(|_| !result.success))
    }

    /// Validate a method parameter.
    pub fn require_param(
        &self,
        name: &str,
        value: &Value,
        instruction: &Instruction,
    ) -> Result<(), ValidationError> {
        match self.guard(value, instruction)? {
            None => Ok(()),
            Some(actual) => Err(ValidationError::Param {
                name: name.to_string(),
                expected: instruction.clone(),
                actual,
            }),
        }
    }

    /// Validate a value about to be assigned to a property.
    pub fn require_property(
        &self,
        name: &str,
        value: &Value,
        instruction: &Instruction,
    ) -> Result<(), ValidationError> {
        match self.guard(value, instruction)? {
            None => Ok(()),
            Some(actual) => Err(ValidationError::Property {
                name: name.to_string(),
                expected: instruction.clone(),
                actual,
            }),
        }
    }

    /// Validate a resolved class dependency. Absence always fails.
    pub fn require_dependency(
        &self,
        name: &str,
        value: Option<&Value>,
        instruction: &Instruction,
    ) -> Result<(), ValidationError> {
        let failure = match value {
            Some(value) => self.guard(value, instruction)?,
            None => Some(self.registry.describe_opt(None)?),
        };
        match failure {
            None => Ok(()),
            Some(actual) => Err(ValidationError::Dependency {
                name: name.to_string(),
                expected: instruction.clone(),
                actual,
            }),
        }
    }

    /// Validate an arbitrary value.
    pub fn require_valid(
        &self,
        value: &Value,
        instruction: &Instruction,
    ) -> Result<(), ValidationError> {
        match self.guard(value, instruction)? {
            None => Ok(()),
            Some(actual) => Err(ValidationError::Value {
                expected: instruction.clone(),
                actual,
            }),
        }
    }
}
