//! A single named check: predicate plus optional descriptor.
//!
//! Simple checks take no arguments. Extended checks receive the `args` of
//! the instruction leaf that references them and declare their [`Arity`].
//! Only simple checks can be descriptive, since descriptive matching
//! evaluates checks without arguments.

use crate::error::CheckError;
use crate::value::Value;
use serde::Serialize;
use serde_json::Value as Json;
use std::fmt;

pub type SimpleFn = dyn Fn(&Value) -> bool + Send + Sync;
pub type ExtendedFn = dyn Fn(&Value, &[Json]) -> Result<bool, ArgumentError> + Send + Sync;
pub type DescribeFn = dyn Fn(&Value) -> String + Send + Sync;

/// An extended check rejected its arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ArgumentError(pub String);

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Accepted argument count for an extended check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Arity {
    pub min: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{}..={max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

enum Evaluator {
    Simple(Box<SimpleFn>),
    Extended { arity: Arity, eval: Box<ExtendedFn> },
}

struct Descriptor {
    priority: i32,
    describe: Box<DescribeFn>,
}

/// A named predicate with an optional human-readable descriptor.
pub struct Check {
    name: String,
    evaluator: Evaluator,
    descriptor: Option<Descriptor>,
}

impl Check {
    /// A check that takes no arguments.
    pub fn simple<F>(name: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            evaluator: Evaluator::Simple(Box::new(eval)),
            descriptor: None,
        }
    }

    /// A parameterized check.
    pub fn extended<F>(name: impl Into<String>, arity: Arity, eval: F) -> Self
    where
        F: Fn(&Value, &[Json]) -> Result<bool, ArgumentError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            evaluator: Evaluator::Extended {
                arity,
                eval: Box::new(eval),
            },
            descriptor: None,
        }
    }

    /// Make this check descriptive. Lower priorities are tried first.
    pub fn describing<F>(mut self, priority: i32, describe: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.descriptor = Some(Descriptor {
            priority,
            describe: Box::new(describe),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.evaluator, Evaluator::Extended { .. })
    }

    pub fn is_descriptive(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn priority(&self) -> Option<i32> {
        self.descriptor.as_ref().map(|d| d.priority)
    }

    pub fn arity(&self) -> Arity {
        match &self.evaluator {
            Evaluator::Simple(_) => Arity::exactly(0),
            Evaluator::Extended { arity, .. } => *arity,
        }
    }

    pub fn check_arity(&self, actual: usize) -> Result<(), CheckError> {
        let arity = self.arity();
        if arity.accepts(actual) {
            Ok(())
        } else {
            Err(CheckError::Arity {
                check: self.name.clone(),
                expected: arity.to_string(),
                actual,
            })
        }
    }

    /// Evaluate against `value` with the given leaf arguments.
    pub fn evaluate(&self, value: &Value, args: &[Json]) -> Result<bool, CheckError> {
        self.check_arity(args.len())?;
        match &self.evaluator {
            Evaluator::Simple(eval) => Ok(eval(value)),
            Evaluator::Extended { eval, .. } => {
                eval(value, args).map_err(|e| CheckError::InvalidArgument {
                    check: self.name.clone(),
                    message: e.0,
                })
            }
        }
    }

    /// Render `value` with this check's descriptor, if any.
    pub fn describe(&self, value: &Value) -> Option<String> {
        self.descriptor.as_ref().map(|d| (d.describe)(value))
    }

    pub fn summary(&self) -> CheckSummary {
        CheckSummary {
            name: self.name.clone(),
            kind: if self.is_extended() {
                "extended"
            } else {
                "simple"
            },
            arity: self.arity(),
            describe_priority: self.priority(),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("priority", &self.priority())
            .finish()
    }
}

/// Serializable row describing a registered check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub name: String,
    pub kind: &'static str,
    pub arity: Arity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub describe_priority: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_checks_reject_arguments() {
        let check = Check::simple("isNull", Value::is_null);
        assert_eq!(check.evaluate(&Value::null(), &[]), Ok(true));
        assert!(matches!(
            check.evaluate(&Value::null(), &[json!(1)]),
            Err(CheckError::Arity { actual: 1, .. })
        ));
    }

    #[test]
    fn extended_argument_errors_name_the_check() {
        let check = Check::extended("isAbove", Arity::exactly(1), |value, args| {
            let limit = args[0]
                .as_f64()
                .ok_or_else(|| ArgumentError::new("limit must be a number"))?;
            Ok(value.as_f64().is_some_and(|n| n > limit))
        });
        assert_eq!(check.evaluate(&Value::from(3), &[json!(2)]), Ok(true));
        assert_eq!(
            check.evaluate(&Value::from(3), &[json!("x")]),
            Err(CheckError::InvalidArgument {
                check: "isAbove".to_string(),
                message: "limit must be a number".to_string(),
            })
        );
    }

    #[test]
    fn arity_display() {
        assert_eq!(Arity::exactly(2).to_string(), "2");
        assert_eq!(Arity::at_least(1).to_string(), "at least 1");
        assert_eq!(
            Arity {
                min: 1,
                max: Some(3)
            }
            .to_string(),
            "1..=3"
        );
    }
}
