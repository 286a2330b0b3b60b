//! Case-insensitive registry of checks with priority-ordered descriptive
//! matching.

use crate::builtin;
use crate::check::Check;
use crate::error::CheckError;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Rendering of an absent value.
pub const UNDEFINED_DESCRIPTION: &str = "undefined";

#[derive(Default)]
struct Inner {
    /// Registration order.
    checks: Vec<Arc<Check>>,
    /// Lower-cased name → position in `checks`.
    index: HashMap<String, usize>,
    /// Positions of descriptive checks, sorted by (priority, registration).
    descriptive: Vec<usize>,
}

/// Registry of named checks.
///
/// Registration takes a write lock; every query takes a read lock and
/// releases it before user code runs.
#[derive(Default)]
pub struct CheckRegistry {
    inner: RwLock<Inner>,
}

/// The first descriptive check that matched a value.
#[derive(Debug, Clone)]
pub struct DescriptiveMatch {
    pub check: Arc<Check>,
    pub description: String,
}

impl DescriptiveMatch {
    pub fn check_name(&self) -> &str {
        self.check.name()
    }
}

impl CheckRegistry {
    /// An empty registry. Callers are responsible for registering a
    /// catch-all descriptive check.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with the built-in check set.
    pub fn with_builtins() -> Self {
        Self::with_builtins_preview(builtin::DEFAULT_PREVIEW_CHARS)
    }

    /// Built-in check set with a custom string preview length.
    pub fn with_builtins_preview(preview_chars: usize) -> Self {
        let registry = Self::new();
        builtin::register_all(&registry, preview_chars);
        registry
    }

    /// Register a check under its lower-cased name.
    ///
    /// Registering the same `Arc` twice is a no-op; a different check with
    /// the same name is rejected.
    pub fn register(&self, check: impl Into<Arc<Check>>) -> Result<(), CheckError> {
        let check = check.into();
        let key = check.name().to_lowercase();
        if check.is_descriptive() && check.is_extended() {
            return Err(CheckError::NotDescribable(check.name().to_string()));
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if let Some(&existing) = inner.index.get(&key) {
            if Arc::ptr_eq(&inner.checks[existing], &check) {
                trace!(check = check.name(), "check already registered");
                return Ok(());
            }
            return Err(CheckError::DuplicateCheck(check.name().to_string()));
        }

        let position = inner.checks.len();
        if let Some(priority) = check.priority() {
            let checks = &inner.checks;
            let slot = inner
                .descriptive
                .partition_point(|&i| checks[i].priority().unwrap_or(i32::MAX) <= priority);
            inner.descriptive.insert(slot, position);
        }
        debug!(
            check = check.name(),
            priority = check.priority(),
            "registered check"
        );
        inner.index.insert(key, position);
        inner.checks.push(check);
        Ok(())
    }

    /// Lookup a check by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<Arc<Check>, CheckError> {
        let inner = self.inner.read();
        inner
            .index
            .get(&name.to_lowercase())
            .map(|&i| inner.checks[i].clone())
            .ok_or_else(|| CheckError::UnknownCheck(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().index.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.read().checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().checks.is_empty()
    }

    /// All checks in registration order.
    pub fn checks(&self) -> Vec<Arc<Check>> {
        self.inner.read().checks.clone()
    }

    /// Name-keyed view of the descriptive checks.
    pub fn descriptive_checks(&self) -> BTreeMap<String, Arc<Check>> {
        let inner = self.inner.read();
        inner
            .descriptive
            .iter()
            .map(|&i| (inner.checks[i].name().to_string(), inner.checks[i].clone()))
            .collect()
    }

    /// Descriptive checks in evaluation order.
    fn descriptive_in_order(&self) -> Vec<Arc<Check>> {
        let inner = self.inner.read();
        inner
            .descriptive
            .iter()
            .map(|&i| inner.checks[i].clone())
            .collect()
    }

    /// First descriptive check (ascending priority, then registration order)
    /// that matches `value`, with its rendering of the value.
    pub fn first_descriptive_match(&self, value: &Value) -> Result<DescriptiveMatch, CheckError> {
        for check in self.descriptive_in_order() {
            if !check.evaluate(value, &[])? {
                continue;
            }
            if let Some(description) = check.describe(value) {
                return Ok(DescriptiveMatch { check, description });
            }
        }
        Err(CheckError::NoDescriptiveMatch {
            type_name: value.type_name().to_string(),
        })
    }

    /// Human-readable description of `value`.
    pub fn describe(&self, value: &Value) -> Result<String, CheckError> {
        self.first_descriptive_match(value).map(|m| m.description)
    }

    /// Like [`describe`](Self::describe), rendering absence as `undefined`.
    pub fn describe_opt(&self, value: Option<&Value>) -> Result<String, CheckError> {
        match value {
            Some(value) => self.describe(value),
            None => Ok(UNDEFINED_DESCRIPTION.to_string()),
        }
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CheckRegistry")
            .field("checks", &inner.checks.len())
            .field("descriptive", &inner.descriptive.len())
            .finish()
    }
}
