//! Instances produced by the loader and the protocol they expose to hooks
//! and methods.

use crate::error::{CoreError, ThrownError};
use crate::format::format_message;
use crate::lifecycle::LifecycleState;
use crate::mixer::ComposedClass;
use corekit_check::registry::UNDEFINED_DESCRIPTION;
use corekit_check::{
    Config, Instruction, ObjectRef, RuntimeObject, ValidationError, Validator, Value,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

/// A live object of a composed class.
pub struct Instance {
    id: u64,
    class: Arc<ComposedClass>,
    validator: Validator,
    this: Weak<Instance>,
    config: RwLock<Config>,
    properties: RwLock<Config>,
    state: Mutex<LifecycleState>,
    /// Position of the running `$construct` unit.
    cursor: Mutex<Option<usize>>,
}

impl Instance {
    pub(crate) fn new(
        id: u64,
        class: Arc<ComposedClass>,
        validator: Validator,
        config: Config,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            class,
            validator,
            this: this.clone(),
            config: RwLock::new(config),
            properties: RwLock::default(),
            state: Mutex::new(LifecycleState::Allocated),
            cursor: Mutex::new(None),
        })
    }

    /// Loader-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> &Arc<ComposedClass> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub(crate) fn advance(&self, next: LifecycleState) {
        let mut state = self.state.lock();
        debug_assert!(*state < next, "lifecycle moves forward only");
        *state = next;
    }

    pub(crate) fn set_cursor(&self, cursor: Option<usize>) {
        *self.cursor.lock() = cursor;
    }

    pub(crate) fn merge_config(&self, overrides: Config) {
        self.config.write().merge(overrides);
    }

    /// Snapshot of the working config.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Raw config lookup, without validation.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.config.read().get(name).cloned()
    }

    /// Shared handle to this instance as a runtime object.
    pub fn to_value(&self) -> Option<Value> {
        self.this
            .upgrade()
            .map(|this| Value::Object(ObjectRef::new(this)))
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.class.method(name).is_some()
    }

    /// Dispatch through the composed method table.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, CoreError> {
        let body = self
            .class
            .method(method)
            .cloned()
            .ok_or_else(|| CoreError::UnknownMethod {
                class: self.class.name().to_string(),
                method: method.to_string(),
            })?;
        body(self, args)
    }

    /// Look up a class dependency and validate it.
    ///
    /// While a `$construct` unit is running, asking for a value that a later
    /// unit provides fails with [`CoreError::DependencyPrecedence`]. Any
    /// other absence fails validation with `undefined`.
    pub fn require(&self, name: &str, spec: &Instruction) -> Result<Value, CoreError> {
        let cursor = *self.cursor.lock();
        self.resolve_dependency(name, self.get(name), spec, cursor)?
            .ok_or_else(|| missing(name, spec))
    }

    /// Like [`require`](Self::require), but absence yields `None`.
    pub fn optional(&self, name: &str, spec: &Instruction) -> Result<Option<Value>, CoreError> {
        let cursor = *self.cursor.lock();
        self.resolve_dependency(name, self.get(name), spec, cursor)
    }

    fn resolve_dependency(
        &self,
        name: &str,
        value: Option<Value>,
        spec: &Instruction,
        cursor: Option<usize>,
    ) -> Result<Option<Value>, CoreError> {
        let Some(value) = value else {
            if let Some(index) = cursor
                && let Some(provider) = self.class.provider_after(index, name)
            {
                let required_by = self
                    .class
                    .construct_chain()
                    .get(index)
                    .map_or_else(|| self.class_name().to_string(), |link| link.class.clone());
                return Err(CoreError::DependencyPrecedence {
                    dependency: name.to_string(),
                    required_by,
                    provided_by: provider.to_string(),
                });
            }
            return Ok(None);
        };
        self.validator
            .require_dependency(name, Some(&value), spec)?;
        Ok(Some(value))
    }

    /// Validate an arbitrary value.
    pub fn validate(&self, value: &Value, spec: &Instruction) -> Result<(), CoreError> {
        Ok(self.validator.require_valid(value, spec)?)
    }

    pub fn validate_param(
        &self,
        name: &str,
        value: &Value,
        spec: &Instruction,
    ) -> Result<(), CoreError> {
        Ok(self.validator.require_param(name, value, spec)?)
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }

    /// Assign a property without validation.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(name, value);
    }

    /// Validate, then assign a property.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<Value>,
        spec: &Instruction,
    ) -> Result<(), CoreError> {
        let value = value.into();
        self.validator.require_property(name, &value, spec)?;
        self.properties.write().insert(name, value);
        Ok(())
    }

    /// Build a thrown error. `info` is extended with `$thrownBy`.
    pub fn throw(&self, info: Config, kind: &str, template: &str, args: &[Value]) -> CoreError {
        self.thrown(info, kind, template, args, None)
    }

    /// Like [`throw`](Self::throw), attaching the error that caused it.
    pub fn throw_caused_by(
        &self,
        cause: CoreError,
        info: Config,
        kind: &str,
        template: &str,
        args: &[Value],
    ) -> CoreError {
        self.thrown(info, kind, template, args, Some(Box::new(cause)))
    }

    fn thrown(
        &self,
        mut info: Config,
        kind: &str,
        template: &str,
        args: &[Value],
        cause: Option<Box<CoreError>>,
    ) -> CoreError {
        if let Some(this) = self.to_value() {
            info.insert("$thrownBy", this);
        }
        CoreError::Thrown(Box::new(ThrownError {
            kind: kind.to_string(),
            message: format_message(template, args),
            thrown_by: format!("{}#{}", self.class_name(), self.id),
            info,
            cause,
        }))
    }
}

fn missing(name: &str, spec: &Instruction) -> CoreError {
    CoreError::Validation(ValidationError::Dependency {
        name: name.to_string(),
        expected: spec.clone(),
        actual: UNDEFINED_DESCRIPTION.to_string(),
    })
}

impl RuntimeObject for Instance {
    fn class_name(&self) -> &str {
        self.class.name()
    }

    fn is_instance_of(&self, class_name: &str) -> bool {
        self.class.is_subclass_of(class_name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Dependency access for one `$construct` unit.
///
/// Only the names the unit declared can be read. Values come from the
/// working config as it stood when the unit started, including overrides
/// returned by earlier units.
pub struct ConstructArgs<'a> {
    instance: &'a Instance,
    index: usize,
    class: &'a str,
    declared: &'a [String],
    config: Config,
}

impl<'a> ConstructArgs<'a> {
    pub(crate) fn new(
        instance: &'a Instance,
        index: usize,
        class: &'a str,
        declared: &'a [String],
    ) -> Self {
        Self {
            instance,
            index,
            class,
            declared,
            config: instance.config(),
        }
    }

    /// The class that declared the running unit.
    pub fn class(&self) -> &str {
        self.class
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn declared(&self, name: &str) -> Result<(), CoreError> {
        if self.declared.iter().any(|d| d == name) {
            Ok(())
        } else {
            Err(CoreError::UndeclaredDependency {
                class: self.class.to_string(),
                dependency: name.to_string(),
            })
        }
    }

    /// Unvalidated access to a declared dependency.
    pub fn get(&self, name: &str) -> Result<Option<&Value>, CoreError> {
        self.declared(name)?;
        Ok(self.config.get(name))
    }

    pub fn require(&self, name: &str, spec: &Instruction) -> Result<Value, CoreError> {
        self.optional(name, spec)?
            .ok_or_else(|| missing(name, spec))
    }

    pub fn optional(&self, name: &str, spec: &Instruction) -> Result<Option<Value>, CoreError> {
        self.declared(name)?;
        self.instance.resolve_dependency(
            name,
            self.config.get(name).cloned(),
            spec,
            Some(self.index),
        )
    }
}
