//! Class and mixin definitions.
//!
//! A definition is an immutable composition table: ordinary methods keyed by
//! name, an optional `$construct` unit, phase hooks and (for mixins)
//! composition-time hooks. Definitions are built once and shared as
//! `Arc<ClassDefinition>`.

use crate::error::CoreError;
use crate::hook::{ConstructUnit, Hook, MixinContext, MixinFn, PhaseFn};
use crate::instance::Instance;
use corekit_check::Value;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Root of every class hierarchy.
pub const ROOT_CLASS: &str = "Core.Base";

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
            .expect("name regex must compile")
    })
}

/// Whether `name` is a dotted identifier path such as `Core.fs.Directory`.
pub fn is_valid_name(name: &str) -> bool {
    name_re().is_match(name)
}

pub type Method = Arc<dyn Fn(&Instance, &[Value]) -> Result<Value, CoreError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    /// Composable only; never instantiated on its own.
    Mixin,
}

#[derive(Clone)]
pub struct ClassDefinition {
    name: String,
    kind: ClassKind,
    base: Option<String>,
    mixins: Vec<String>,
    methods: BTreeMap<String, Method>,
    construct: Option<ConstructUnit>,
    phase_hooks: BTreeMap<Hook, Arc<PhaseFn>>,
    mixin_hooks: BTreeMap<Hook, Arc<MixinFn>>,
}

impl ClassDefinition {
    /// Start a class. Its base defaults to [`ROOT_CLASS`].
    pub fn class(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), ClassKind::Class)
    }

    /// Start a mixin.
    pub fn mixin(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), ClassKind::Mixin)
    }

    /// The root class every class derives from.
    pub(crate) fn root() -> Self {
        Self {
            name: ROOT_CLASS.to_string(),
            kind: ClassKind::Class,
            base: None,
            mixins: Vec::new(),
            methods: BTreeMap::new(),
            construct: None,
            phase_hooks: BTreeMap::new(),
            mixin_hooks: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is_mixin(&self) -> bool {
        self.kind == ClassKind::Mixin
    }

    /// Direct base class. `None` for the root and for mixins.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Mixins composed into this definition, in order.
    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &Method)> {
        self.methods.iter().map(|(name, method)| (name.as_str(), method))
    }

    pub fn construct(&self) -> Option<&ConstructUnit> {
        self.construct.as_ref()
    }

    pub fn phase_hook(&self, hook: Hook) -> Option<&Arc<PhaseFn>> {
        self.phase_hooks.get(&hook)
    }

    pub fn mixin_hook(&self, hook: Hook) -> Option<&Arc<MixinFn>> {
        self.mixin_hooks.get(&hook)
    }

    /// Every hook this definition declares.
    pub fn hooks(&self) -> Vec<Hook> {
        let mut hooks: Vec<Hook> = self
            .phase_hooks
            .keys()
            .chain(self.mixin_hooks.keys())
            .copied()
            .collect();
        if self.construct.is_some() {
            hooks.push(Hook::Construct);
        }
        hooks.sort();
        hooks
    }

    pub fn summary(&self) -> DefinitionSummary {
        DefinitionSummary {
            name: self.name.clone(),
            kind: self.kind,
            base: self.base.clone(),
            mixins: self.mixins.clone(),
            methods: self.methods.keys().cloned().collect(),
            hooks: self.hooks(),
            dependencies: self
                .construct
                .as_ref()
                .map(|unit| unit.dependencies.clone())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("mixins", &self.mixins)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks())
            .finish()
    }
}

/// Serializable outline of a definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSummary {
    pub name: String,
    pub kind: ClassKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub mixins: Vec<String>,
    pub methods: Vec<String>,
    pub hooks: Vec<Hook>,
    pub dependencies: Vec<String>,
}

/// Builder for [`ClassDefinition`]. Misuse is reported by [`build`](Self::build).
pub struct ClassBuilder {
    definition: ClassDefinition,
    error: Option<CoreError>,
}

impl ClassBuilder {
    fn new(name: String, kind: ClassKind) -> Self {
        let base = match kind {
            ClassKind::Class => Some(ROOT_CLASS.to_string()),
            ClassKind::Mixin => None,
        };
        Self {
            definition: ClassDefinition {
                name,
                kind,
                base,
                mixins: Vec::new(),
                methods: BTreeMap::new(),
                construct: None,
                phase_hooks: BTreeMap::new(),
                mixin_hooks: BTreeMap::new(),
            },
            error: None,
        }
    }

    fn fail(&mut self, error: CoreError) {
        self.error.get_or_insert(error);
    }

    fn invalid(&mut self, reason: impl Into<String>) {
        let error = CoreError::invalid_definition(&self.definition.name, reason);
        self.fail(error);
    }

    /// Derive from `base` instead of the root class.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        if self.definition.is_mixin() {
            self.invalid("mixins cannot extend a base class");
        } else {
            self.definition.base = Some(base.into());
        }
        self
    }

    /// Compose `mixin` after the ones already listed.
    pub fn with_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.definition.mixins.push(mixin.into());
        self
    }

    pub fn with_mixins<I, S>(self, mixins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        mixins.into_iter().fold(self, Self::with_mixin)
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<Value, CoreError> + Send + Sync + 'static,
    {
        let name = name.into();
        if Hook::is_reserved(&name) {
            let error = CoreError::ReservedHook {
                class: self.definition.name.clone(),
                name,
            };
            self.fail(error);
        } else if self.definition.methods.contains_key(&name) {
            self.invalid(format!("method `{name}` is defined twice"));
        } else {
            self.definition.methods.insert(name, Arc::new(method));
        }
        self
    }

    pub fn construct(mut self, unit: ConstructUnit) -> Self {
        if self.definition.construct.is_some() {
            self.invalid("`$construct` is defined twice");
        } else {
            self.definition.construct = Some(unit);
        }
        self
    }

    /// Register an instance hook other than `$construct`.
    pub fn hook<F>(mut self, hook: Hook, body: F) -> Self
    where
        F: Fn(&Instance) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        if !Hook::PHASES.contains(&hook) {
            self.invalid(format!("`{hook}` is not an instance phase hook"));
        } else if self.definition.phase_hooks.contains_key(&hook) {
            self.invalid(format!("`{hook}` is defined twice"));
        } else {
            self.definition.phase_hooks.insert(hook, Arc::new(body));
        }
        self
    }

    /// Register a composition-time hook. Only mixins declare these.
    pub fn mixin_hook<F>(mut self, hook: Hook, body: F) -> Self
    where
        F: Fn(&MixinContext<'_>) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        if !hook.is_mixin_hook() {
            self.invalid(format!("`{hook}` is not a mixin hook"));
        } else if !self.definition.is_mixin() {
            self.invalid(format!("`{hook}` can only be declared by a mixin"));
        } else if self.definition.mixin_hooks.contains_key(&hook) {
            self.invalid(format!("`{hook}` is defined twice"));
        } else {
            self.definition.mixin_hooks.insert(hook, Arc::new(body));
        }
        self
    }

    pub fn build(self) -> Result<ClassDefinition, CoreError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let definition = self.definition;
        let names = std::iter::once(&definition.name)
            .chain(definition.base.iter())
            .chain(definition.mixins.iter());
        for name in names {
            if !is_valid_name(name) {
                return Err(CoreError::InvalidName(name.clone()));
            }
        }
        if definition.name == ROOT_CLASS {
            return Err(CoreError::invalid_definition(
                ROOT_CLASS,
                "the root class is built in",
            ));
        }
        if definition.mixins.contains(&definition.name) {
            return Err(CoreError::invalid_definition(
                &definition.name,
                "a definition cannot compose itself",
            ));
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::ConstructOutcome;

    #[test]
    fn classes_default_to_the_root_base() {
        let class = ClassDefinition::class("App.Main").build().expect("build");
        assert_eq!(class.base(), Some(ROOT_CLASS));
        let mixin = ClassDefinition::mixin("App.Logging").build().expect("build");
        assert_eq!(mixin.base(), None);
    }

    #[test]
    fn reserved_names_are_not_methods() {
        let err = ClassDefinition::class("App.Main")
            .method("$construct", |_, _| Ok(Value::null()))
            .build()
            .expect_err("reserved");
        assert!(matches!(err, CoreError::ReservedHook { ref name, .. } if name == "$construct"));
    }

    #[test]
    fn hooks_are_routed_by_kind() {
        let err = ClassDefinition::class("App.Main")
            .mixin_hook(Hook::Mixin, |_| Ok(()))
            .build()
            .expect_err("classes cannot declare mixin hooks");
        assert!(matches!(err, CoreError::InvalidDefinition { .. }));

        let err = ClassDefinition::class("App.Main")
            .hook(Hook::Construct, |_| Ok(()))
            .build()
            .expect_err("construct has its own unit");
        assert!(matches!(err, CoreError::InvalidDefinition { .. }));

        let mixin = ClassDefinition::mixin("App.Logging")
            .mixin_hook(Hook::AfterMixin, |_| Ok(()))
            .hook(Hook::Ready, |_| Ok(()))
            .construct(ConstructUnit::new(["logger"], |_, _| {
                Ok(ConstructOutcome::Continue)
            }))
            .build()
            .expect("build");
        assert_eq!(
            mixin.hooks(),
            vec![Hook::Construct, Hook::Ready, Hook::AfterMixin]
        );
    }

    #[test]
    fn mixins_cannot_extend() {
        assert!(
            ClassDefinition::mixin("App.Logging")
                .extends("App.Base")
                .build()
                .is_err()
        );
    }

    #[test]
    fn names_must_be_dotted_identifiers() {
        assert!(is_valid_name("Core.fs.Directory"));
        assert!(is_valid_name("$internal.Thing_2"));
        assert!(!is_valid_name("Core..Base"));
        assert!(!is_valid_name("Core.fs/Directory"));
        assert!(matches!(
            ClassDefinition::class("App.Main").with_mixin("not a name").build(),
            Err(CoreError::InvalidName(_))
        ));
    }

    #[test]
    fn summary_lists_methods_and_dependencies() {
        let class = ClassDefinition::class("App.Main")
            .with_mixins(["App.Logging"])
            .method("run", |_, _| Ok(Value::null()))
            .construct(ConstructUnit::new(["config"], |_, _| {
                Ok(ConstructOutcome::Continue)
            }))
            .build()
            .expect("build");
        insta::assert_json_snapshot!(class.summary(), @r#"
        {
          "name": "App.Main",
          "kind": "class",
          "base": "Core.Base",
          "mixins": [
            "App.Logging"
          ],
          "methods": [
            "run"
          ],
          "hooks": [
            "$construct"
          ],
          "dependencies": [
            "config"
          ]
        }
        "#);
    }
}
