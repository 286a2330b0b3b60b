//! Composition of a base class and ordered mixins into one class.
//!
//! ## Linearisation
//!
//! ```text
//! Core.Base … base ancestors, base, [nested mixins, mixin]…, concrete class
//! ```
//!
//! Each definition is preceded by its base chain and then by its own mixins
//! (each mixin preceded by the mixins it composes). A unit reached twice
//! keeps its first position. Method tables are layered in this order so the
//! last-listed mixin wins over earlier ones and the concrete class, which
//! comes last, wins over every mixin. Hook chains follow the same order.

use crate::definition::{ClassDefinition, Method, ROOT_CLASS, is_valid_name};
use crate::error::CoreError;
use crate::hook::{ConstructUnit, Hook, MixinContext, PhaseFn};
use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Definition lookup used while composing.
pub type Lookup<'a> = dyn Fn(&str) -> Result<Arc<ClassDefinition>, CoreError> + 'a;

/// Cache key: a base class and an ordered mixin list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompositionKey {
    pub base: String,
    pub mixins: Vec<String>,
}

impl CompositionKey {
    pub fn new(base: impl Into<String>, mixins: &[String]) -> Self {
        Self {
            base: base.into(),
            mixins: mixins.to_vec(),
        }
    }

    /// `Base` for a plain class, `mix(Base, M1, M2)` for a composition.
    pub fn display_name(&self) -> String {
        if self.mixins.is_empty() {
            self.base.clone()
        } else {
            format!("mix({}, {})", self.base, self.mixins.join(", "))
        }
    }
}

#[derive(Clone)]
struct MethodEntry {
    owner: String,
    method: Method,
}

/// A `$construct` unit and the class that declared it.
#[derive(Debug, Clone)]
pub struct ConstructLink {
    pub class: String,
    pub unit: ConstructUnit,
}

/// A phase hook and the class that declared it.
#[derive(Clone)]
pub struct HookLink {
    pub class: String,
    pub body: Arc<PhaseFn>,
}

impl fmt::Debug for HookLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookLink")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// A dependency some construct unit requires while a later unit provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecedenceIssue {
    pub dependency: String,
    pub required_by: String,
    pub provided_by: String,
}

/// The effective class produced by the mixer.
pub struct ComposedClass {
    name: String,
    key: CompositionKey,
    units: Vec<Arc<ClassDefinition>>,
    introduced: Vec<String>,
    methods: BTreeMap<String, MethodEntry>,
    construct_chain: Vec<ConstructLink>,
    hook_chains: BTreeMap<Hook, Vec<HookLink>>,
    instantiable: bool,
}

impl ComposedClass {
    fn build(
        key: CompositionKey,
        units: Vec<Arc<ClassDefinition>>,
        introduced: Vec<String>,
        instantiable: bool,
    ) -> Self {
        let mut methods = BTreeMap::new();
        let mut construct_chain = Vec::new();
        let mut hook_chains: BTreeMap<Hook, Vec<HookLink>> = BTreeMap::new();

        for unit in &units {
            for (name, method) in unit.methods() {
                methods.insert(
                    name.to_string(),
                    MethodEntry {
                        owner: unit.name().to_string(),
                        method: method.clone(),
                    },
                );
            }
            if let Some(construct) = unit.construct() {
                construct_chain.push(ConstructLink {
                    class: unit.name().to_string(),
                    unit: construct.clone(),
                });
            }
            for hook in Hook::PHASES {
                if let Some(body) = unit.phase_hook(hook) {
                    hook_chains.entry(hook).or_default().push(HookLink {
                        class: unit.name().to_string(),
                        body: body.clone(),
                    });
                }
            }
        }

        Self {
            name: key.display_name(),
            key,
            units,
            introduced,
            methods,
            construct_chain,
            hook_chains,
            instantiable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &CompositionKey {
        &self.key
    }

    /// Linearised units, root first.
    pub fn units(&self) -> &[Arc<ClassDefinition>] {
        &self.units
    }

    pub fn lineage(&self) -> Vec<&str> {
        self.units.iter().map(|unit| unit.name()).collect()
    }

    /// Whether this class is, derives from, or composes `class_name`.
    pub fn is_subclass_of(&self, class_name: &str) -> bool {
        self.name == class_name || self.units.iter().any(|unit| unit.name() == class_name)
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Mixins whose composition hooks ran when this class was composed.
    pub fn introduced_mixins(&self) -> &[String] {
        &self.introduced
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name).map(|entry| &entry.method)
    }

    /// The unit whose implementation of `name` won.
    pub fn method_owner(&self, name: &str) -> Option<&str> {
        self.methods.get(name).map(|entry| entry.owner.as_str())
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn construct_chain(&self) -> &[ConstructLink] {
        &self.construct_chain
    }

    /// Chain for a phase hook. `$construct` and mixin hooks have their own
    /// representations and yield an empty slice here.
    pub fn hook_chain(&self, hook: Hook) -> &[HookLink] {
        self.hook_chains.get(&hook).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ordered, de-duplicated union of every construct unit's dependencies.
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for link in &self.construct_chain {
            for dependency in &link.unit.dependencies {
                if !names.contains(dependency) {
                    names.push(dependency.clone());
                }
            }
        }
        names
    }

    /// First construct unit after position `index` that provides `name`.
    pub fn provider_after(&self, index: usize, name: &str) -> Option<&str> {
        self.construct_chain
            .iter()
            .skip(index + 1)
            .find(|link| link.unit.provides(name))
            .map(|link| link.class.as_str())
    }

    /// Dependencies required by a construct unit but only provided by a
    /// later one.
    pub fn precedence_report(&self) -> Vec<PrecedenceIssue> {
        let mut issues = Vec::new();
        for (index, link) in self.construct_chain.iter().enumerate() {
            for dependency in &link.unit.dependencies {
                if let Some(provider) = self.provider_after(index, dependency) {
                    issues.push(PrecedenceIssue {
                        dependency: dependency.clone(),
                        required_by: link.class.clone(),
                        provided_by: provider.to_string(),
                    });
                }
            }
        }
        issues
    }

    pub fn summary(&self) -> CompositionSummary {
        let hooks = self
            .hook_chains
            .iter()
            .map(|(hook, chain)| {
                (*hook, chain.iter().map(|l| l.class.clone()).collect::<Vec<_>>())
            })
            .chain(
                (!self.construct_chain.is_empty()).then(|| {
                    let classes = self.construct_chain.iter().map(|l| l.class.clone()).collect::<Vec<_>>();
                    (Hook::Construct, classes)
                }),
            )
            .collect();
        CompositionSummary {
            name: self.name.clone(),
            lineage: self.lineage().into_iter().map(str::to_string).collect(),
            instantiable: self.instantiable,
            methods: self
                .methods
                .iter()
                .map(|(name, entry)| (name.clone(), entry.owner.clone()))
                .collect(),
            hooks,
            dependencies: self.dependency_names(),
            precedence: self.precedence_report(),
        }
    }
}

impl fmt::Debug for ComposedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedClass")
            .field("name", &self.name)
            .field("lineage", &self.lineage())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Serializable outline of a composed class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSummary {
    pub name: String,
    pub lineage: Vec<String>,
    pub instantiable: bool,
    /// Method name → owning unit.
    pub methods: BTreeMap<String, String>,
    /// Hook → declaring units, in execution order.
    pub hooks: BTreeMap<Hook, Vec<String>>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub precedence: Vec<PrecedenceIssue>,
}

/// One memoised composition.
///
/// Built and hooked at most once. The re-entrant guard serialises first
/// access per key; a mixin hook asking for its own composition on the same
/// thread sees `building` and fails instead of deadlocking.
#[derive(Default)]
struct CompositionSlot {
    guard: ReentrantMutex<Cell<bool>>,
    composed: OnceLock<Arc<ComposedClass>>,
}

/// Composes definitions and memoises the results.
#[derive(Default)]
pub struct Mixer {
    cache: RwLock<HashMap<CompositionKey, Arc<CompositionSlot>>>,
    disabled: bool,
}

impl Mixer {
    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache: RwLock::default(),
            disabled: !cache_enabled,
        }
    }

    /// Compositions built so far. Failed builds are not counted.
    pub fn cached(&self) -> usize {
        self.cache
            .read()
            .values()
            .filter(|slot| slot.composed.get().is_some())
            .count()
    }

    /// Compose `base` with `mixins`. With no mixins this is the plain class.
    ///
    /// Mixin hooks of the mixins this composition introduces run once, when
    /// the composition is first built. Concurrent first requests for the same
    /// key wait for that build. A failed build is retried by the next request.
    pub fn compose(
        &self,
        lookup: &Lookup<'_>,
        base: &str,
        mixins: &[String],
    ) -> Result<Arc<ComposedClass>, CoreError> {
        for name in std::iter::once(base).chain(mixins.iter().map(String::as_str)) {
            if !is_valid_name(name) {
                return Err(CoreError::InvalidName(name.to_string()));
            }
        }

        let key = CompositionKey::new(base, mixins);
        if self.disabled {
            return self.build(lookup, key);
        }

        let slot = self.cache.read().get(&key).cloned();
        let slot = match slot {
            Some(slot) => slot,
            None => self.cache.write().entry(key.clone()).or_default().clone(),
        };
        if let Some(composed) = slot.composed.get() {
            trace!(class = %composed.name(), "composition cache hit");
            return Ok(composed.clone());
        }

        let guard = slot.guard.lock();
        if let Some(composed) = slot.composed.get() {
            trace!(class = %composed.name(), "composition built by another caller");
            return Ok(composed.clone());
        }
        if guard.replace(true) {
            return Err(CoreError::CircularComposition(key.display_name()));
        }
        let result = self.build(lookup, key);
        guard.set(false);
        let composed = result?;
        Ok(slot.composed.get_or_init(|| composed).clone())
    }

    /// Linearise, layer and run the mixin hooks of one composition.
    fn build(
        &self,
        lookup: &Lookup<'_>,
        key: CompositionKey,
    ) -> Result<Arc<ComposedClass>, CoreError> {
        let base = key.base.as_str();
        let mixins = key.mixins.as_slice();
        let base_def = lookup(base)?;
        let composing = key.display_name();
        let mut units = Vec::new();
        self.linearize(lookup, &base_def, &mut Vec::new(), &mut units)?;

        let introduced: Vec<String> = if mixins.is_empty() {
            let mut inherited = Vec::new();
            if let Some(parent) = base_def.base() {
                self.linearize(lookup, &lookup(parent)?, &mut Vec::new(), &mut inherited)?;
            }
            units
                .iter()
                .filter(|unit| unit.is_mixin() && !contains(&inherited, unit.name()))
                .map(|unit| unit.name().to_string())
                .collect()
        } else {
            if base_def.is_mixin() {
                return Err(CoreError::InvalidBaseClass {
                    class: composing,
                    reason: format!("`{base}` is a mixin"),
                });
            }
            let inherited = units.len();
            for mixin in mixins {
                let mixin_def = self.resolve_mixin(lookup, mixin, &composing)?;
                self.linearize(lookup, &mixin_def, &mut Vec::new(), &mut units)?;
            }
            units[inherited..]
                .iter()
                .map(|unit| unit.name().to_string())
                .collect()
        };

        let instantiable = !base_def.is_mixin();
        let composed = Arc::new(ComposedClass::build(key, units, introduced, instantiable));
        if composed.is_instantiable() {
            run_mixin_hooks(&composed)?;
        }
        debug!(
            class = %composed.name(),
            units = composed.units().len(),
            methods = composed.methods.len(),
            "composed class"
        );
        Ok(composed)
    }

    fn resolve_mixin(
        &self,
        lookup: &Lookup<'_>,
        mixin: &str,
        composing: &str,
    ) -> Result<Arc<ClassDefinition>, CoreError> {
        let definition = lookup(mixin).map_err(|err| match err {
            CoreError::ClassNotFound(_) => CoreError::UnknownMixin {
                mixin: mixin.to_string(),
                composing: composing.to_string(),
            },
            other => other,
        })?;
        if !definition.is_mixin() {
            return Err(CoreError::NotAMixin(mixin.to_string()));
        }
        Ok(definition)
    }

    fn linearize(
        &self,
        lookup: &Lookup<'_>,
        definition: &Arc<ClassDefinition>,
        path: &mut Vec<String>,
        out: &mut Vec<Arc<ClassDefinition>>,
    ) -> Result<(), CoreError> {
        let name = definition.name();
        if path.iter().any(|seen| seen == name) {
            let cycle = format!("{} -> {name}", path.join(" -> "));
            return Err(if definition.is_mixin() {
                CoreError::invalid_definition(name, format!("mixin cycle: {cycle}"))
            } else {
                CoreError::InvalidBaseClass {
                    class: name.to_string(),
                    reason: format!("inheritance cycle: {cycle}"),
                }
            });
        }
        if contains(out, name) {
            return Ok(());
        }
        path.push(name.to_string());

        match definition.base() {
            Some(base) => {
                let base_def = lookup(base).map_err(|err| match err {
                    CoreError::ClassNotFound(_) => CoreError::InvalidBaseClass {
                        class: name.to_string(),
                        reason: format!("base class `{base}` cannot be resolved"),
                    },
                    other => other,
                })?;
                if base_def.is_mixin() {
                    return Err(CoreError::InvalidBaseClass {
                        class: name.to_string(),
                        reason: format!("`{base}` is a mixin"),
                    });
                }
                self.linearize(lookup, &base_def, path, out)?;
            }
            None if !definition.is_mixin() && name != ROOT_CLASS => {
                return Err(CoreError::InvalidBaseClass {
                    class: name.to_string(),
                    reason: format!("does not derive from `{ROOT_CLASS}`"),
                });
            }
            None => {}
        }

        for mixin in definition.mixins() {
            let mixin_def = self.resolve_mixin(lookup, mixin, name)?;
            self.linearize(lookup, &mixin_def, path, out)?;
        }

        path.pop();
        if !contains(out, name) {
            out.push(definition.clone());
        }
        Ok(())
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("cached", &self.cached())
            .field("cache_enabled", &!self.disabled)
            .finish()
    }
}

fn contains(units: &[Arc<ClassDefinition>], name: &str) -> bool {
    units.iter().any(|unit| unit.name() == name)
}

/// All `$beforeMixin`, then all `$mixin`, then all `$afterMixin`, each
/// phase in composition order.
fn run_mixin_hooks(composed: &ComposedClass) -> Result<(), CoreError> {
    let introduced = composed.introduced_mixins();
    for hook in Hook::MIXIN_PHASES {
        for mixin in introduced {
            let Some(definition) = composed.units().iter().find(|u| u.name() == mixin) else {
                continue;
            };
            let Some(body) = definition.mixin_hook(hook) else {
                continue;
            };
            let siblings: Vec<String> = introduced
                .iter()
                .filter(|other| *other != mixin)
                .cloned()
                .collect();
            let context = MixinContext {
                mixin,
                siblings: &siblings,
                composed,
            };
            trace!(mixin = %mixin, %hook, class = %composed.name(), "running mixin hook");
            body(&context).map_err(|err| CoreError::hook(mixin.as_str(), hook, err))?;
        }
    }
    Ok(())
}
