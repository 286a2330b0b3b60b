//! The class loader: namespace resolution, composition and instantiation.

use crate::config::LoaderConfig;
use crate::container::Container;
use crate::definition::{ClassDefinition, is_valid_name};
use crate::error::CoreError;
use crate::instance::Instance;
use crate::lifecycle;
use crate::mixer::{ComposedClass, Mixer};
use crate::source::{ClassSource, ModuleTable};
use corekit_check::{CheckRegistry, Config, Validator};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Namespace of the built-in root class.
pub const CORE_NAMESPACE: &str = "Core";

/// Resolves namespaced class names, composes them and drives instantiation.
///
/// A loader owns its namespaces, its definition cache and its composition
/// cache. Several loaders can coexist in one process.
pub struct ClassLoader {
    namespaces: RwLock<BTreeMap<String, Arc<dyn ClassSource>>>,
    definitions: RwLock<HashMap<String, Arc<ClassDefinition>>>,
    mixer: Mixer,
    container: Arc<Container>,
    validator: Validator,
    next_id: AtomicU64,
}

impl ClassLoader {
    /// A loader with the default configuration and a fresh container.
    pub fn new() -> Arc<Self> {
        Self::with_config(&LoaderConfig::default())
    }

    /// A loader with a fresh container seeded from `[ioc]`.
    pub fn with_config(config: &LoaderConfig) -> Arc<Self> {
        let checks = Arc::new(CheckRegistry::with_builtins_preview(
            config.validation.preview_chars,
        ));
        let statics = config.ioc_statics();
        Arc::new_cyclic(|this| {
            let container = Container::with_statics(statics).bound_to(this.clone());
            Self::assemble(config, checks, Arc::new(container))
        })
    }

    /// A loader around an existing check registry and container.
    ///
    /// The container is bound to the new loader; it must not be bound
    /// already. `[ioc]` statics are added to it.
    pub fn with_parts(
        config: &LoaderConfig,
        checks: Arc<CheckRegistry>,
        container: Arc<Container>,
    ) -> Result<Arc<Self>, CoreError> {
        for (name, value) in config.ioc_statics().iter() {
            container.register_static(name, value.clone())?;
        }
        let loader = Arc::new(Self::assemble(config, checks, container.clone()));
        container.bind_loader(&loader)?;
        Ok(loader)
    }

    fn assemble(config: &LoaderConfig, checks: Arc<CheckRegistry>, container: Arc<Container>) -> Self {
        let core: Arc<dyn ClassSource> =
            Arc::new(ModuleTable::new().with("Base", ClassDefinition::root()));
        Self {
            namespaces: RwLock::new(BTreeMap::from([(CORE_NAMESPACE.to_string(), core)])),
            definitions: RwLock::default(),
            mixer: Mixer::new(config.loader.composition_cache),
            container,
            validator: Validator::new(checks),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn checks(&self) -> &Arc<CheckRegistry> {
        self.validator.registry()
    }

    /// Compositions currently memoised.
    pub fn cached_compositions(&self) -> usize {
        self.mixer.cached()
    }

    /// Bind `prefix` to a resolution source.
    pub fn register_namespace(
        &self,
        prefix: impl Into<String>,
        source: impl ClassSource + 'static,
    ) -> Result<(), CoreError> {
        let prefix = prefix.into();
        if !is_valid_name(&prefix) {
            return Err(CoreError::InvalidName(prefix));
        }
        let mut namespaces = self.namespaces.write();
        if namespaces.contains_key(&prefix) {
            return Err(CoreError::DuplicateNamespace(prefix));
        }
        debug!(namespace = %prefix, "registered namespace");
        namespaces.insert(prefix, Arc::new(source));
        Ok(())
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().keys().cloned().collect()
    }

    /// Every class name the registered sources can enumerate.
    pub fn definitions(&self) -> Vec<String> {
        let namespaces: Vec<(String, Arc<dyn ClassSource>)> = self
            .namespaces
            .read()
            .iter()
            .map(|(prefix, source)| (prefix.clone(), source.clone()))
            .collect();
        let mut names: Vec<String> = namespaces
            .iter()
            .flat_map(|(prefix, source)| {
                source
                    .modules()
                    .into_iter()
                    .map(move |module| format!("{prefix}.{module}"))
            })
            .collect();
        names.sort();
        names
    }

    /// Longest registered prefix owning `name`, with the module remainder.
    fn source_for<'n>(&self, name: &'n str) -> Option<(Arc<dyn ClassSource>, String, &'n str)> {
        let namespaces = self.namespaces.read();
        namespaces
            .iter()
            .filter_map(|(prefix, source)| {
                let module = name.strip_prefix(prefix.as_str())?.strip_prefix('.')?;
                (!module.is_empty()).then(|| (source.clone(), prefix.clone(), module))
            })
            .max_by_key(|(_, prefix, _)| prefix.len())
    }

    /// Raw definition for `name`, loaded once and cached.
    pub fn definition(&self, name: &str) -> Result<Arc<ClassDefinition>, CoreError> {
        if let Some(definition) = self.definitions.read().get(name) {
            return Ok(definition.clone());
        }
        if !is_valid_name(name) {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        let (source, prefix, module) = self
            .source_for(name)
            .ok_or_else(|| CoreError::ClassNotFound(name.to_string()))?;
        let definition = source
            .load(module)
            .ok_or_else(|| CoreError::ClassNotFound(name.to_string()))?;
        if definition.name() != name {
            return Err(CoreError::invalid_definition(
                name,
                format!(
                    "namespace `{prefix}` resolved it to a definition named `{}`",
                    definition.name()
                ),
            ));
        }
        trace!(class = name, namespace = %prefix, "loaded definition");

        let mut definitions = self.definitions.write();
        Ok(definitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(definition))
            .clone())
    }

    /// The composed class for `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<ComposedClass>, CoreError> {
        self.mixer.compose(&|n| self.definition(n), name, &[])
    }

    /// Compose `base` with `mixins` into an anonymous class.
    pub fn compose<S: AsRef<str>>(
        &self,
        base: &str,
        mixins: &[S],
    ) -> Result<Arc<ComposedClass>, CoreError> {
        let mixins: Vec<String> = mixins.iter().map(|m| m.as_ref().to_string()).collect();
        self.mixer.compose(&|n| self.definition(n), base, &mixins)
    }

    /// Construct dependencies of `class`, in chain order.
    pub fn dependency_names(&self, class: &ComposedClass) -> Vec<String> {
        class.dependency_names()
    }

    pub fn instantiate(&self, name: &str, config: Config) -> Result<Arc<Instance>, CoreError> {
        let class = self.resolve(name)?;
        self.instantiate_class(class, config)
    }

    pub fn instantiate_mix<S: AsRef<str>>(
        &self,
        base: &str,
        mixins: &[S],
        config: Config,
    ) -> Result<Arc<Instance>, CoreError> {
        let class = self.compose(base, mixins)?;
        self.instantiate_class(class, config)
    }

    /// Fill dependencies missing from `explicit` from the container, then
    /// run the lifecycle. Explicit values are never replaced.
    pub fn instantiate_class(
        &self,
        class: Arc<ComposedClass>,
        explicit: Config,
    ) -> Result<Arc<Instance>, CoreError> {
        if !class.is_instantiable() {
            return Err(CoreError::NotInstantiable(class.name().to_string()));
        }

        let mut config = explicit;
        for dependency in class.dependency_names() {
            if config.contains(&dependency) {
                continue;
            }
            match self.container.get(&dependency)? {
                Some(value) => {
                    trace!(class = %class.name(), %dependency, "injected from container");
                    config.insert(dependency, value);
                }
                None => trace!(class = %class.name(), %dependency, "dependency left unset"),
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let instance = Instance::new(id, class, self.validator.clone(), config);
        lifecycle::run(&instance)?;
        debug!(class = %instance.class_name(), id, "instantiated");
        Ok(instance)
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoader")
            .field("namespaces", &self.namespaces())
            .field("definitions", &self.definitions.read().len())
            .field("mixer", &self.mixer)
            .field("container", &self.container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ROOT_CLASS;

    fn table() -> ModuleTable {
        ModuleTable::new()
            .with(
                "Main",
                ClassDefinition::class("App.Main").build().expect("main"),
            )
            .with(
                "fs.Directory",
                ClassDefinition::class("App.fs.Directory").build().expect("dir"),
            )
    }

    #[test]
    fn core_namespace_supplies_the_root() {
        let loader = ClassLoader::new();
        let root = loader.resolve(ROOT_CLASS).expect("root");
        assert_eq!(root.lineage(), vec![ROOT_CLASS]);
        assert_eq!(loader.namespaces(), vec![CORE_NAMESPACE]);
    }

    #[test]
    fn duplicate_namespaces_are_rejected() {
        let loader = ClassLoader::new();
        loader.register_namespace("App", table()).expect("first");
        assert!(matches!(
            loader.register_namespace("App", table()),
            Err(CoreError::DuplicateNamespace(ref p)) if p == "App"
        ));
        assert!(matches!(
            loader.register_namespace(CORE_NAMESPACE, table()),
            Err(CoreError::DuplicateNamespace(_))
        ));
    }

    #[test]
    fn longest_prefix_wins() {
        let loader = ClassLoader::new();
        loader.register_namespace("App", table()).expect("app");
        loader
            .register_namespace("App.fs", |module: &str| {
                (module == "Directory").then(|| {
                    ClassDefinition::class("App.fs.Directory")
                        .method("kind", |_, _| Ok("resolver".into()))
                        .build()
                        .expect("dir")
                })
            })
            .expect("fs");
        let dir = loader.resolve("App.fs.Directory").expect("resolve");
        assert_eq!(dir.method_owner("kind"), Some("App.fs.Directory"));
        assert!(loader.resolve("App.Main").is_ok());
    }

    #[test]
    fn unknown_names_are_not_found() {
        let loader = ClassLoader::new();
        loader.register_namespace("App", table()).expect("app");
        assert!(matches!(
            loader.resolve("App.Missing"),
            Err(CoreError::ClassNotFound(ref n)) if n == "App.Missing"
        ));
        assert!(matches!(
            loader.resolve("Other.Main"),
            Err(CoreError::ClassNotFound(_))
        ));
        assert!(matches!(loader.resolve("App"), Err(CoreError::ClassNotFound(_))));
    }

    #[test]
    fn definitions_must_carry_their_resolved_name() {
        let loader = ClassLoader::new();
        loader
            .register_namespace(
                "App",
                ModuleTable::new().with(
                    "Main",
                    ClassDefinition::class("App.Other").build().expect("other"),
                ),
            )
            .expect("app");
        assert!(matches!(
            loader.resolve("App.Main"),
            Err(CoreError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn definitions_are_enumerated_from_tables() {
        let loader = ClassLoader::new();
        loader.register_namespace("App", table()).expect("app");
        assert_eq!(
            loader.definitions(),
            vec!["App.Main", "App.fs.Directory", ROOT_CLASS]
        );
    }

    #[test]
    fn mixins_cannot_be_instantiated() {
        let loader = ClassLoader::new();
        loader
            .register_namespace(
                "App",
                ModuleTable::new().with(
                    "Logging",
                    ClassDefinition::mixin("App.Logging").build().expect("mixin"),
                ),
            )
            .expect("app");
        assert!(matches!(
            loader.instantiate("App.Logging", Config::new()),
            Err(CoreError::NotInstantiable(_))
        ));
    }

    #[test]
    fn supplied_containers_are_bound_once() {
        let container = Arc::new(Container::new());
        let config = LoaderConfig::default();
        let checks = Arc::new(CheckRegistry::with_builtins());
        let loader = ClassLoader::with_parts(&config, checks.clone(), container.clone())
            .expect("first loader");
        assert!(Arc::ptr_eq(loader.container(), &container));
        assert!(matches!(
            ClassLoader::with_parts(&config, checks, container),
            Err(CoreError::AlreadyBound)
        ));
    }
}
