//! Where namespaces get their definitions from.

use crate::definition::ClassDefinition;
use std::collections::BTreeMap;

/// A resolution source bound to a namespace prefix.
///
/// `module` is the class name relative to the prefix: with a source bound
/// to `App`, `App.fs.Directory` is requested as `fs.Directory`.
pub trait ClassSource: Send + Sync {
    fn load(&self, module: &str) -> Option<ClassDefinition>;

    /// Modules this source can enumerate. Resolver functions cannot.
    fn modules(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> ClassSource for F
where
    F: Fn(&str) -> Option<ClassDefinition> + Send + Sync,
{
    fn load(&self, module: &str) -> Option<ClassDefinition> {
        self(module)
    }
}

/// In-memory module table, scanned once when the namespace is registered.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    modules: BTreeMap<String, ClassDefinition>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, module: impl Into<String>, definition: ClassDefinition) -> Self {
        self.insert(module, definition);
        self
    }

    pub fn insert(
        &mut self,
        module: impl Into<String>,
        definition: ClassDefinition,
    ) -> Option<ClassDefinition> {
        self.modules.insert(module.into(), definition)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ClassSource for ModuleTable {
    fn load(&self, module: &str) -> Option<ClassDefinition> {
        self.modules.get(module).cloned()
    }

    fn modules(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> ClassDefinition {
        ClassDefinition::class(name).build().expect("build")
    }

    #[test]
    fn tables_enumerate_their_modules() {
        let table = ModuleTable::new()
            .with("fs.File", class("App.fs.File"))
            .with("fs.Directory", class("App.fs.Directory"));
        assert_eq!(table.modules(), vec!["fs.Directory", "fs.File"]);
        assert_eq!(
            table.load("fs.File").map(|d| d.name().to_string()),
            Some("App.fs.File".to_string())
        );
        assert!(table.load("fs.Link").is_none());
    }

    #[test]
    fn closures_are_sources() {
        let source = |module: &str| (module == "Main").then(|| class("App.Main"));
        assert!(source.load("Main").is_some());
        assert!(source.modules().is_empty());
    }
}
