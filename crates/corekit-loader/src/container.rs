//! IoC container: named statics, singleton factories and plain factories.
//!
//! The container is built before the loader that consults it and bound to
//! that loader afterwards ([`Container::bind_loader`]), so factories can
//! instantiate classes without capturing the loader up front.
//!
//! Singletons are initialised at most once. Each slot has its own re-entrant
//! lock: parallel first access blocks until the winner has stored the
//! value, and a factory that asks for its own entry on the same thread is
//! reported as [`CoreError::CircularDependency`] instead of deadlocking.

use crate::error::CoreError;
use crate::loader::ClassLoader;
use corekit_check::{Config, Value};
use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

pub type FactoryFn = dyn Fn(&FactoryContext<'_>) -> Result<Value, CoreError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Static,
    Singleton,
    Factory,
}

enum SlotState {
    Vacant,
    Initializing,
    Ready(Value),
}

struct SingletonSlot {
    factory: Arc<FactoryFn>,
    state: ReentrantMutex<RefCell<SlotState>>,
}

impl SingletonSlot {
    fn get(&self, context: &FactoryContext<'_>) -> Result<Value, CoreError> {
        let guard = self.state.lock();
        match &*guard.borrow() {
            SlotState::Ready(value) => return Ok(value.clone()),
            SlotState::Initializing => {
                return Err(CoreError::CircularDependency(context.name.to_string()));
            }
            SlotState::Vacant => {}
        }

        *guard.borrow_mut() = SlotState::Initializing;
        debug!(entry = context.name, "initialising singleton");
        let result = (self.factory)(context);
        let mut state = guard.borrow_mut();
        match result {
            Ok(value) => {
                *state = SlotState::Ready(value.clone());
                Ok(value)
            }
            Err(err) => {
                *state = SlotState::Vacant;
                Err(err)
            }
        }
    }
}

#[derive(Clone)]
enum Entry {
    Static(Value),
    Singleton(Arc<SingletonSlot>),
    Factory(Arc<FactoryFn>),
}

impl Entry {
    fn kind(&self) -> EntryKind {
        match self {
            Entry::Static(_) => EntryKind::Static,
            Entry::Singleton(_) => EntryKind::Singleton,
            Entry::Factory(_) => EntryKind::Factory,
        }
    }
}

/// What a factory receives when it is invoked.
pub struct FactoryContext<'a> {
    pub container: &'a Container,
    /// Name of the entry being produced.
    pub name: &'a str,
}

impl FactoryContext<'_> {
    /// The loader this container is bound to.
    pub fn loader(&self) -> Result<Arc<ClassLoader>, CoreError> {
        self.container.loader()
    }

    /// Resolve another entry. Absent entries are an error here.
    pub fn get(&self, name: &str) -> Result<Value, CoreError> {
        self.container
            .get(name)?
            .ok_or_else(|| CoreError::MissingEntry(name.to_string()))
    }
}

#[derive(Default)]
pub struct Container {
    entries: RwLock<BTreeMap<String, Entry>>,
    loader: RwLock<Option<Weak<ClassLoader>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// A container seeded with static entries.
    pub fn with_statics(statics: Config) -> Self {
        let entries = statics
            .iter()
            .map(|(name, value)| (name.to_string(), Entry::Static(value.clone())))
            .collect();
        Self {
            entries: RwLock::new(entries),
            loader: RwLock::default(),
        }
    }

    /// Pre-bind a container the loader is still being built around.
    pub(crate) fn bound_to(mut self, loader: Weak<ClassLoader>) -> Self {
        self.loader = RwLock::new(Some(loader));
        self
    }

    fn insert(&self, name: String, entry: Entry) -> Result<(), CoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(CoreError::DuplicateEntry(name));
        }
        debug!(entry = %name, kind = ?entry.kind(), "registered container entry");
        entries.insert(name, entry);
        Ok(())
    }

    /// Register a value returned verbatim.
    pub fn register_static(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), CoreError> {
        self.insert(name.into(), Entry::Static(value.into()))
    }

    /// Register a factory invoked on first request and memoised.
    pub fn register_singleton_factory<F>(
        &self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), CoreError>
    where
        F: Fn(&FactoryContext<'_>) -> Result<Value, CoreError> + Send + Sync + 'static,
    {
        let slot = SingletonSlot {
            factory: Arc::new(factory),
            state: ReentrantMutex::new(RefCell::new(SlotState::Vacant)),
        };
        self.insert(name.into(), Entry::Singleton(Arc::new(slot)))
    }

    /// Register a factory invoked on every request.
    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F) -> Result<(), CoreError>
    where
        F: Fn(&FactoryContext<'_>) -> Result<Value, CoreError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Entry::Factory(Arc::new(factory)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Resolve `name`. Unregistered names yield `None`.
    ///
    /// No container lock is held while a factory runs.
    pub fn get(&self, name: &str) -> Result<Option<Value>, CoreError> {
        let Some(entry) = self.entries.read().get(name).cloned() else {
            return Ok(None);
        };
        trace!(entry = name, kind = ?entry.kind(), "resolving container entry");
        let context = FactoryContext {
            container: self,
            name,
        };
        let value = match entry {
            Entry::Static(value) => value,
            Entry::Singleton(slot) => slot.get(&context)?,
            Entry::Factory(factory) => factory(&context)?,
        };
        Ok(Some(value))
    }

    /// Registered names and their kinds.
    pub fn entries(&self) -> Vec<(String, EntryKind)> {
        self.entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.kind()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Second construction phase: attach the loader factories may use.
    pub fn bind_loader(&self, loader: &Arc<ClassLoader>) -> Result<(), CoreError> {
        let mut slot = self.loader.write();
        if slot.is_some() {
            return Err(CoreError::AlreadyBound);
        }
        *slot = Some(Arc::downgrade(loader));
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.loader.read().is_some()
    }

    pub fn loader(&self) -> Result<Arc<ClassLoader>, CoreError> {
        self.loader
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(CoreError::ContainerUnbound)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("entries", &self.entries())
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&FactoryContext<'_>) -> Result<Value, CoreError> + Send + Sync + 'static {
        let counter = counter.clone();
        move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Value::from(n as u64))
        }
    }

    #[test]
    fn statics_are_returned_verbatim() {
        let container = Container::new();
        container.register_static("name", "demo").expect("register");
        assert!(container.has("name"));
        assert_eq!(container.get("name").expect("get"), Some(Value::from("demo")));
        assert_eq!(container.get("missing").expect("get"), None);
    }

    #[test]
    fn singletons_are_memoised_and_factories_are_not() {
        let container = Container::new();
        let singleton_calls = Arc::new(AtomicUsize::new(0));
        let factory_calls = Arc::new(AtomicUsize::new(0));
        container
            .register_singleton_factory("db", counting(&singleton_calls))
            .expect("singleton");
        container
            .register_factory("request", counting(&factory_calls))
            .expect("factory");

        for _ in 0..3 {
            assert_eq!(container.get("db").expect("db"), Some(Value::from(1u64)));
            container.get("request").expect("request");
        }
        assert_eq!(singleton_calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn parallel_first_access_initialises_once() {
        let container = Arc::new(Container::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        container
            .register_singleton_factory("slow", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(20));
                Ok(Value::from("ready"))
            })
            .expect("register");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || container.get("slow").expect("get"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("join"), Some(Value::from("ready")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn self_referencing_singletons_fail() {
        let container = Container::new();
        container
            .register_singleton_factory("loop", |ctx| ctx.get("loop"))
            .expect("register");
        assert!(matches!(
            container.get("loop"),
            Err(CoreError::CircularDependency(ref name)) if name == "loop"
        ));
    }

    #[test]
    fn failed_singletons_can_retry() {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        container
            .register_singleton_factory("flaky", move |ctx| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(CoreError::MissingEntry(ctx.name.to_string()));
                }
                Ok(Value::from(true))
            })
            .expect("register");
        assert!(container.get("flaky").is_err());
        assert_eq!(container.get("flaky").expect("second"), Some(Value::from(true)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let container = Container::with_statics(Config::new().with("retries", 3));
        assert!(matches!(
            container.register_static("retries", 5),
            Err(CoreError::DuplicateEntry(_))
        ));
        assert_eq!(container.entries(), vec![("retries".to_string(), EntryKind::Static)]);
    }

    #[test]
    fn factories_need_a_bound_loader() {
        let container = Container::new();
        container
            .register_factory("app", |ctx| ctx.loader().map(|_| Value::null()))
            .expect("register");
        assert!(matches!(container.get("app"), Err(CoreError::ContainerUnbound)));
    }
}
