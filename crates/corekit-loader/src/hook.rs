//! Lifecycle and mixin hooks.
//!
//! Hook names are reserved: they are routed into per-phase chains by the
//! mixer and can never be registered as ordinary methods.

use crate::error::CoreError;
use crate::instance::{ConstructArgs, Instance};
use crate::mixer::ComposedClass;
use corekit_check::Config;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The fixed set of hooks a definition may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Hook {
    #[serde(rename = "$beforeConstruct")]
    BeforeConstruct,
    #[serde(rename = "$construct")]
    Construct,
    #[serde(rename = "$afterConstruct")]
    AfterConstruct,
    #[serde(rename = "$beforeReady")]
    BeforeReady,
    #[serde(rename = "$ready")]
    Ready,
    #[serde(rename = "$afterReady")]
    AfterReady,
    #[serde(rename = "$beforeMixin")]
    BeforeMixin,
    #[serde(rename = "$mixin")]
    Mixin,
    #[serde(rename = "$afterMixin")]
    AfterMixin,
}

impl Hook {
    pub const ALL: [Hook; 9] = [
        Hook::BeforeConstruct,
        Hook::Construct,
        Hook::AfterConstruct,
        Hook::BeforeReady,
        Hook::Ready,
        Hook::AfterReady,
        Hook::BeforeMixin,
        Hook::Mixin,
        Hook::AfterMixin,
    ];

    /// Instance hooks other than `$construct`, in lifecycle order.
    pub const PHASES: [Hook; 5] = [
        Hook::BeforeConstruct,
        Hook::AfterConstruct,
        Hook::BeforeReady,
        Hook::Ready,
        Hook::AfterReady,
    ];

    /// Composition-time hooks, in invocation order.
    pub const MIXIN_PHASES: [Hook; 3] = [Hook::BeforeMixin, Hook::Mixin, Hook::AfterMixin];

    pub fn name(self) -> &'static str {
        match self {
            Hook::BeforeConstruct => "$beforeConstruct",
            Hook::Construct => "$construct",
            Hook::AfterConstruct => "$afterConstruct",
            Hook::BeforeReady => "$beforeReady",
            Hook::Ready => "$ready",
            Hook::AfterReady => "$afterReady",
            Hook::BeforeMixin => "$beforeMixin",
            Hook::Mixin => "$mixin",
            Hook::AfterMixin => "$afterMixin",
        }
    }

    pub fn from_name(name: &str) -> Option<Hook> {
        Hook::ALL.into_iter().find(|hook| hook.name() == name)
    }

    pub fn is_reserved(name: &str) -> bool {
        Hook::from_name(name).is_some()
    }

    pub fn is_mixin_hook(self) -> bool {
        Hook::MIXIN_PHASES.contains(&self)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one `$construct` unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConstructOutcome {
    /// No effect on the working config.
    #[default]
    Continue,
    /// Merge these values into the working config. Later units see them.
    Override(Config),
    /// Skip every remaining `$construct` unit. `$afterConstruct` still runs.
    Halt,
}

pub type ConstructFn =
    dyn Fn(&Instance, &ConstructArgs<'_>) -> Result<ConstructOutcome, CoreError> + Send + Sync;
pub type PhaseFn = dyn Fn(&Instance) -> Result<(), CoreError> + Send + Sync;
pub type MixinFn = dyn Fn(&MixinContext<'_>) -> Result<(), CoreError> + Send + Sync;

/// A `$construct` hook with its declared dependency descriptor.
///
/// `dependencies` are the config names the body reads; the loader fills the
/// missing ones from the IoC container before the lifecycle starts.
/// `provides` lists names the body supplies through
/// [`ConstructOutcome::Override`] so requests that run too early can be
/// reported precisely.
#[derive(Clone)]
pub struct ConstructUnit {
    pub dependencies: Vec<String>,
    pub provides: Vec<String>,
    pub body: Arc<ConstructFn>,
}

impl ConstructUnit {
    pub fn new<I, S, F>(dependencies: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Instance, &ConstructArgs<'_>) -> Result<ConstructOutcome, CoreError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            provides: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn providing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn declares(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    pub fn provides(&self, name: &str) -> bool {
        self.provides.iter().any(|p| p == name)
    }
}

impl fmt::Debug for ConstructUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructUnit")
            .field("dependencies", &self.dependencies)
            .field("provides", &self.provides)
            .finish_non_exhaustive()
    }
}

/// What a mixin hook sees when its composition is created.
pub struct MixinContext<'a> {
    /// The mixin declaring the hook.
    pub mixin: &'a str,
    /// Other mixins introduced by the same composition, in order.
    pub siblings: &'a [String],
    pub composed: &'a ComposedClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for hook in Hook::ALL {
            assert_eq!(Hook::from_name(hook.name()), Some(hook));
        }
        assert_eq!(Hook::from_name("construct"), None);
    }

    #[test]
    fn reserved_names() {
        assert!(Hook::is_reserved("$afterMixin"));
        assert!(!Hook::is_reserved("execute"));
        assert!(Hook::Mixin.is_mixin_hook());
        assert!(!Hook::Ready.is_mixin_hook());
    }

    #[test]
    fn construct_units_describe_their_dependencies() {
        let unit = ConstructUnit::new(["fs", "path"], |_, _| Ok(ConstructOutcome::Continue))
            .providing(["root"]);
        assert!(unit.declares("fs"));
        assert!(!unit.declares("root"));
        assert!(unit.provides("root"));
    }
}
