//! The instance lifecycle.
//!
//! ```text
//! Allocated → BeforeConstruct → Constructing → AfterConstruct
//!          → BeforeReady → Ready → AfterReady → Initialized
//! ```
//!
//! Every phase runs its hook chain in linearisation order. The `$construct`
//! chain is a reducer over the working config: each unit may continue,
//! merge overrides visible to later units, or halt the rest of the chain.
//! A halt only ends `$construct`; the remaining phases still run. Any hook
//! error aborts instantiation.

use crate::error::CoreError;
use crate::hook::{ConstructOutcome, Hook};
use crate::instance::{ConstructArgs, Instance};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Allocated,
    BeforeConstruct,
    Constructing,
    AfterConstruct,
    BeforeReady,
    Ready,
    AfterReady,
    Initialized,
}

impl LifecycleState {
    /// Hook chain run on entering this state.
    pub fn hook(self) -> Option<Hook> {
        match self {
            LifecycleState::BeforeConstruct => Some(Hook::BeforeConstruct),
            LifecycleState::Constructing => Some(Hook::Construct),
            LifecycleState::AfterConstruct => Some(Hook::AfterConstruct),
            LifecycleState::BeforeReady => Some(Hook::BeforeReady),
            LifecycleState::Ready => Some(Hook::Ready),
            LifecycleState::AfterReady => Some(Hook::AfterReady),
            LifecycleState::Allocated | LifecycleState::Initialized => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Allocated => "allocated",
            LifecycleState::BeforeConstruct => "before-construct",
            LifecycleState::Constructing => "constructing",
            LifecycleState::AfterConstruct => "after-construct",
            LifecycleState::BeforeReady => "before-ready",
            LifecycleState::Ready => "ready",
            LifecycleState::AfterReady => "after-ready",
            LifecycleState::Initialized => "initialized",
        };
        f.write_str(name)
    }
}

const PHASES: [LifecycleState; 7] = [
    LifecycleState::BeforeConstruct,
    LifecycleState::Constructing,
    LifecycleState::AfterConstruct,
    LifecycleState::BeforeReady,
    LifecycleState::Ready,
    LifecycleState::AfterReady,
    LifecycleState::Initialized,
];

/// Drive a freshly allocated instance to `Initialized`.
pub(crate) fn run(instance: &Instance) -> Result<(), CoreError> {
    for state in PHASES {
        instance.advance(state);
        debug!(class = %instance.class_name(), id = instance.id(), %state, "lifecycle transition");
        match state.hook() {
            Some(Hook::Construct) => construct(instance)?,
            Some(hook) => run_phase(instance, hook)?,
            None => {}
        }
    }
    Ok(())
}

fn run_phase(instance: &Instance, hook: Hook) -> Result<(), CoreError> {
    let class = instance.class().clone();
    for link in class.hook_chain(hook) {
        (link.body)(instance).map_err(|err| CoreError::hook(&link.class, hook, err))?;
    }
    Ok(())
}

fn construct(instance: &Instance) -> Result<(), CoreError> {
    let class = instance.class().clone();
    for (index, link) in class.construct_chain().iter().enumerate() {
        instance.set_cursor(Some(index));
        let args = ConstructArgs::new(instance, index, &link.class, &link.unit.dependencies);
        let outcome = (link.unit.body)(instance, &args)
            .map_err(|err| CoreError::hook(&link.class, Hook::Construct, err));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                instance.set_cursor(None);
                return Err(err);
            }
        };
        match outcome {
            ConstructOutcome::Continue => {}
            ConstructOutcome::Override(overrides) => {
                debug!(
                    class = %link.class,
                    keys = ?overrides.keys().collect::<Vec<_>>(),
                    "construct override"
                );
                instance.merge_config(overrides);
            }
            ConstructOutcome::Halt => {
                debug!(class = %link.class, "construct chain halted");
                break;
            }
        }
    }
    instance.set_cursor(None);
    Ok(())
}
