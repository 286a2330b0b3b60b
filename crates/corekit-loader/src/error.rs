//! Error types for class resolution, composition, injection and lifecycle.

use crate::hook::Hook;
use corekit_check::{CheckError, Config, InstructionError, ValidationError};
use std::fmt;

/// Errors raised by the loader, the mixer, the container and instances.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // Resolution
    #[error("class not found: `{0}`")]
    ClassNotFound(String),

    #[error("namespace `{0}` is already registered")]
    DuplicateNamespace(String),

    #[error("invalid name `{0}`: expected dotted identifiers")]
    InvalidName(String),

    /// The base chain does not end at the root class.
    #[error("invalid base class for `{class}`: {reason}")]
    InvalidBaseClass { class: String, reason: String },

    // Composition
    #[error("unknown mixin `{mixin}` while composing `{composing}`")]
    UnknownMixin { mixin: String, composing: String },

    #[error("`{0}` is a class, not a mixin")]
    NotAMixin(String),

    #[error("`{0}` is a mixin and cannot be instantiated")]
    NotInstantiable(String),

    /// A reserved lifecycle hook name was used as an ordinary method.
    #[error("`{name}` on `{class}` is a reserved hook name")]
    ReservedHook { class: String, name: String },

    #[error("invalid definition `{class}`: {reason}")]
    InvalidDefinition { class: String, reason: String },

    /// A mixin hook asked for the composition it is running in.
    #[error("circular composition: `{0}` was requested while its mixin hooks ran")]
    CircularComposition(String),

    #[error("`{class}` has no method `{method}`")]
    UnknownMethod { class: String, method: String },

    // Dependencies
    /// A dependency was required before the construct unit that provides it
    /// ran.
    #[error(
        "dependency `{dependency}` required by `{required_by}` is provided by the later construct unit `{provided_by}`"
    )]
    DependencyPrecedence {
        dependency: String,
        required_by: String,
        provided_by: String,
    },

    #[error("`{class}` did not declare construct dependency `{dependency}`")]
    UndeclaredDependency { class: String, dependency: String },

    // Container
    #[error("circular dependency: singleton `{0}` requested itself during construction")]
    CircularDependency(String),

    #[error("container entry `{0}` is already registered")]
    DuplicateEntry(String),

    #[error("container entry `{0}` is not registered")]
    MissingEntry(String),

    #[error("container is not bound to a class loader")]
    ContainerUnbound,

    #[error("container is already bound to a class loader")]
    AlreadyBound,

    // Lifecycle
    /// A lifecycle or mixin hook failed.
    #[error("{hook} of `{class}` failed: {source}")]
    Hook {
        class: String,
        hook: Hook,
        #[source]
        source: Box<CoreError>,
    },

    /// An error raised by an instance through `throw`.
    #[error("{0}")]
    Thrown(Box<ThrownError>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Instruction(#[from] InstructionError),

    // Configuration
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    pub(crate) fn hook(class: impl Into<String>, hook: Hook, source: CoreError) -> Self {
        CoreError::Hook {
            class: class.into(),
            hook,
            source: Box::new(source),
        }
    }

    pub(crate) fn invalid_definition(class: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidDefinition {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Innermost error of a hook or thrown-error chain.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::Hook { source, .. } => source.root_cause(),
            CoreError::Thrown(thrown) => match &thrown.cause {
                Some(cause) => cause.root_cause(),
                None => self,
            },
            _ => self,
        }
    }

    /// The thrown error, if this is one.
    pub fn as_thrown(&self) -> Option<&ThrownError> {
        match self {
            CoreError::Thrown(thrown) => Some(thrown),
            _ => None,
        }
    }
}

/// Error raised by an instance, carrying who threw it and arbitrary context.
#[derive(Debug)]
pub struct ThrownError {
    /// Error kind name, e.g. `NotFoundError`.
    pub kind: String,
    pub message: String,
    /// Class name and id of the throwing instance.
    pub thrown_by: String,
    /// Caller-supplied info, including `$thrownBy`.
    pub info: Config,
    pub cause: Option<Box<CoreError>>,
}

impl fmt::Display for ThrownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (thrown by {})", self.kind, self.message, self.thrown_by)?;
        if let Some(cause) = &self.cause {
            write!(f, "; caused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ThrownError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
