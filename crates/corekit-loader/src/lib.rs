//! # corekit-loader
//!
//! Class resolution, mixin composition and dependency injection on top of
//! the `corekit-check` validation kernel.
//!
//! ## Architecture
//!
//! ```text
//! ClassDefinition       ← Methods + hooks + declared construct dependencies
//!     │
//! ClassSource           ← Namespace-bound module table or resolver function
//!     │
//! Mixer                 ← Linearisation, method layering, hook chains, cache
//!     │
//! ClassLoader           ← Longest-prefix resolution, IoC injection
//!     │                   ↕
//!     │                 Container (statics, singletons, factories)
//!     │
//! Lifecycle             ← $beforeConstruct … $construct … $afterReady
//!     │
//! Instance              ← call / require / validate / throw
//! ```
//!
//! Instantiation resolves a class, fills its construct dependencies that
//! are missing from the explicit config from the container, and drives the
//! new instance through the lifecycle:
//!
//! ```no_run
//! use corekit_check::{Config, Instruction};
//! use corekit_loader::{ClassDefinition, ClassLoader, ConstructOutcome, ConstructUnit, ModuleTable};
//!
//! # fn main() -> Result<(), corekit_loader::CoreError> {
//! let loader = ClassLoader::new();
//! loader.container().register_static("greeting", "hello")?;
//! loader.register_namespace(
//!     "App",
//!     ModuleTable::new().with(
//!         "Greeter",
//!         ClassDefinition::class("App.Greeter")
//!             .construct(ConstructUnit::new(["greeting"], |this, args| {
//!                 let greeting = args.require("greeting", &Instruction::check("isString"))?;
//!                 this.set("greeting", greeting);
//!                 Ok(ConstructOutcome::Continue)
//!             }))
//!             .build()?,
//!     ),
//! )?;
//! let greeter = loader.instantiate("App.Greeter", Config::new())?;
//! assert_eq!(greeter.property("greeting"), Some("hello".into()));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod format;
pub mod hook;
pub mod instance;
pub mod lifecycle;
pub mod loader;
pub mod mixer;
pub mod source;

pub use config::LoaderConfig;
pub use container::{Container, EntryKind, FactoryContext};
pub use definition::{ClassBuilder, ClassDefinition, ClassKind, DefinitionSummary, Method, ROOT_CLASS};
pub use error::{CoreError, ThrownError};
pub use hook::{ConstructOutcome, ConstructUnit, Hook, MixinContext};
pub use instance::{ConstructArgs, Instance};
pub use lifecycle::LifecycleState;
pub use loader::{CORE_NAMESPACE, ClassLoader};
pub use mixer::{ComposedClass, CompositionKey, CompositionSummary, PrecedenceIssue};
pub use source::{ClassSource, ModuleTable};
