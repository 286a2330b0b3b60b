use corekit_check::{CheckRegistry, Instruction, Validator, Value};
use corekit_loader::LoaderConfig;
use serde::Serialize;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for unusable input: bad JSON, unknown checks, unreadable config.
pub const EXIT_USAGE: i32 = 2;

/// Install the stderr subscriber. `RUST_LOG` overrides the `warn` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(EXIT_USAGE);
}

pub fn load_config_or_exit(path: Option<&str>) -> LoaderConfig {
    let Some(path) = path else {
        return LoaderConfig::default();
    };
    let config = LoaderConfig::load(path).unwrap_or_else(|e| fail(e));
    debug!(path, "loaded configuration");
    config
}

/// Validator over the built-in checks, honouring `[validation]`.
pub fn validator(config: &LoaderConfig) -> Validator {
    Validator::new(Arc::new(CheckRegistry::with_builtins_preview(
        config.validation.preview_chars,
    )))
}

pub fn parse_value_or_exit(flag: &str, text: &str) -> Value {
    let json: Json = serde_json::from_str(text)
        .unwrap_or_else(|e| fail(format_args!("--{flag} is not valid JSON: {e}")));
    Value::from(json)
}

/// Bare check names are accepted without JSON quoting.
pub fn parse_instruction_or_exit(text: &str) -> Instruction {
    let json = serde_json::from_str::<Json>(text).unwrap_or_else(|_| Json::String(text.to_string()));
    Instruction::parse(&json).unwrap_or_else(|e| fail(e))
}

pub fn print_json<T: Serialize>(value: &T) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fail(format_args!("failed to render json: {e}")));
    println!("{rendered}");
}
