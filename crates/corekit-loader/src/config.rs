//! Loader configuration, read from TOML.
//!
//! ```toml
//! [loader]
//! composition_cache = true
//!
//! [validation]
//! preview_chars = 32
//!
//! [ioc]
//! app_name = "demo"
//! retries = 3
//! ```
//!
//! Every section is optional. `[ioc]` entries seed the container with
//! static values.

use crate::error::CoreError;
use corekit_check::Config;
use corekit_check::builtin::DEFAULT_PREVIEW_CHARS;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub loader: LoaderSection,
    pub validation: ValidationSection,
    pub ioc: BTreeMap<String, Json>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSection {
    /// Memoise compositions per (base, mixins).
    pub composition_cache: bool,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            composition_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    /// Characters of a string shown in value descriptions.
    pub preview_chars: usize,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl LoaderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// `[ioc]` as container statics.
    pub fn ioc_statics(&self) -> Config {
        self.ioc
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corekit_check::Value;

    #[test]
    fn empty_documents_use_defaults() {
        let config = LoaderConfig::from_toml_str("").expect("parse");
        assert_eq!(config, LoaderConfig::default());
        assert!(config.loader.composition_cache);
        assert_eq!(config.validation.preview_chars, 32);
    }

    #[test]
    fn sections_are_read() {
        let config = LoaderConfig::from_toml_str(
            r#"
            [loader]
            composition_cache = false

            [validation]
            preview_chars = 8

            [ioc]
            app_name = "demo"
            retries = 3
            "#,
        )
        .expect("parse");
        assert!(!config.loader.composition_cache);
        assert_eq!(config.validation.preview_chars, 8);
        let statics = config.ioc_statics();
        assert_eq!(statics.get("app_name"), Some(&Value::from("demo")));
        assert_eq!(statics.get("retries"), Some(&Value::from(3)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            LoaderConfig::from_toml_str("[loader]\ncache = true\n"),
            Err(CoreError::Toml(_))
        ));
    }

    #[test]
    fn missing_files_name_the_path() {
        let err = LoaderConfig::load("/nonexistent/corekit.toml").expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/corekit.toml"));
    }
}
