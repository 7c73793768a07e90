//! Transform configuration
//!
//! Options use the same camelCase keys a host compiler passes as plugin
//! options, so a JSON object such as `{"externalHelpers": true, "target": "es6"}`
//! deserializes directly.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default module that external helpers are imported from
pub const DEFAULT_HELPER_MODULE: &str = "babel-plugin-transform-async-to-promises/helpers";

/// Language level of synthesized continuations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Continuations are `function` expressions; `this`/`arguments` are captured
    #[default]
    Es5,
    /// Continuations are arrow functions
    Es6,
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es5" => Ok(Target::Es5),
            "es6" | "es2015" => Ok(Target::Es6),
            other => Err(format!("unknown target '{}', expected es5 or es6", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TransformOptions {
    /// Import helpers from `helper_module` instead of inlining their definitions
    pub external_helpers: bool,
    /// Hoist continuations that capture nothing local to top-level declarations
    pub hoist: bool,
    /// Expand the simple helpers into native `Promise` operations
    pub inline_helpers: bool,
    /// Prefer `0`/`1` flags and print minified output
    pub minify: bool,
    pub target: Target,
    pub helper_module: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            external_helpers: false,
            hoist: false,
            inline_helpers: false,
            minify: false,
            target: Target::Es5,
            helper_module: DEFAULT_HELPER_MODULE.to_string(),
        }
    }
}

impl TransformOptions {
    /// Parse options from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Continuations may be emitted as arrow functions
    pub fn arrow_continuations(&self) -> bool {
        self.target == Target::Es6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TransformOptions::default();
        assert!(!options.external_helpers);
        assert!(!options.hoist);
        assert_eq!(options.target, Target::Es5);
        assert_eq!(options.helper_module, DEFAULT_HELPER_MODULE);
    }

    #[test]
    fn test_from_json_camel_case() {
        let options =
            TransformOptions::from_json(r#"{"externalHelpers": true, "minify": true, "target": "es6"}"#)
                .unwrap();
        assert!(options.external_helpers);
        assert!(options.minify);
        assert!(options.arrow_continuations());
        assert!(!options.inline_helpers);
    }

    #[test]
    fn test_from_json_rejects_unknown_keys() {
        let err = TransformOptions::from_json(r#"{"externalHelper": true}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!("ES6".parse::<Target>().unwrap(), Target::Es6);
        assert!("es3".parse::<Target>().is_err());
    }
}
