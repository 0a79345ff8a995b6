// config.rs — Serde-backed configuration surface
//
// Static lookup tables that map engine identifiers to target-language names
// and call shapes. A default set ships inside the binary; a JSON file given
// on the command line replaces it wholesale (missing fields fall back to
// empty tables, not to the built-in ones).
//
// Preconditions: JSON text matching the `Config` shape.
// Postconditions: a plain data value; see `registry` for the compiled form.
// Failure modes: I/O or JSON errors as `ConfigError`.
// Side effects: `Config::load` reads one file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const BUILTIN: &str = include_str!("../data/default_config.json");

/// Text placed around a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrap {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl Wrap {
    pub fn apply(&self, inner: &str) -> String {
        format!("{}{}{}", self.prefix, inner, self.suffix)
    }
}

/// One literal find/replace rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub find: String,
    pub replace: String,
}

/// One regular-expression rewrite rule. `replace` uses `${N}` group syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexReplacement {
    pub pattern: String,
    pub replace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Qualifier placed before the function name in the signature.
    pub class_name: String,
    /// Name used when neither the entry node nor a directive names the function.
    pub function_name: String,
    /// Inline single-use temporaries.
    pub flatten: bool,
    /// One level of indentation.
    pub indent: String,
    pub member_name_replacements: BTreeMap<String, String>,
    /// Owning type to static-call prefix, e.g. `KismetMathLibrary` to `UKismetMathLibrary`.
    pub member_parents: BTreeMap<String, String>,
    /// Keyed by `"<Callee> <PinName>"`.
    pub pin_wrappers: BTreeMap<String, Wrap>,
    pub struct_constructors: BTreeMap<String, Wrap>,
    /// Keyed by callee or macro name; see `template` for the syntax.
    pub call_templates: BTreeMap<String, String>,
    /// Struct type to (field-name fragment to accessor).
    pub sub_pin_getters: BTreeMap<String, BTreeMap<String, String>>,
    /// Keyed by `"<ReceiverType> <Member>"`.
    pub variable_getters: BTreeMap<String, String>,
    pub post_replacements: Vec<Replacement>,
    pub post_regex_replacements: Vec<RegexReplacement>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            class_name: "AMyActor".to_string(),
            function_name: "GeneratedFunction".to_string(),
            flatten: true,
            indent: "\t".to_string(),
            member_name_replacements: BTreeMap::new(),
            member_parents: BTreeMap::new(),
            pin_wrappers: BTreeMap::new(),
            struct_constructors: BTreeMap::new(),
            call_templates: BTreeMap::new(),
            sub_pin_getters: BTreeMap::new(),
            variable_getters: BTreeMap::new(),
            post_replacements: Vec::new(),
            post_regex_replacements: Vec::new(),
        }
    }
}

impl Config {
    /// The configuration compiled into the binary.
    pub fn builtin() -> Result<Config, ConfigError> {
        Config::from_json(BUILTIN)
    }

    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_json(&text)
    }

    /// Compact JSON with sorted map keys, stable across runs.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
