// registry.rs — Compiled lookup tables
//
// Wraps a `Config` with its templates lexed and its rewrite patterns
// compiled, so every bad entry is reported before compilation starts and
// the emitter only does map lookups.
//
// Preconditions: a deserialized `Config`.
// Postconditions: every template parsed, every regex compiled.
// Failure modes: `ConfigError::Template` / `ConfigError::Regex`.
// Side effects: none.

use std::collections::HashMap;

use regex::Regex;

use crate::config::{Config, Wrap};
use crate::error::ConfigError;
use crate::template::CallTemplate;

#[derive(Debug, Clone)]
pub struct Registry {
    config: Config,
    templates: HashMap<String, CallTemplate>,
    rewrites: Vec<(Regex, String)>,
}

impl Registry {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let mut templates = HashMap::new();
        for (name, source) in &config.call_templates {
            let template = CallTemplate::parse(source).map_err(|message| ConfigError::Template {
                name: name.clone(),
                message,
            })?;
            templates.insert(name.clone(), template);
        }

        let mut rewrites = Vec::new();
        for rule in &config.post_regex_replacements {
            let regex = Regex::new(&rule.pattern).map_err(|source| ConfigError::Regex {
                pattern: rule.pattern.clone(),
                source,
            })?;
            rewrites.push((regex, rule.replace.clone()));
        }

        Ok(Registry {
            config,
            templates,
            rewrites,
        })
    }

    /// Registry over the built-in configuration.
    pub fn builtin() -> Result<Self, ConfigError> {
        Registry::new(Config::builtin()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Apply the configured member-name remap (e.g. `K2_SetWorldLocation`).
    pub fn member_name(&self, name: &str) -> String {
        self.config
            .member_name_replacements
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Static-call prefix for an owning type, e.g. `UKismetMathLibrary`.
    pub fn parent_type(&self, member_parent: &str) -> Option<&str> {
        self.config
            .member_parents
            .get(member_parent)
            .map(String::as_str)
    }

    pub fn pin_wrapper(&self, callee: &str, pin: &str) -> Option<&Wrap> {
        self.config.pin_wrappers.get(&format!("{callee} {pin}"))
    }

    pub fn struct_ctor(&self, ty: &str) -> Option<&Wrap> {
        self.config.struct_constructors.get(ty)
    }

    pub fn template(&self, callee: &str) -> Option<&CallTemplate> {
        self.templates.get(callee)
    }

    /// Accessor for a decomposed field of `parent_ty` whose pin name
    /// contains a configured fragment.
    pub fn sub_pin_getter(&self, parent_ty: &str, field_pin: &str) -> Option<&str> {
        self.config
            .sub_pin_getters
            .get(parent_ty)?
            .iter()
            .find(|(fragment, _)| field_pin.contains(fragment.as_str()))
            .map(|(_, accessor)| accessor.as_str())
    }

    pub fn variable_getter(&self, receiver_ty: &str, member: &str) -> Option<&str> {
        self.config
            .variable_getters
            .get(&format!("{receiver_ty} {member}"))
            .map(String::as_str)
    }

    /// Literal replacements in order, then regex rewrites in order.
    pub fn apply_post_replacements(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.config.post_replacements {
            if !rule.find.is_empty() {
                out = out.replace(&rule.find, &rule.replace);
            }
        }
        for (regex, replace) in &self.rewrites {
            out = regex.replace_all(&out, replace.as_str()).into_owned();
        }
        out
    }

    /// Compact JSON of the configuration, for fingerprinting.
    pub fn canonical_json(&self) -> String {
        self.config.canonical_json()
    }
}
