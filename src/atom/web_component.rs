//! The `webComponents` atom: a custom element tag and the script defining it.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::raw::RawWebComponent;
use super::{required, Prioritized, DEFAULT_PRIORITY};

/// An immutable web component registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWebComponent")]
pub struct WebComponentAtom {
    tag: String,
    module: String,
    priority: f64,
    description: String,
}

impl WebComponentAtom {
    /// Custom element tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Public path of the defining script.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Human description; empty when not declared.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rewrites a module-relative script path to its public location.
    ///
    /// Absolute paths are kept; `x.js` declared by module `acme` becomes
    /// `/dist/acme/x.js`.
    pub(crate) fn rebase(raw: &mut RawWebComponent, module_name: &str) {
        if let Some(module) = raw.module.as_mut() {
            if !module.is_empty() && !module.starts_with('/') {
                *module = format!("/dist/{module_name}/{module}");
            }
        }
    }
}

impl Prioritized for WebComponentAtom {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn sort_key(&self) -> &str {
        &self.tag
    }
}

impl TryFrom<RawWebComponent> for WebComponentAtom {
    type Error = ConfigError;

    fn try_from(raw: RawWebComponent) -> Result<Self, Self::Error> {
        let tag = required(raw.tag.clone(), "webComponents", "tag", &raw)?;
        let module = required(raw.module.clone(), "webComponents", "module", &raw)?;

        Ok(Self {
            tag,
            module,
            priority: raw.priority.unwrap_or(DEFAULT_PRIORITY),
            description: raw.description.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let raw: RawWebComponent = serde_json::from_str(r#"{"tag":"wiki-toc","module":"/dist/wiki/toc.js"}"#).unwrap();
        let atom = WebComponentAtom::try_from(raw).unwrap();
        assert_eq!(atom.tag(), "wiki-toc");
        assert_eq!(atom.description(), "");
        assert!((atom.priority() - DEFAULT_PRIORITY).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_tag() {
        let raw: RawWebComponent = serde_json::from_str(r#"{"module":"x.js"}"#).unwrap();
        assert!(matches!(
            WebComponentAtom::try_from(raw).unwrap_err(),
            ConfigError::MissingField { field: "tag", .. }
        ));
    }

    #[test]
    fn test_rebase_relative_module() {
        let mut raw: RawWebComponent = serde_json::from_str(r#"{"tag":"a-b","module":"web-components/a-b.js"}"#).unwrap();
        WebComponentAtom::rebase(&mut raw, "acme");
        assert_eq!(raw.module.as_deref(), Some("/dist/acme/web-components/a-b.js"));

        let mut abs: RawWebComponent = serde_json::from_str(r#"{"tag":"a-b","module":"/lib/a-b.js"}"#).unwrap();
        WebComponentAtom::rebase(&mut abs, "acme");
        assert_eq!(abs.module.as_deref(), Some("/lib/a-b.js"));
    }
}
