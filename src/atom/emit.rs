//! The `emit` atom: a module's declaration that it produces an event.
//!
//! Emit atoms exist for introspection and documentation. The dispatcher
//! never consults them.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::origin::Origin;
use crate::pattern::{EventMatch, EventPattern};

use super::raw::RawEmit;
use super::{class_key, parse_origins, required, Prioritized, DEFAULT_PRIORITY};

/// An immutable producer declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmit")]
pub struct EmitAtom {
    event: EventPattern,
    class: String,
    #[serde(rename = "origin")]
    origins: Vec<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl EmitAtom {
    /// The declared event pattern.
    #[must_use]
    pub fn event(&self) -> &str {
        self.event.as_str()
    }

    /// Producer class key.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl EventMatch for EmitAtom {
    fn pattern(&self) -> &EventPattern {
        &self.event
    }

    fn origins(&self) -> &[Origin] {
        &self.origins
    }
}

// Emit declarations carry no priority; they order by event name.
impl Prioritized for EmitAtom {
    fn priority(&self) -> f64 {
        DEFAULT_PRIORITY
    }

    fn sort_key(&self) -> &str {
        self.event.as_str()
    }
}

impl TryFrom<RawEmit> for EmitAtom {
    type Error = ConfigError;

    fn try_from(mut raw: RawEmit) -> Result<Self, Self::Error> {
        let class = required(raw.class.as_deref().map(|c| class_key(c).to_string()), "emit", "class", &raw)?;
        let event = required(raw.event.clone(), "emit", "event", &raw)?;
        let origins = parse_origins(raw.origin.take())?;

        Ok(Self {
            event: EventPattern::new(event)?,
            class,
            origins,
            description: raw.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::EventQuery;

    fn from_json(json: &str) -> Result<EmitAtom, ConfigError> {
        let raw: RawEmit = serde_json::from_str(json).unwrap();
        EmitAtom::try_from(raw)
    }

    #[test]
    fn test_valid_emit() {
        let atom = from_json(r#"{"event":"cms:content:*","class":"\\Cms\\Page","origin":"internal"}"#).unwrap();
        assert_eq!(atom.event(), "cms:content:*");
        assert_eq!(atom.class(), "Cms\\Page");
        assert_eq!(atom.origins(), [Origin::Internal]);
        assert!(atom.matches(&EventQuery::new("cms:content:page", Origin::Internal)));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            from_json(r#"{"class":"C"}"#).unwrap_err(),
            ConfigError::MissingField { atom: "emit", field: "event", .. }
        ));
        assert!(matches!(
            from_json(r#"{"event":"a"}"#).unwrap_err(),
            ConfigError::MissingField { atom: "emit", field: "class", .. }
        ));
    }

    #[test]
    fn test_invalid_origin() {
        assert!(matches!(
            from_json(r#"{"event":"a","class":"C","origin":"web"}"#).unwrap_err(),
            ConfigError::InvalidOrigin { .. }
        ));
    }

    #[test]
    fn test_serialized_form_reloads() {
        let atom = from_json(r#"{"event":"a:b","class":"C","origin":["remote","cli"],"description":"d"}"#).unwrap();
        let json = serde_json::to_string(&atom).unwrap();
        assert_eq!(
            json,
            r#"{"event":"a:b","class":"C","origin":["cli","remote"],"description":"d"}"#
        );
        let back: EmitAtom = serde_json::from_str(&json).unwrap();
        assert_eq!(back, atom);
    }
}
