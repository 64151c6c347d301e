//! Event pattern matching.
//!
//! A pattern is an event type in which `*` stands for zero or more
//! characters. Matching is bidirectional: a listener pattern may match the
//! event type, or the event type (which may itself carry `*` during
//! discovery queries) may match the listener pattern.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::ConfigError;
use crate::origin::Origin;

/// The wildcard marker inside event patterns.
pub const WILDCARD: char = '*';

/// Builds the anchored expression for a wildcard pattern.
///
/// Every literal segment is escaped; each `*` becomes "any sequence".
fn wildcard_expression(pattern: &str) -> String {
    let body = pattern
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?s)^{body}$")
}

/// A compiled event pattern.
#[derive(Debug, Clone)]
pub struct EventPattern {
    raw: String,
    regex: Regex,
}

impl EventPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` if the expression exceeds the
    /// regex engine's size limits.
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let regex = Regex::new(&wildcard_expression(&raw)).map_err(|e| ConfigError::InvalidPattern {
            pattern: raw.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { raw, regex })
    }

    /// The pattern as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the pattern contains a wildcard.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.raw.contains(WILDCARD)
    }

    /// One-directional test: does this pattern match `name`?
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl PartialEq for EventPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Serialize for EventPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A prepared lookup: event type plus origin.
///
/// The reverse expression (event type used as a pattern) is compiled once
/// per query, and only when the type actually contains a wildcard. Without a
/// wildcard the reverse direction reduces to string equality.
#[derive(Debug, Clone)]
pub struct EventQuery<'a> {
    event_type: &'a str,
    origin: Origin,
    reverse: Option<Regex>,
}

impl<'a> EventQuery<'a> {
    /// Prepares a query.
    #[must_use]
    pub fn new(event_type: &'a str, origin: Origin) -> Self {
        let reverse = if event_type.contains(WILDCARD) {
            Regex::new(&wildcard_expression(event_type)).ok()
        } else {
            None
        };
        Self {
            event_type,
            origin,
            reverse,
        }
    }

    /// The queried event type.
    #[must_use]
    pub fn event_type(&self) -> &'a str {
        self.event_type
    }

    /// The queried origin.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    fn reverse_matches(&self, pattern: &str) -> bool {
        match &self.reverse {
            Some(regex) => regex.is_match(pattern),
            None => self.event_type == pattern,
        }
    }
}

/// Origin half of the match.
#[must_use]
pub fn origin_matches(origins: &[Origin], origin: Origin) -> bool {
    origin.is_any() || origins.is_empty() || origins.iter().any(|o| o.is_any() || *o == origin)
}

/// Capability shared by atoms that subscribe to or declare events.
pub trait EventMatch {
    /// The subscribed pattern.
    fn pattern(&self) -> &EventPattern;

    /// The normalized origin set.
    fn origins(&self) -> &[Origin];

    /// Full match: origin condition and bidirectional name condition.
    fn matches(&self, query: &EventQuery<'_>) -> bool {
        if !origin_matches(self.origins(), query.origin()) {
            return false;
        }
        let pattern = self.pattern();
        pattern.matches_name(query.event_type()) || query.reverse_matches(pattern.as_str())
    }
}

/// One-shot match of a raw pattern against an event.
///
/// Compiles both expressions; use [`EventMatch`] with prepared atoms on hot paths.
#[must_use]
pub fn matches(pattern: &str, origins: &[Origin], event_type: &str, origin: Origin) -> bool {
    struct Adhoc<'a> {
        pattern: EventPattern,
        origins: &'a [Origin],
    }

    impl EventMatch for Adhoc<'_> {
        fn pattern(&self) -> &EventPattern {
            &self.pattern
        }

        fn origins(&self) -> &[Origin] {
            self.origins
        }
    }

    let Ok(pattern) = EventPattern::new(pattern) else {
        return false;
    };
    Adhoc { pattern, origins }.matches(&EventQuery::new(event_type, origin))
}
