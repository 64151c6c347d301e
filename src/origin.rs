//! Event origins.
//!
//! An origin classifies the channel an event arrived through. Listeners
//! restrict themselves to a set of origins; the wildcard origin only ever
//! appears on the matching side (in a listener's origin set, or on a
//! discovery query), never on a dispatched event.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// The channel an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Raised by code running inside the process.
    Internal,
    /// Raised by a remote client (HTTP gate).
    Remote,
    /// Raised from the command line gate.
    Cli,
    /// Reserved for application-specific channels.
    Custom,
    /// Matches every origin. Only valid when matching.
    Any,
}

impl Origin {
    /// All origins, in declaration order.
    pub const ALL: [Self; 5] = [Self::Internal, Self::Remote, Self::Cli, Self::Custom, Self::Any];

    /// Returns the literal used in manifest fragments and cache files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Remote => "remote",
            Self::Cli => "cli",
            Self::Custom => "custom",
            Self::Any => "*",
        }
    }

    /// Returns true for the wildcard origin.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Normalizes a list of origins: sorted by literal, duplicates removed.
    #[must_use]
    pub fn normalize(mut origins: Vec<Self>) -> Vec<Self> {
        origins.sort();
        origins.dedup();
        origins
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "remote" => Ok(Self::Remote),
            "cli" => Ok(Self::Cli),
            "custom" => Ok(Self::Custom),
            "*" | "any" => Ok(Self::Any),
            other => Err(ConfigError::InvalidOrigin {
                value: other.to_string(),
            }),
        }
    }
}

// Origin sets are sorted by their literal so cache output stays stable.
impl Ord for Origin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Origin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_literals() {
        assert_eq!("internal".parse::<Origin>().unwrap(), Origin::Internal);
        assert_eq!("remote".parse::<Origin>().unwrap(), Origin::Remote);
        assert_eq!("cli".parse::<Origin>().unwrap(), Origin::Cli);
        assert_eq!("custom".parse::<Origin>().unwrap(), Origin::Custom);
        assert_eq!("*".parse::<Origin>().unwrap(), Origin::Any);
        assert_eq!("any".parse::<Origin>().unwrap(), Origin::Any);
    }

    #[test]
    fn test_parse_unknown_literal_fails() {
        let err = "Remote".parse::<Origin>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin { ref value } if value == "Remote"));
    }

    #[test]
    fn test_normalize_sorts_by_literal_and_dedups() {
        let origins = Origin::normalize(vec![
            Origin::Remote,
            Origin::Internal,
            Origin::Any,
            Origin::Remote,
            Origin::Cli,
        ]);
        assert_eq!(origins, vec![Origin::Any, Origin::Cli, Origin::Internal, Origin::Remote]);
    }

    #[test]
    fn test_serde_uses_literals() {
        let json = serde_json::to_string(&vec![Origin::Any, Origin::Cli]).unwrap();
        assert_eq!(json, r#"["*","cli"]"#);

        let back: Vec<Origin> = serde_json::from_str(r#"["any","internal"]"#).unwrap();
        assert_eq!(back, vec![Origin::Any, Origin::Internal]);

        assert!(serde_json::from_str::<Origin>(r#""nowhere""#).is_err());
    }
}
