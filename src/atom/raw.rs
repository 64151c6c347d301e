//! Raw declaration records as they appear in manifest fragments.
//!
//! Every field is optional here; the atom constructors decide what is
//! required. Unknown keys (including `#` comments) are ignored.

use serde::{Deserialize, Serialize};

/// A value that may be written either as one string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// `"origin": "remote"`
    One(String),
    /// `"origin": ["remote", "cli"]`
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flattens into a list; empty strings are dropped.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) if s.is_empty() => Vec::new(),
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// Raw `listen` entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Sugar for `system:service:<name>` with origin `internal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Sugar for `system:request:<name>` with origin `remote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// A string, or `false`/`null` for none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw `emit` entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEmit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw `webComponents` entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWebComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_accepts_string_or_list() {
        let one: RawListen = serde_json::from_str(r#"{"origin":"remote"}"#).unwrap();
        assert_eq!(one.origin.unwrap().into_vec(), vec!["remote".to_string()]);

        let many: RawListen = serde_json::from_str(r#"{"origin":["cli","internal"]}"#).unwrap();
        assert_eq!(many.origin.unwrap().into_vec().len(), 2);

        let empty: RawListen = serde_json::from_str(r#"{"origin":""}"#).unwrap();
        assert!(empty.origin.unwrap().into_vec().is_empty());
    }

    #[test]
    fn test_unknown_and_comment_keys_are_ignored() {
        let raw: RawEmit =
            serde_json::from_str(r##"{"# note":"x","event":"a:b","class":"C","extra":1}"##).unwrap();
        assert_eq!(raw.event.as_deref(), Some("a:b"));
        assert_eq!(raw.class.as_deref(), Some("C"));
    }

    #[test]
    fn test_right_keeps_raw_value() {
        let raw: RawListen = serde_json::from_str(r#"{"right":false}"#).unwrap();
        assert_eq!(raw.right, Some(serde_json::Value::Bool(false)));
    }
}
