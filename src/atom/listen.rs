//! The `listen` atom: an event pattern bound to a handler.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::{REQUEST_EVENT_PREFIX, SERVICE_EVENT_PREFIX};
use crate::origin::Origin;
use crate::pattern::{EventMatch, EventPattern};

use super::raw::{OneOrMany, RawListen};
use super::{class_key, parse_origins, required, Prioritized, DEFAULT_PRIORITY};

/// An immutable subscription.
///
/// # Examples
///
/// ```
/// use switchboard::{EventMatch, ListenAtom};
///
/// let atom = ListenAtom::builder()
///     .event("demo:*")
///     .class("DemoListener")
///     .method("on_demo")
///     .priority(0.9)
///     .build()
///     .unwrap();
/// assert_eq!(atom.class(), "DemoListener");
/// assert!(atom.origins().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawListen")]
pub struct ListenAtom {
    event: EventPattern,
    class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(rename = "origin")]
    origins: Vec<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    priority: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    right: Option<String>,
}

impl ListenAtom {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ListenAtomBuilder {
        ListenAtomBuilder::default()
    }

    /// The subscribed pattern.
    #[must_use]
    pub fn event(&self) -> &str {
        self.event.as_str()
    }

    /// Handler class key.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Handler method, if any.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Right required before the handler may run.
    #[must_use]
    pub fn right(&self) -> Option<&str> {
        self.right.as_deref()
    }

    /// Service name if this atom answers `system:service:<name>`.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.event()
            .strip_prefix(SERVICE_EVENT_PREFIX)
            .filter(|name| !name.is_empty())
    }
}

impl EventMatch for ListenAtom {
    fn pattern(&self) -> &EventPattern {
        &self.event
    }

    fn origins(&self) -> &[Origin] {
        &self.origins
    }
}

impl Prioritized for ListenAtom {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn sort_key(&self) -> &str {
        self.event.as_str()
    }
}

fn parse_right(raw: &RawListen) -> Result<Option<String>, ConfigError> {
    match &raw.right {
        None | Some(serde_json::Value::Null | serde_json::Value::Bool(false)) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::InvalidRight {
            context: serde_json::to_string(raw).unwrap_or_default(),
        }),
    }
}

impl TryFrom<RawListen> for ListenAtom {
    type Error = ConfigError;

    fn try_from(mut raw: RawListen) -> Result<Self, Self::Error> {
        if let Some(service) = raw.service.clone().filter(|s| !s.is_empty()) {
            raw.event = Some(format!("{SERVICE_EVENT_PREFIX}{service}"));
            raw.origin = Some(OneOrMany::One(Origin::Internal.as_str().to_string()));
        } else if let Some(request) = raw.request.clone().filter(|s| !s.is_empty()) {
            raw.event = Some(format!("{REQUEST_EVENT_PREFIX}{request}"));
            raw.origin = Some(OneOrMany::One(Origin::Remote.as_str().to_string()));
        }

        let right = parse_right(&raw)?;
        let class = required(raw.class.as_deref().map(|c| class_key(c).to_string()), "listen", "class", &raw)?;
        let event = required(raw.event.clone(), "listen", "event", &raw)?;
        let origins = parse_origins(raw.origin.take())?;

        Ok(Self {
            event: EventPattern::new(event)?,
            class,
            method: raw.method.filter(|m| !m.is_empty()),
            origins,
            description: raw.description,
            priority: raw.priority.unwrap_or(DEFAULT_PRIORITY),
            right,
        })
    }
}

/// Builder for programmatic listeners.
#[derive(Debug, Clone, Default)]
pub struct ListenAtomBuilder {
    raw: RawListen,
}

impl ListenAtomBuilder {
    /// Event pattern.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.raw.event = Some(event.into());
        self
    }

    /// Service sugar: answers `system:service:<name>` from internal callers.
    #[must_use]
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.raw.service = Some(name.into());
        self
    }

    /// Request sugar: answers `system:request:<name>` from remote callers.
    #[must_use]
    pub fn request(mut self, name: impl Into<String>) -> Self {
        self.raw.request = Some(name.into());
        self
    }

    /// Handler class key.
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.raw.class = Some(class.into());
        self
    }

    /// Handler method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.raw.method = Some(method.into());
        self
    }

    /// Restricts the origins.
    #[must_use]
    pub fn origins(mut self, origins: impl IntoIterator<Item = Origin>) -> Self {
        self.raw.origin = Some(OneOrMany::Many(
            origins.into_iter().map(|o| o.as_str().to_string()).collect(),
        ));
        self
    }

    /// Priority; higher runs first.
    #[must_use]
    pub fn priority(mut self, priority: f64) -> Self {
        self.raw.priority = Some(priority);
        self
    }

    /// Right required before the handler runs.
    #[must_use]
    pub fn right(mut self, right: impl Into<String>) -> Self {
        self.raw.right = Some(serde_json::Value::String(right.into()));
        self
    }

    /// Description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.raw.description = Some(description.into());
        self
    }

    /// Validates and builds the atom.
    ///
    /// # Errors
    /// Same validation as manifest loading.
    pub fn build(self) -> Result<ListenAtom, ConfigError> {
        ListenAtom::try_from(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::EventQuery;

    fn from_json(json: &str) -> Result<ListenAtom, ConfigError> {
        let raw: RawListen = serde_json::from_str(json).unwrap();
        ListenAtom::try_from(raw)
    }

    #[test]
    fn test_full_declaration() {
        let atom = from_json(
            r#"{"event":"demo:*","class":"\\Demo\\X","method":"m","priority":0.9,
                "origin":["remote","cli","remote"],"right":"admin","description":"demo"}"#,
        )
        .unwrap();
        assert_eq!(atom.event(), "demo:*");
        assert_eq!(atom.class(), "Demo\\X");
        assert_eq!(atom.method(), Some("m"));
        assert_eq!(atom.origins(), [Origin::Cli, Origin::Remote]);
        assert!((atom.priority() - 0.9).abs() < f64::EPSILON);
        assert_eq!(atom.right(), Some("admin"));
        assert_eq!(atom.description(), Some("demo"));
    }

    #[test]
    fn test_defaults() {
        let atom = from_json(r#"{"event":"a","class":"C"}"#).unwrap();
        assert!((atom.priority() - DEFAULT_PRIORITY).abs() < f64::EPSILON);
        assert!(atom.origins().is_empty());
        assert_eq!(atom.method(), None);
        assert_eq!(atom.right(), None);
    }

    #[test]
    fn test_service_sugar() {
        let atom = from_json(r#"{"service":"log","class":"LogService","origin":"remote"}"#).unwrap();
        assert_eq!(atom.event(), "system:service:log");
        assert_eq!(atom.origins(), [Origin::Internal]);
        assert_eq!(atom.service_name(), Some("log"));
    }

    #[test]
    fn test_request_sugar() {
        let atom = from_json(r#"{"request":"ping","class":"Ping"}"#).unwrap();
        assert_eq!(atom.event(), "system:request:ping");
        assert_eq!(atom.origins(), [Origin::Remote]);
        assert_eq!(atom.service_name(), None);
    }

    #[test]
    fn test_missing_class_is_error() {
        let err = from_json(r#"{"event":"a"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "class", .. }));
    }

    #[test]
    fn test_missing_event_is_error() {
        let err = from_json(r#"{"class":"C"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "event", .. }));
    }

    #[test]
    fn test_invalid_origin_is_error() {
        let err = from_json(r#"{"event":"a","class":"C","origin":["internal","web"]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin { ref value } if value == "web"));
    }

    #[test]
    fn test_right_forms() {
        assert_eq!(from_json(r#"{"event":"a","class":"C","right":false}"#).unwrap().right(), None);
        assert_eq!(from_json(r#"{"event":"a","class":"C","right":null}"#).unwrap().right(), None);
        assert_eq!(from_json(r#"{"event":"a","class":"C","right":""}"#).unwrap().right(), None);
        assert!(matches!(
            from_json(r#"{"event":"a","class":"C","right":true}"#).unwrap_err(),
            ConfigError::InvalidRight { .. }
        ));
        assert!(matches!(
            from_json(r#"{"event":"a","class":"C","right":["x"]}"#).unwrap_err(),
            ConfigError::InvalidRight { .. }
        ));
    }

    #[test]
    fn test_serde_round_trip_through_validation() {
        let atom = ListenAtom::builder()
            .event("demo:*")
            .class("X")
            .method("m")
            .origins([Origin::Remote])
            .right("admin")
            .build()
            .unwrap();
        let json = serde_json::to_string(&atom).unwrap();
        assert!(json.contains(r#""origin":["remote"]"#));
        let back: ListenAtom = serde_json::from_str(&json).unwrap();
        assert_eq!(back, atom);
    }

    #[test]
    fn test_cached_form_with_bad_origin_fails_to_load() {
        let res: Result<ListenAtom, _> =
            serde_json::from_str(r#"{"event":"a","class":"C","origin":["nowhere"]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_matches_query() {
        let atom = ListenAtom::builder()
            .event("demo:*")
            .class("X")
            .origins([Origin::Remote])
            .build()
            .unwrap();
        assert!(atom.matches(&EventQuery::new("demo:hello", Origin::Remote)));
        assert!(!atom.matches(&EventQuery::new("demo:hello", Origin::Cli)));
        assert!(atom.matches(&EventQuery::new("demo:hello", Origin::Any)));
        assert!(!atom.matches(&EventQuery::new("other:hello", Origin::Remote)));
    }
}
