//! The event value passed through dispatch.
//!
//! An event carries its type, origin and outcome (status + message), opaque
//! request/response payloads, and optionally:
//! - a [`Propagation`] value, making the event stoppable;
//! - an [`Authorization`], making it an authorize event.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{Authorization, AUTHORIZE_EVENT};
use crate::origin::Origin;
use crate::status::Status;

/// Opaque associative payload.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Prefix of the reserved service lookup events.
pub const SERVICE_EVENT_PREFIX: &str = "system:service:";

/// Prefix of the request sugar events.
pub const REQUEST_EVENT_PREFIX: &str = "system:request:";

/// Propagation flags embedded in stoppable events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Propagation {
    /// No further listener runs once set.
    pub stopped: bool,
    /// The caller should skip its default action.
    pub default_prevented: bool,
}

/// An event travelling through the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    uuid: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    origin: Origin,
    status: Status,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    propagation: Option<Propagation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authorization: Option<Authorization>,
    /// Request payload.
    #[serde(default)]
    pub request: Payload,
    /// Response payload.
    #[serde(default)]
    pub response: Payload,
}

impl Event {
    /// Creates a plain, non-stoppable event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, origin: Origin) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            event_type: event_type.into(),
            origin,
            status: Status::Undetermined,
            message: String::new(),
            propagation: None,
            authorization: None,
            request: Payload::new(),
            response: Payload::new(),
        }
    }

    /// Creates an event carrying a request payload.
    #[must_use]
    pub fn request(event_type: impl Into<String>, origin: Origin, request: Payload) -> Self {
        Self {
            request,
            ..Self::new(event_type, origin)
        }
    }

    /// Creates the synthetic lookup event for service `name`.
    #[must_use]
    pub fn service(name: &str) -> Self {
        Self::new(format!("{SERVICE_EVENT_PREFIX}{name}"), Origin::Internal)
    }

    /// Creates a stoppable authorize event asking for `rights`.
    #[must_use]
    pub fn authorize_request<I, R>(rights: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: fmt::Display,
    {
        Self {
            authorization: Some(Authorization::new(rights)),
            ..Self::new(AUTHORIZE_EVENT, Origin::Internal).stoppable()
        }
    }

    /// Makes the event stoppable.
    #[must_use]
    pub fn stoppable(mut self) -> Self {
        self.propagation.get_or_insert_with(Propagation::default);
        self
    }

    /// Unique id of this event instance.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The event type URI.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event origin.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Message travelling with the status.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sets status and message unless a final status is already recorded.
    ///
    /// Returns false when the call was ignored.
    pub fn set_status(&mut self, status: Status, message: impl Into<String>) -> bool {
        if self.status.is_final() {
            return false;
        }
        self.status = status;
        self.message = message.into();
        true
    }

    /// Returns true if listeners can stop this event.
    #[must_use]
    pub fn is_stoppable(&self) -> bool {
        self.propagation.is_some()
    }

    /// Stops propagation. Returns false for non-stoppable events.
    pub fn stop_propagation(&mut self) -> bool {
        match self.propagation.as_mut() {
            Some(p) => {
                p.stopped = true;
                true
            }
            None => false,
        }
    }

    /// Returns true once propagation has been stopped.
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation.is_some_and(|p| p.stopped)
    }

    /// Prevents the caller's default action. Returns false for non-stoppable events.
    pub fn prevent_default(&mut self) -> bool {
        match self.propagation.as_mut() {
            Some(p) => {
                p.default_prevented = true;
                true
            }
            None => false,
        }
    }

    /// Returns true if the default action was prevented.
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.propagation.is_some_and(|p| p.default_prevented)
    }

    /// Returns true for authorize events.
    #[must_use]
    pub fn is_authorize_event(&self) -> bool {
        self.authorization.is_some()
    }

    /// The right sets of an authorize event.
    #[must_use]
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Authorizes `right`; stops propagation once every right is satisfied.
    ///
    /// Returns false if this is not an authorize event.
    pub fn authorize(&mut self, right: impl fmt::Display) -> bool {
        let Some(auth) = self.authorization.as_mut() else {
            return false;
        };
        auth.grant(&right.to_string());
        if auth.is_complete() {
            self.stop_propagation();
        }
        true
    }

    /// Returns true if `right` was authorized on this authorize event.
    #[must_use]
    pub fn is_authorized(&self, right: impl fmt::Display) -> bool {
        self.authorization
            .as_ref()
            .is_some_and(|a| a.is_authorized(&right.to_string()))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.event_type, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_undetermined() {
        let e = Event::new("demo:hello", Origin::Cli);
        assert_eq!(e.status(), Status::Undetermined);
        assert_eq!(e.message(), "");
        assert!(!e.is_stoppable());
        assert!(!e.is_authorize_event());
        assert!(!e.uuid().is_nil());
    }

    #[test]
    fn test_status_precedence_law() {
        for first in Status::ALL {
            for second in Status::ALL {
                let mut e = Event::new("x", Origin::Internal);
                e.set_status(first, "first");
                let applied = e.set_status(second, "second");

                if first.is_final() {
                    assert!(!applied);
                    assert_eq!(e.status(), first);
                    assert_eq!(e.message(), "first");
                } else {
                    assert!(applied);
                    assert_eq!(e.status(), second);
                    assert_eq!(e.message(), "second");
                }
            }
        }
    }

    #[test]
    fn test_ok_can_be_overwritten_by_error() {
        let mut e = Event::new("x", Origin::Internal);
        e.set_status(Status::Ok, "fine");
        assert!(e.set_status(Status::Error, "broken"));
        assert!(!e.set_status(Status::Ok, "fine again"));
        assert_eq!(e.status(), Status::Error);
        assert_eq!(e.message(), "broken");
    }

    #[test]
    fn test_non_stoppable_ignores_stop() {
        let mut e = Event::new("x", Origin::Internal);
        assert!(!e.stop_propagation());
        assert!(!e.is_propagation_stopped());
        assert!(!e.prevent_default());
    }

    #[test]
    fn test_stoppable_flags_are_independent() {
        let mut e = Event::new("x", Origin::Internal).stoppable();
        assert!(e.prevent_default());
        assert!(e.is_default_prevented());
        assert!(!e.is_propagation_stopped());
        assert!(e.stop_propagation());
        assert!(e.is_propagation_stopped());
    }

    #[test]
    fn test_authorize_partial_then_complete() {
        let mut e = Event::authorize_request(["A", "B"]);
        assert_eq!(e.event_type(), AUTHORIZE_EVENT);
        assert_eq!(e.origin(), Origin::Internal);

        assert!(e.authorize("A"));
        assert!(e.is_authorized("A"));
        assert!(!e.is_authorized("B"));
        assert!(!e.is_propagation_stopped());

        e.authorize("B");
        assert!(e.is_authorized("B"));
        assert!(e.is_propagation_stopped());
    }

    #[test]
    fn test_authorize_on_plain_event_is_rejected() {
        let mut e = Event::new("x", Origin::Internal);
        assert!(!e.authorize("A"));
        assert!(!e.is_authorized("A"));
    }

    #[test]
    fn test_service_event_shape() {
        let e = Event::service("log");
        assert_eq!(e.event_type(), "system:service:log");
        assert_eq!(e.origin(), Origin::Internal);
    }

    #[test]
    fn test_serializes_type_and_payloads() {
        let mut request = Payload::new();
        request.insert("name".to_string(), serde_json::json!("world"));
        let e = Event::request("demo:hello", Origin::Remote, request);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "demo:hello");
        assert_eq!(json["origin"], "remote");
        assert_eq!(json["status"], "undetermined");
        assert_eq!(json["request"]["name"], "world");
        assert!(json.get("propagation").is_none());
    }
}
