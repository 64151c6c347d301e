//! Handler capabilities and the registration-time class table.
//!
//! Manifests name handlers by a class key. The application registers one
//! factory per key before building a [`Runtime`](crate::Runtime); the runtime
//! creates each instance once, on first use, and shares it between dispatch
//! and service lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::atom::class_key;
use crate::error::{ConfigError, HandlerResult};
use crate::event::Event;
use crate::runtime::Runtime;

/// Something that handles dispatched events.
///
/// `method` is the method named by the listen atom, if any. A listener that
/// needs mutable state uses interior mutability; it may re-enter the
/// runtime.
pub trait Listener: Send + Sync + 'static {
    /// Handles one event.
    ///
    /// # Errors
    /// Any error is recorded on the event as an `error` status and logged;
    /// dispatch continues with the next listener.
    fn handle(&self, rt: &Runtime, method: Option<&str>, event: &mut Event) -> HandlerResult;
}

/// Marker for listeners that may be bound to `system:service:<name>`.
pub trait Service: Listener {}

/// Whether a registered class is a plain listener or a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Receives events only.
    Listener,
    /// Can also be looked up by service name.
    Service,
}

/// A created handler: the dispatch view plus the concrete value for typed access.
#[derive(Clone)]
pub struct Instance {
    listener: Arc<dyn Listener>,
    any: Arc<dyn Any + Send + Sync>,
    kind: HandlerKind,
}

impl Instance {
    /// Wraps a plain listener.
    pub fn listener<T: Listener>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            listener: value.clone(),
            any: value,
            kind: HandlerKind::Listener,
        }
    }

    /// Wraps a service.
    pub fn service<T: Service>(value: T) -> Self {
        Self::shared_service(Arc::new(value))
    }

    /// Wraps an already shared service.
    pub fn shared_service<T: Service>(value: Arc<T>) -> Self {
        Self {
            listener: value.clone(),
            any: value,
            kind: HandlerKind::Service,
        }
    }

    /// The dispatch view.
    #[must_use]
    pub fn as_listener(&self) -> Arc<dyn Listener> {
        Arc::clone(&self.listener)
    }

    /// Registered kind.
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Returns true for services.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.kind == HandlerKind::Service
    }

    /// The concrete value, if it is a `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.any).downcast::<T>().ok()
    }

    /// Returns true if both instances wrap the same value.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("kind", &self.kind).finish_non_exhaustive()
    }
}

type Factory = Box<dyn Fn() -> Instance + Send + Sync>;

struct Registration {
    kind: HandlerKind,
    factory: Factory,
}

/// Class key to factory table.
///
/// ```
/// use switchboard::{Event, HandlerRegistry, HandlerResult, Listener, Runtime};
///
/// struct Hello;
///
/// impl Listener for Hello {
///     fn handle(&self, _rt: &Runtime, _method: Option<&str>, event: &mut Event) -> HandlerResult {
///         event.response.insert("hello".into(), "world".into());
///         Ok(())
///     }
/// }
///
/// let handlers = HandlerRegistry::new().listener("Hello", || Hello).unwrap();
/// assert!(handlers.contains("\\Hello"));
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<String, Registration>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, class: &str, kind: HandlerKind, factory: Factory) -> Result<Self, ConfigError> {
        let key = class_key(class).to_string();
        if key.is_empty() {
            return Err(ConfigError::InvalidConfig {
                reason: "handler class key must not be empty".to_string(),
            });
        }
        if self.entries.contains_key(&key) {
            return Err(ConfigError::DuplicateHandler { class: key });
        }
        self.entries.insert(key, Registration { kind, factory });
        Ok(self)
    }

    /// Registers a listener class.
    ///
    /// # Errors
    /// `ConfigError::DuplicateHandler` if the key is taken,
    /// `ConfigError::InvalidConfig` if it is empty.
    pub fn listener<T, F>(self, class: &str, factory: F) -> Result<Self, ConfigError>
    where
        T: Listener,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(class, HandlerKind::Listener, Box::new(move || Instance::listener(factory())))
    }

    /// Registers a service class.
    ///
    /// # Errors
    /// `ConfigError::DuplicateHandler` if the key is taken.
    pub fn service<T, F>(self, class: &str, factory: F) -> Result<Self, ConfigError>
    where
        T: Service,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(class, HandlerKind::Service, Box::new(move || Instance::service(factory())))
    }

    /// Returns true if `class` is registered.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.entries.contains_key(class_key(class))
    }

    /// The kind registered for `class`.
    #[must_use]
    pub fn kind(&self, class: &str) -> Option<HandlerKind> {
        self.entries.get(class_key(class)).map(|r| r.kind)
    }

    /// Registered class keys, unordered.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a fresh instance of `class`.
    ///
    /// # Errors
    /// `ConfigError::UnknownHandler` if nothing is registered under the key.
    pub fn instantiate(&self, class: &str) -> Result<Instance, ConfigError> {
        self.entries
            .get(class_key(class))
            .map(|r| (r.factory)())
            .ok_or_else(|| ConfigError::UnknownHandler {
                class: class_key(class).to_string(),
            })
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<_> = self.classes().collect();
        classes.sort_unstable();
        f.debug_struct("HandlerRegistry").field("classes", &classes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Listener for Plain {
        fn handle(&self, _rt: &Runtime, _method: Option<&str>, _event: &mut Event) -> HandlerResult {
            Ok(())
        }
    }

    struct Svc(u32);

    impl Listener for Svc {
        fn handle(&self, _rt: &Runtime, _method: Option<&str>, _event: &mut Event) -> HandlerResult {
            Ok(())
        }
    }

    impl Service for Svc {}

    #[test]
    fn test_register_and_instantiate() {
        let registry = HandlerRegistry::new()
            .listener("Plain", || Plain)
            .unwrap()
            .service("\\Acme\\Svc", || Svc(7))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.kind("Plain"), Some(HandlerKind::Listener));
        assert_eq!(registry.kind("Acme\\Svc"), Some(HandlerKind::Service));

        let svc = registry.instantiate("Acme\\Svc").unwrap();
        assert!(svc.is_service());
        assert_eq!(svc.downcast::<Svc>().unwrap().0, 7);
        assert!(svc.downcast::<Plain>().is_none());
    }

    #[test]
    fn test_each_instantiation_is_fresh() {
        let registry = HandlerRegistry::new().listener("Plain", || Plain).unwrap();
        let a = registry.instantiate("Plain").unwrap();
        let b = registry.instantiate("Plain").unwrap();
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn test_duplicate_registration() {
        let err = HandlerRegistry::new()
            .listener("Plain", || Plain)
            .unwrap()
            .listener("\\Plain", || Plain)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateHandler { ref class } if class == "Plain"));
    }

    #[test]
    fn test_unknown_class() {
        let err = HandlerRegistry::new().instantiate("Missing").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHandler { .. }));
    }
}
