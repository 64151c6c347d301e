//! The runtime: dispatcher, service locator, and gate entry point.
//!
//! A [`Runtime`] owns a [`Manifest`] and a [`HandlerRegistry`]. Building one
//! verifies that every listen atom names a registered class and that every
//! service declaration binds a [`Service`](crate::Service).
//!
//! Dispatch is synchronous. No lock is held while a handler runs, so a
//! handler may dispatch further events, look up services, or add listeners.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::atom::ListenAtom;
use crate::error::{poisoned, ConfigError, DispatchError, SwitchboardError, SwitchboardResult};
use crate::event::{Event, Payload};
use crate::handler::{HandlerKind, HandlerRegistry, Instance, Listener, Service};
use crate::manifest::Manifest;
use crate::origin::Origin;
use crate::status::Status;

/// What a gate reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Final status.
    pub status: Status,
    /// Final status message.
    pub message: String,
    /// Response payload.
    pub response: Payload,
}

impl From<Event> for DispatchOutcome {
    fn from(event: Event) -> Self {
        Self {
            status: event.status(),
            message: event.message().to_string(),
            response: event.response,
        }
    }
}

/// Routing table plus handler instances.
#[derive(Debug)]
pub struct Runtime {
    manifest: Manifest,
    handlers: HandlerRegistry,
    instances: Mutex<HashMap<String, Instance>>,
    services: Mutex<HashMap<String, Instance>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}

impl Runtime {
    /// Builds a runtime after checking every listen atom against `handlers`.
    ///
    /// # Errors
    /// `ConfigError::UnknownHandler` or `ConfigError::NotAService` for a bad
    /// binding; `CacheError` if the listen section cannot be loaded.
    pub fn new(manifest: Manifest, handlers: HandlerRegistry) -> SwitchboardResult<Self> {
        for atom in manifest.listen_atoms()?.iter() {
            check_binding(&handlers, atom)?;
        }
        debug!(handlers = handlers.len(), "runtime ready");

        Ok(Self {
            manifest,
            handlers,
            instances: Mutex::new(HashMap::new()),
            services: Mutex::new(HashMap::new()),
        })
    }

    /// The routing table.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The registered handler classes.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The shared instance for `class`, created on first use.
    fn instance(&self, class: &str) -> SwitchboardResult<Instance> {
        if let Some(instance) = self.instances.lock().map_err(|_| poisoned("instances"))?.get(class) {
            return Ok(instance.clone());
        }

        let created = self.handlers.instantiate(class)?;
        let mut instances = self.instances.lock().map_err(|_| poisoned("instances"))?;
        Ok(instances.entry(class.to_string()).or_insert(created).clone())
    }

    /// Runs every matching listener in priority order.
    ///
    /// Listener failures and panics become an `error` status on the event.
    /// A listener whose right is refused sets `unauthorized` and is skipped.
    ///
    /// # Errors
    /// `DispatchError::WildcardOrigin` for an event with the `*` origin;
    /// configuration or cache errors from the routing table.
    pub fn dispatch<'e>(&self, event: &'e mut Event) -> SwitchboardResult<&'e mut Event> {
        if event.origin().is_any() {
            return Err(DispatchError::WildcardOrigin {
                event_type: event.event_type().to_string(),
            }
            .into());
        }

        let atoms = self.manifest.listeners(event.event_type(), event.origin(), 0)?;
        debug!(
            event = %event.event_type(),
            origin = %event.origin(),
            listeners = atoms.len(),
            "dispatching"
        );

        // The table may have been rebuilt since the bindings were checked.
        if let Some(atom) = atoms.iter().find(|atom| !self.handlers.contains(atom.class())) {
            return Err(ConfigError::UnknownHandler {
                class: atom.class().to_string(),
            }
            .into());
        }

        for atom in &atoms {
            if event.is_propagation_stopped() {
                debug!(event = %event.event_type(), "propagation stopped");
                break;
            }

            if let Some(right) = atom.right() {
                if !event.is_authorize_event() && !self.authorize(right)? {
                    debug!(event = %event.event_type(), class = %atom.class(), right, "listener not authorized");
                    event.set_status(Status::Unauthorized, "Unauthorized");
                    continue;
                }
            }

            let instance = self.instance(atom.class())?;
            self.invoke(&instance, atom, event);
        }

        Ok(event)
    }

    fn invoke(&self, instance: &Instance, atom: &ListenAtom, event: &mut Event) {
        let listener = instance.as_listener();
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener.handle(self, atom.method(), event)));

        let message = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        warn!(
            event = %event.event_type(),
            class = %atom.class(),
            method = atom.method().unwrap_or("-"),
            error = %message,
            "listener failed"
        );
        event.set_status(Status::Error, message);
    }

    /// Asks the authorization providers whether `right` is granted.
    ///
    /// # Errors
    /// Propagates dispatch errors of the nested authorize event.
    pub fn authorize(&self, right: &str) -> SwitchboardResult<bool> {
        let mut event = Event::authorize_request([right]);
        self.dispatch(&mut event)?;
        Ok(event.is_authorized(right))
    }

    /// Dispatches a request from a gate and reports the outcome.
    ///
    /// # Errors
    /// Same as [`dispatch`](Self::dispatch); listener failures are part of
    /// the outcome.
    pub fn dispatch_request(
        &self,
        event_type: &str,
        origin: Origin,
        request: Payload,
    ) -> SwitchboardResult<DispatchOutcome> {
        let mut event = Event::request(event_type, origin, request);
        self.dispatch(&mut event)?;
        Ok(event.into())
    }

    fn service_instance(&self, name: &str) -> SwitchboardResult<Instance> {
        if let Some(instance) = self.services.lock().map_err(|_| poisoned("services"))?.get(name) {
            return Ok(instance.clone());
        }

        let mut event = Event::service(name);
        let atom = self
            .manifest
            .first_listener(event.event_type(), Origin::Internal)?
            .ok_or_else(|| ConfigError::ServiceNotDeclared { name: name.to_string() })?;

        let instance = self.instance(atom.class())?;
        if !instance.is_service() {
            return Err(ConfigError::NotAService {
                class: atom.class().to_string(),
            }
            .into());
        }

        {
            let mut services = self.services.lock().map_err(|_| poisoned("services"))?;
            if let Some(existing) = services.get(name) {
                return Ok(existing.clone());
            }
            // Registered before init so the init method can look itself up.
            services.insert(name.to_string(), instance.clone());
        }

        if let Some(method) = atom.method() {
            debug!(service = name, class = %atom.class(), method, "initializing service");
            let listener = instance.as_listener();
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.handle(self, Some(method), &mut event)));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(message) = failure {
                self.services.lock().map_err(|_| poisoned("services"))?.remove(name);
                return Err(DispatchError::ServiceInitFailed {
                    name: name.to_string(),
                    message,
                }
                .into());
            }
        }

        Ok(instance)
    }

    /// The service bound to `system:service:<name>`.
    ///
    /// The first lookup resolves the highest priority listener, takes the
    /// shared instance of its class, and runs the atom's method once as
    /// initialization. Later lookups return the same instance.
    ///
    /// # Errors
    /// `ConfigError::ServiceNotDeclared`, `ConfigError::NotAService`, or
    /// `DispatchError::ServiceInitFailed`.
    pub fn service(&self, name: &str) -> SwitchboardResult<Arc<dyn Listener>> {
        Ok(self.service_instance(name)?.as_listener())
    }

    /// The service bound to `name`, as its concrete type.
    ///
    /// # Errors
    /// As [`service`](Self::service), or `Internal` if the service is not a `T`.
    pub fn service_as<T: Any + Send + Sync>(&self, name: &str) -> SwitchboardResult<Arc<T>> {
        self.service_instance(name)?.downcast::<T>().ok_or_else(|| {
            SwitchboardError::internal(format!(
                "service '{name}' is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Returns true if `name` is registered or declared.
    pub fn service_exists(&self, name: &str) -> SwitchboardResult<bool> {
        if self.services.lock().map_err(|_| poisoned("services"))?.contains_key(name) {
            return Ok(true);
        }
        let event = Event::service(name);
        Ok(self
            .manifest
            .first_listener(event.event_type(), Origin::Internal)?
            .is_some())
    }

    /// Registers `service` under `name`, replacing any memoized instance.
    ///
    /// No initialization method runs.
    pub fn register_service<T: Service>(&self, name: &str, service: Arc<T>) -> SwitchboardResult<()> {
        debug!(service = name, "registering service");
        self.services
            .lock()
            .map_err(|_| poisoned("services"))?
            .insert(name.to_string(), Instance::shared_service(service));
        Ok(())
    }

    /// Rebuilds the routing table from the fragments on disk.
    ///
    /// The new table is checked against the handler registry before anything
    /// is persisted; on a bad binding the current table stays in place.
    ///
    /// # Errors
    /// `ConfigError::UnknownHandler` or `ConfigError::NotAService` for a bad
    /// binding, plus everything [`Manifest::rebuild`] returns.
    pub fn rebuild(&self) -> SwitchboardResult<()> {
        self.manifest.rebuild_checked(|atom| check_binding(&self.handlers, atom))
    }

    /// Adds a listener at runtime after checking its class binding.
    ///
    /// # Errors
    /// `ConfigError::UnknownHandler` or `ConfigError::NotAService`.
    pub fn add_listener(&self, atom: ListenAtom) -> SwitchboardResult<()> {
        check_binding(&self.handlers, &atom)?;
        self.manifest.add_listener(atom)
    }
}

fn check_binding(handlers: &HandlerRegistry, atom: &ListenAtom) -> Result<(), ConfigError> {
    match handlers.kind(atom.class()) {
        None => Err(ConfigError::UnknownHandler {
            class: atom.class().to_string(),
        }),
        Some(HandlerKind::Listener) if atom.service_name().is_some() => Err(ConfigError::NotAService {
            class: atom.class().to_string(),
        }),
        Some(_) => Ok(()),
    }
}
