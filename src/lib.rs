//! # Switchboard - manifest-driven event routing
//!
//! Independently deployed modules each ship a small JSON manifest declaring
//! which events they listen to, which they emit, which web components they
//! provide, and configuration defaults. Switchboard merges those fragments
//! into one cached, priority-ordered routing table and dispatches events
//! through it.
//!
//! ## Core Concepts
//!
//! - **Atom**: one validated declaration ([`ListenAtom`], [`EmitAtom`], [`WebComponentAtom`])
//! - **Manifest**: the aggregated table, rebuilt only when a fragment's signature changes
//! - **Event**: type, origin, status, payloads; optionally stoppable or an authorize event
//! - **Runtime**: dispatcher and service locator over a manifest and a handler registry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use switchboard::{
//!     Event, HandlerRegistry, HandlerResult, Listener, Manifest, ManifestConfig, Origin, Runtime,
//! };
//!
//! struct Greeter;
//!
//! impl Listener for Greeter {
//!     fn handle(&self, _rt: &Runtime, _method: Option<&str>, event: &mut Event) -> HandlerResult {
//!         event.response.insert("greeting".into(), "hello".into());
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> switchboard::SwitchboardResult<()> {
//! let manifest = Manifest::open(ManifestConfig::new("/srv/app"))?;
//! let handlers = HandlerRegistry::new().listener("Greeter", || Greeter)?;
//! let rt = Runtime::new(manifest, handlers)?;
//!
//! let mut event = Event::new("demo:hello", Origin::Remote);
//! rt.dispatch(&mut event)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod authorization;
pub mod error;
pub mod event;
pub mod origin;
pub mod pattern;
pub mod status;

// Declarations and the aggregated table
pub mod atom;
pub mod manifest;

// Execution
pub mod handler;
pub mod lock;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use atom::{EmitAtom, ListenAtom, ListenAtomBuilder, Prioritized, WebComponentAtom, DEFAULT_PRIORITY};
pub use authorization::{Authorization, AUTHORIZE_EVENT};
pub use error::{
    CacheError, ConfigError, DispatchError, HandlerError, HandlerResult, SwitchboardError, SwitchboardResult,
};
pub use event::{Event, Payload, Propagation, REQUEST_EVENT_PREFIX, SERVICE_EVENT_PREFIX};
pub use handler::{HandlerKind, HandlerRegistry, Instance, Listener, Service};
pub use lock::InstallLock;
pub use manifest::{Fragment, Manifest, ManifestConfig, ModuleState, Section, SectionData};
pub use origin::Origin;
pub use pattern::{EventMatch, EventPattern, EventQuery};
pub use runtime::{DispatchOutcome, Runtime};
pub use status::Status;
