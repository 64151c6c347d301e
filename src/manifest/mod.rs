//! The manifest aggregator.
//!
//! Module fragments are discovered under the configured search paths, and
//! their signatures are compared against the cached ones. When anything
//! changed, every fragment is re-read, converted into validated atoms,
//! sorted, and persisted as one artifact per section.
//!
//! Sections are loaded lazily from their artifacts on first access and kept
//! for the lifetime of the [`Manifest`].
//!
//! ```text
//! modules/*/module.json ─┐
//! system/module.json ────┼─► discover ─► classify ─► rebuild? ─► artifacts
//! vendor/*/module.json ──┘                                          │
//!                                   listeners() ◄─ lazy sections ◄──┘
//! ```

mod cache;
mod config;
mod discovery;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

pub use cache::{WARNING, WARNING_KEY};
pub use config::ManifestConfig;
pub use discovery::{classify, discover, signature, Fragment, ModuleState};

use crate::atom::{
    sort_by_priority, EmitAtom, ListenAtom, RawEmit, RawListen, RawWebComponent, WebComponentAtom,
};
use crate::error::{poisoned, ConfigError, SwitchboardError, SwitchboardResult};
use crate::event::Payload;
use crate::origin::Origin;
use crate::pattern::{EventMatch, EventQuery};

/// File name of the signatures artifact.
pub const SIGNATURES_FILE: &str = "signatures.cache.json";

/// A lazily loaded aggregate section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Subscriptions, priority order.
    Listen,
    /// Producer declarations.
    Emit,
    /// Custom element registrations.
    WebComponents,
    /// Shallow-merged `config` objects.
    Config,
    /// Each fragment's content keyed by its path.
    Manifests,
}

impl Section {
    /// Every section.
    pub const ALL: [Self; 5] = [
        Self::Listen,
        Self::Emit,
        Self::WebComponents,
        Self::Config,
        Self::Manifests,
    ];

    /// Fragment and artifact key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Listen => "listen",
            Self::Emit => "emit",
            Self::WebComponents => "webComponents",
            Self::Config => "config",
            Self::Manifests => "manifests",
        }
    }

    /// Artifact file name.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Listen => "listen.cache.json",
            Self::Emit => "emit.cache.json",
            Self::WebComponents => "web-components.json",
            Self::Config => "config.cache.json",
            Self::Manifests => "manifests.cache.json",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A loaded section.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum SectionData {
    Listen(Arc<Vec<ListenAtom>>),
    Emit(Arc<Vec<EmitAtom>>),
    WebComponents(Arc<Vec<WebComponentAtom>>),
    Config(Arc<Payload>),
    Manifests(Arc<BTreeMap<String, Payload>>),
}

type Slot<T> = RwLock<Option<Arc<T>>>;

/// Every section built from one pass over the fragments.
#[derive(Default)]
struct Aggregate {
    listen: Vec<ListenAtom>,
    emit: Vec<EmitAtom>,
    web_components: Vec<WebComponentAtom>,
    config: Payload,
    manifests: BTreeMap<String, Payload>,
}

/// The aggregated, cached routing table.
#[derive(Debug)]
pub struct Manifest {
    config: ManifestConfig,
    fragments: Vec<Fragment>,
    states: BTreeMap<String, ModuleState>,
    listen: Slot<Vec<ListenAtom>>,
    emit: Slot<Vec<EmitAtom>>,
    web_components: Slot<Vec<WebComponentAtom>>,
    config_section: Slot<Payload>,
    manifests: Slot<BTreeMap<String, Payload>>,
}

impl Manifest {
    /// Discovers fragments and rebuilds the cache if any fragment changed.
    ///
    /// # Errors
    /// `ConfigError` for an invalid configuration or fragment, `CacheError`
    /// if the signatures artifact cannot be read or an artifact cannot be
    /// written.
    pub fn open(config: ManifestConfig) -> SwitchboardResult<Self> {
        let config = config.validate()?;
        let fragments = discover(&config)?;
        let cached: BTreeMap<String, String> =
            cache::read_artifact(&config.cache_dir().join(SIGNATURES_FILE), "signatures")?.unwrap_or_default();
        let states = classify(&cached, &fragments);

        for (path, state) in &states {
            if *state != ModuleState::Unchanged {
                let new_signature = fragments.iter().find(|f| f.path() == path).map(Fragment::signature);
                info!(
                    fragment = %path,
                    state = %state,
                    old = cached.get(path).map_or("-", String::as_str),
                    new = new_signature.unwrap_or("-"),
                    "module manifest state"
                );
            }
        }

        let manifest = Self {
            config,
            fragments,
            states,
            listen: RwLock::new(None),
            emit: RwLock::new(None),
            web_components: RwLock::new(None),
            config_section: RwLock::new(None),
            manifests: RwLock::new(None),
        };

        if manifest.has_changed() {
            manifest.rebuild()?;
        } else {
            debug!(fragments = manifest.fragments.len(), "manifest cache is up to date");
        }
        Ok(manifest)
    }

    /// The validated configuration.
    #[must_use]
    pub fn manifest_config(&self) -> &ManifestConfig {
        &self.config
    }

    /// Fragments discovered at open, sorted by path.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Directory names of the discovered modules.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.fragments.iter().map(Fragment::module_name).collect()
    }

    /// Directories of the discovered modules.
    #[must_use]
    pub fn module_paths(&self) -> Vec<&Path> {
        self.fragments.iter().map(Fragment::module_dir).collect()
    }

    /// State of a fragment at open, by canonical path.
    #[must_use]
    pub fn state(&self, path: &str) -> Option<ModuleState> {
        self.states.get(path).copied()
    }

    /// Paths of the fragments in `state`, including removed ones.
    #[must_use]
    pub fn filter_fragments(&self, state: ModuleState) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Returns true if any fragment was new, changed or removed at open.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.states.values().any(|s| *s != ModuleState::Unchanged)
    }

    fn artifact_path(&self, section: Section) -> PathBuf {
        match section {
            Section::WebComponents => self.config.public_cache_dir().join(section.file_name()),
            _ => self.config.cache_dir().join(section.file_name()),
        }
    }

    /// Re-reads every fragment, persists all artifacts, and replaces the
    /// in-memory sections. Listeners added with [`add_listener`](Self::add_listener)
    /// are dropped.
    ///
    /// # Errors
    /// `ConfigError` for unreadable or invalid fragments, `CacheError` if an
    /// artifact cannot be written. Nothing is persisted when a fragment fails.
    pub fn rebuild(&self) -> SwitchboardResult<()> {
        self.rebuild_checked(|_| Ok(()))
    }

    /// [`rebuild`](Self::rebuild), refusing the new table unless `check`
    /// accepts every listen atom in it.
    pub(crate) fn rebuild_checked(
        &self,
        check: impl Fn(&ListenAtom) -> Result<(), ConfigError>,
    ) -> SwitchboardResult<()> {
        let aggregate = self.aggregate()?;
        for atom in &aggregate.listen {
            check(atom)?;
        }

        let signatures: BTreeMap<&str, &str> = self
            .fragments
            .iter()
            .map(|f| (f.path(), f.signature()))
            .collect();

        self.persist(Section::Manifests, &aggregate.manifests)?;
        self.persist(Section::Listen, &aggregate.listen)?;
        self.persist(Section::Emit, &aggregate.emit)?;
        self.persist(Section::Config, &aggregate.config)?;
        self.persist(Section::WebComponents, &aggregate.web_components)?;
        // Signatures last: an interrupted rebuild is retried on the next open.
        cache::write_artifact(&self.config.cache_dir().join(SIGNATURES_FILE), "signatures", &signatures)?;

        info!(
            fragments = self.fragments.len(),
            listen = aggregate.listen.len(),
            emit = aggregate.emit.len(),
            web_components = aggregate.web_components.len(),
            "manifest cache rebuilt"
        );

        store(&self.listen, aggregate.listen, Section::Listen)?;
        store(&self.emit, aggregate.emit, Section::Emit)?;
        store(&self.web_components, aggregate.web_components, Section::WebComponents)?;
        store(&self.config_section, aggregate.config, Section::Config)?;
        store(&self.manifests, aggregate.manifests, Section::Manifests)?;
        Ok(())
    }

    fn persist<T: Serialize + ?Sized>(&self, section: Section, data: &T) -> SwitchboardResult<()> {
        cache::write_artifact(&self.artifact_path(section), section.key(), data)?;
        Ok(())
    }

    fn aggregate(&self) -> SwitchboardResult<Aggregate> {
        let mut out = Aggregate::default();

        for fragment in &self.fragments {
            let content = read_fragment(fragment)?;
            let path = fragment.path();

            for raw in entries::<RawListen>(&content, Section::Listen, path)? {
                out.listen
                    .push(ListenAtom::try_from(raw).map_err(|e| e.in_fragment(path))?);
            }
            for raw in entries::<RawEmit>(&content, Section::Emit, path)? {
                out.emit.push(EmitAtom::try_from(raw).map_err(|e| e.in_fragment(path))?);
            }
            for mut raw in entries::<RawWebComponent>(&content, Section::WebComponents, path)? {
                WebComponentAtom::rebase(&mut raw, fragment.module_name());
                out.web_components
                    .push(WebComponentAtom::try_from(raw).map_err(|e| e.in_fragment(path))?);
            }
            match content.get(Section::Config.key()) {
                None | Some(Value::Null) => {}
                Some(Value::Object(config)) => {
                    for (key, value) in config {
                        out.config.insert(key.clone(), value.clone());
                    }
                }
                Some(_) => {
                    return Err(malformed(path, "\"config\" must be an object").into());
                }
            }

            out.manifests.insert(path.to_string(), content);
        }

        sort_by_priority(&mut out.listen);
        sort_by_priority(&mut out.emit);
        sort_by_priority(&mut out.web_components);
        Ok(out)
    }

    fn lazy<T>(&self, slot: &Slot<T>, section: Section) -> SwitchboardResult<Arc<T>>
    where
        T: DeserializeOwned + Default,
    {
        if let Some(data) = slot.read().map_err(|_| poisoned("manifest section"))?.as_ref() {
            return Ok(Arc::clone(data));
        }

        let path = self.artifact_path(section);
        let loaded: T = cache::read_artifact(&path, section.key())?.unwrap_or_default();
        debug!(section = %section, path = %path.display(), "loaded manifest section");

        let mut guard = slot.write().map_err(|_| poisoned("manifest section"))?;
        Ok(Arc::clone(guard.get_or_insert_with(|| Arc::new(loaded))))
    }

    /// Loads a section if needed and returns it.
    ///
    /// # Errors
    /// `CacheError` if the artifact exists but cannot be read or parsed.
    pub fn section(&self, section: Section) -> SwitchboardResult<SectionData> {
        Ok(match section {
            Section::Listen => SectionData::Listen(self.lazy(&self.listen, section)?),
            Section::Emit => SectionData::Emit(self.lazy(&self.emit, section)?),
            Section::WebComponents => SectionData::WebComponents(self.lazy(&self.web_components, section)?),
            Section::Config => SectionData::Config(self.lazy(&self.config_section, section)?),
            Section::Manifests => SectionData::Manifests(self.lazy(&self.manifests, section)?),
        })
    }

    /// Returns true if `section` is already in memory.
    #[must_use]
    pub fn is_loaded(&self, section: Section) -> bool {
        fn loaded<T>(slot: &Slot<T>) -> bool {
            slot.read().map(|s| s.is_some()).unwrap_or(false)
        }
        match section {
            Section::Listen => loaded(&self.listen),
            Section::Emit => loaded(&self.emit),
            Section::WebComponents => loaded(&self.web_components),
            Section::Config => loaded(&self.config_section),
            Section::Manifests => loaded(&self.manifests),
        }
    }

    /// The whole listen section, priority order.
    pub fn listen_atoms(&self) -> SwitchboardResult<Arc<Vec<ListenAtom>>> {
        self.lazy(&self.listen, Section::Listen)
    }

    /// The whole emit section.
    pub fn emit_atoms(&self) -> SwitchboardResult<Arc<Vec<EmitAtom>>> {
        self.lazy(&self.emit, Section::Emit)
    }

    /// Listen atoms matching the event, in priority order.
    ///
    /// `limit == 0` returns every match.
    ///
    /// # Errors
    /// `CacheError` if the listen artifact is unreadable.
    pub fn listeners(&self, event_type: &str, origin: Origin, limit: usize) -> SwitchboardResult<Vec<ListenAtom>> {
        let atoms = self.listen_atoms()?;
        Ok(resolve(&atoms, event_type, origin, limit))
    }

    /// The highest priority matching listener.
    pub fn first_listener(&self, event_type: &str, origin: Origin) -> SwitchboardResult<Option<ListenAtom>> {
        Ok(self.listeners(event_type, origin, 1)?.into_iter().next())
    }

    /// Emit atoms matching the event.
    pub fn emitters(&self, event_type: &str, origin: Origin, limit: usize) -> SwitchboardResult<Vec<EmitAtom>> {
        let atoms = self.emit_atoms()?;
        Ok(resolve(&atoms, event_type, origin, limit))
    }

    /// Every web component, priority order.
    pub fn web_components(&self) -> SwitchboardResult<Arc<Vec<WebComponentAtom>>> {
        self.lazy(&self.web_components, Section::WebComponents)
    }

    /// The web component registered for `tag`.
    pub fn web_component(&self, tag: &str) -> SwitchboardResult<Option<WebComponentAtom>> {
        Ok(self.web_components()?.iter().find(|wc| wc.tag() == tag).cloned())
    }

    /// Merged `config` section.
    pub fn config(&self) -> SwitchboardResult<Arc<Payload>> {
        self.lazy(&self.config_section, Section::Config)
    }

    /// Raw fragment contents keyed by path.
    pub fn manifests(&self) -> SwitchboardResult<Arc<BTreeMap<String, Payload>>> {
        self.lazy(&self.manifests, Section::Manifests)
    }

    /// Names of all declared services, sorted.
    pub fn service_names(&self) -> SwitchboardResult<Vec<String>> {
        let mut names: Vec<String> = self
            .listen_atoms()?
            .iter()
            .filter_map(ListenAtom::service_name)
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Adds a listener to the in-memory listen section. Never persisted.
    ///
    /// # Errors
    /// `CacheError` if the listen section must be loaded first and cannot be.
    pub(crate) fn add_listener(&self, atom: ListenAtom) -> SwitchboardResult<()> {
        self.listen_atoms()?;
        let mut guard = self.listen.write().map_err(|_| poisoned("listen section"))?;
        let mut atoms: Vec<ListenAtom> = guard.as_deref().cloned().unwrap_or_default();
        debug!(event = %atom.event(), class = %atom.class(), "adding listener");
        atoms.push(atom);
        sort_by_priority(&mut atoms);
        *guard = Some(Arc::new(atoms));
        Ok(())
    }
}

fn store<T>(slot: &Slot<T>, data: T, section: Section) -> SwitchboardResult<()> {
    let mut guard = slot.write().map_err(|_| poisoned(section.key()))?;
    *guard = Some(Arc::new(data));
    Ok(())
}

fn resolve<T: EventMatch + Clone>(atoms: &[T], event_type: &str, origin: Origin, limit: usize) -> Vec<T> {
    let query = EventQuery::new(event_type, origin);
    let matching = atoms.iter().filter(|atom| atom.matches(&query)).cloned();
    if limit == 0 {
        matching.collect()
    } else {
        matching.take(limit).collect()
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedFragment {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Reads a fragment as a JSON object without its `#` comment keys.
fn read_fragment(fragment: &Fragment) -> SwitchboardResult<Payload> {
    let text = std::fs::read_to_string(fragment.file()).map_err(|e| malformed(fragment.path(), e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| malformed(fragment.path(), e.to_string()))?;
    let Value::Object(mut content) = value else {
        return Err(malformed(fragment.path(), "expected a JSON object").into());
    };
    content.retain(|key, _| !key.starts_with('#'));
    Ok(content)
}

/// The raw entries of one section of a fragment.
fn entries<T: DeserializeOwned>(content: &Payload, section: Section, path: &str) -> SwitchboardResult<Vec<T>> {
    let list = match content.get(section.key()) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(list)) => list,
        Some(_) => {
            return Err(malformed(path, format!("{:?} must be an array", section.key())).into());
        }
    };

    list.iter()
        .map(|entry| {
            serde_json::from_value(entry.clone())
                .map_err(|e| SwitchboardError::from(malformed(path, format!("invalid {} entry: {e}", section.key()))))
        })
        .collect()
}
