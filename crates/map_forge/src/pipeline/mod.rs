//! Dataflow scheduler for mutating operations on shared masks.
//!
//! A [`Pipeline`] runs in two phases. During the *building* phase a single thread registers
//! masks with [`Pipeline::register_mask`] and declares operations with [`Pipeline::declare`];
//! nothing executes. [`Pipeline::start`] switches to the *running* phase and releases every
//! entry without dependencies onto a worker pool. Each entry runs once all entries it depends
//! on completed, and its result is handed on through a [`fanout`] slot: the next entry on the
//! same mask gets the original, every other reader gets a private clone.
//!
//! Every completed entry records a content hash in declaration order, see [`HashLog`].
//! Two runs of the same seed and graph must produce equal logs.
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mask::{Mask, MaskId};

mod entry;
pub(crate) mod fanout;
pub mod hashlog;

use entry::{Entry, Source, Work};
pub use hashlog::{HashLog, HashRecord};

/// Worker pool configuration of a [`Pipeline`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of worker threads. `0` lets rayon pick one per logical CPU.
    pub worker_threads: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_name: "map-forge-worker".into(),
        }
    }
}

impl PipelineConfig {
    /// Sets the number of worker threads.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Sets the worker thread name prefix.
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.thread_name.trim().is_empty() {
            return Err(Error::InvalidConfig("thread_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Execution phase of a [`Pipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Declarations only, nothing runs.
    Building,
    /// Entries execute as their dependencies complete.
    Running,
}

/// Handle to a declared entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

impl EntryId {
    /// Declaration index of the entry.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// A declaration made after [`Pipeline::start`] against a mask that already had entries.
/// The run still completes, but its results are no longer guaranteed reproducible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterminismWarning {
    /// Index of the offending entry.
    pub index: usize,
    /// Name of the mask it targets.
    pub mask: String,
    /// `file:line:column` of the declaration.
    pub call_site: String,
}

struct MaskSlot<M> {
    name: String,
    /// Initial value, consumed by the first entry on this mask.
    seed: Option<M>,
    latest: Option<usize>,
}

struct State<M> {
    phase: Phase,
    entries: Vec<Arc<Entry<M>>>,
    masks: Vec<MaskSlot<M>>,
}

impl<M> State<M> {
    fn slot(&self, id: MaskId) -> Result<&MaskSlot<M>> {
        self.masks.get(id.0).ok_or(Error::UnknownMask(id.0))
    }
}

struct Shared<M> {
    pool: Arc<rayon::ThreadPool>,
    state: Mutex<State<M>>,
    hashes: Mutex<Vec<Option<HashRecord>>>,
    warnings: Mutex<Vec<DeterminismWarning>>,
}

impl<M: Mask> Shared<M> {
    fn new(pool: Arc<rayon::ThreadPool>) -> Self {
        Self {
            pool,
            state: Mutex::new(State {
                phase: Phase::Building,
                entries: Vec::new(),
                masks: Vec::new(),
            }),
            hashes: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    fn spawn(self: &Arc<Self>, entry: Arc<Entry<M>>) {
        if !entry.claim() {
            return;
        }
        let shared = Arc::clone(self);
        self.pool.spawn(move || shared.run(entry));
    }

    fn run(self: &Arc<Self>, entry: Arc<Entry<M>>) {
        let dependents = match entry.execute() {
            Ok(value) => {
                let hash = entry_hash(&value, entry.call_site, &entry.label);
                debug!(
                    "Entry {} ({}) on '{}' completed: {}.",
                    entry.index, entry.label, entry.target_name, hash
                );
                self.hashes.lock()[entry.index] = Some(HashRecord {
                    hash,
                    call_site: entry.call_site.to_string(),
                    mask: entry.target_name.clone(),
                    label: entry.label.clone(),
                });
                entry.finish(value)
            }
            Err(failure) => {
                error!(
                    "Entry {} ({}) on '{}' failed: {:?}.",
                    entry.index, entry.label, entry.target_name, failure
                );
                entry.fail(failure)
            }
        };

        let dependents: Vec<Arc<Entry<M>>> = {
            let state = self.state.lock();
            dependents
                .iter()
                .filter_map(|i| state.entries.get(*i).cloned())
                .collect()
        };
        for dependent in dependents {
            if dependent.release_one() {
                self.spawn(dependent);
            }
        }
    }
}

/// Hash of an entry result combined with the declaration site and label.
pub(crate) fn entry_hash<M: Mask>(value: &M, call_site: &Location<'_>, label: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    value.hash_content(&mut hasher);
    hasher.update(call_site.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(label.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Dataflow scheduler. See the [module documentation](self).
pub struct Pipeline<M: Mask> {
    config: PipelineConfig,
    shared: Arc<Shared<M>>,
}

impl<M: Mask> Pipeline<M> {
    /// Create a pipeline with its own worker pool.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = rayon::ThreadPoolBuilder::new();
        if config.worker_threads > 0 {
            builder = builder.num_threads(config.worker_threads);
        }
        let prefix = config.thread_name.clone();
        let pool = builder
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared::new(Arc::new(pool))),
        })
    }

    /// Configuration the pipeline was created with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current phase: building until [`Pipeline::start`], running afterwards.
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Whether [`Pipeline::start`] was called since creation or the last reset.
    pub fn is_started(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Number of declared entries.
    pub fn entry_count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Name a mask was registered with.
    pub fn mask_name(&self, mask: MaskId) -> Result<String> {
        Ok(self.shared.state.lock().slot(mask)?.name.clone())
    }

    /// Register a mask and its initial value. Non-blocking.
    pub fn register_mask(&self, name: impl Into<String>, seed: M) -> MaskId {
        let mut state = self.shared.state.lock();
        let id = MaskId(state.masks.len());
        state.masks.push(MaskSlot {
            name: name.into(),
            seed: Some(seed),
            latest: None,
        });
        id
    }

    /// Declare `operation` on `target`, reading the current values of `dependencies`.
    ///
    /// See [`Pipeline::declare_labeled`].
    #[track_caller]
    pub fn declare<F>(&self, target: MaskId, dependencies: &[MaskId], operation: F) -> Result<EntryId>
    where
        F: FnOnce(&mut M, Vec<M>) -> Result<()> + Send + 'static,
    {
        self.declare_labeled("operation", target, dependencies, operation)
    }

    /// Declare a labelled operation.
    ///
    /// When the entry runs, `operation` receives the target's value as left by the previous
    /// entry on `target` (or its seed) and one owned value per dependency, in the given order
    /// with duplicates and `target` itself removed. Non-blocking: nothing runs before
    /// [`Pipeline::start`].
    ///
    /// Declaring after `start` against a mask that already has entries is allowed but records
    /// a [`DeterminismWarning`].
    #[track_caller]
    pub fn declare_labeled<F>(
        &self,
        label: impl Into<String>,
        target: MaskId,
        dependencies: &[MaskId],
        operation: F,
    ) -> Result<EntryId>
    where
        F: FnOnce(&mut M, Vec<M>) -> Result<()> + Send + 'static,
    {
        self.declare_at(Location::caller(), label, target, dependencies, operation)
    }

    /// [`Pipeline::declare_labeled`] with an explicit call site, for callers that declare
    /// on behalf of code written elsewhere (e.g. a vertex added to a stage graph).
    pub fn declare_at<F>(
        &self,
        call_site: &'static Location<'static>,
        label: impl Into<String>,
        target: MaskId,
        dependencies: &[MaskId],
        operation: F,
    ) -> Result<EntryId>
    where
        F: FnOnce(&mut M, Vec<M>) -> Result<()> + Send + 'static,
    {
        let label = label.into();

        let mut deps: Vec<MaskId> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if *dep != target && !deps.contains(dep) {
                deps.push(*dep);
            }
        }

        let mut state = self.shared.state.lock();
        state.slot(target)?;
        for dep in &deps {
            let slot = state.slot(*dep)?;
            if slot.latest.is_none() && slot.seed.is_none() {
                return Err(Error::InvalidState(format!(
                    "mask '{}' has neither a value nor a producing entry",
                    slot.name
                )));
            }
        }

        let index = state.entries.len();
        let started = state.phase == Phase::Running;
        let target_name = state.masks[target.0].name.clone();

        if started && state.masks[target.0].latest.is_some() {
            warn!(
                "Entry {} ({}) declared on '{}' after start at {}; results may not be reproducible.",
                index, label, target_name, call_site
            );
            self.shared.warnings.lock().push(DeterminismWarning {
                index,
                mask: target_name.clone(),
                call_site: call_site.to_string(),
            });
        }

        let mut upstream: Vec<Arc<Entry<M>>> = Vec::new();
        let mut source_for = |state: &mut State<M>, mask: MaskId, take_seed: bool| {
            let slot = &mut state.masks[mask.0];
            let source = match slot.latest {
                Some(i) => {
                    let entry = Arc::clone(&state.entries[i]);
                    upstream.push(Arc::clone(&entry));
                    Some(Source::Entry(entry))
                }
                None if take_seed => slot.seed.take().map(Source::Ready),
                None => slot.seed.clone().map(Source::Ready),
            };
            source.ok_or_else(|| {
                Error::InvalidState(format!("mask '{}' has no value to read", slot.name))
            })
        };

        let inputs = deps
            .iter()
            .map(|dep| source_for(&mut state, *dep, false))
            .collect::<Result<Vec<_>>>()?;
        let target_source = source_for(&mut state, target, true)?;

        let entry = Arc::new(Entry::new(
            index,
            target,
            target_name.clone(),
            label,
            call_site,
            Work {
                target: target_source,
                inputs,
                operation: Box::new(operation),
            },
            upstream.len(),
        ));
        state.entries.push(Arc::clone(&entry));
        state.masks[target.0].latest = Some(index);
        self.shared.hashes.lock().push(None);

        for dep in &upstream {
            let available = dep.fanout.lock().subscribe(index, dep.target == target);
            if available {
                entry.release_one();
            }
        }
        drop(state);

        debug!(
            "Declared entry {} ({}) on '{}' with {} dependencies.",
            index,
            entry.label,
            target_name,
            upstream.len()
        );

        if entry.release_one() && started {
            self.shared.spawn(entry);
        }
        Ok(EntryId(index))
    }

    /// Switch to the running phase and release every entry without pending dependencies.
    pub fn start(&self) -> Result<()> {
        let roots: Vec<Arc<Entry<M>>> = {
            let mut state = self.shared.state.lock();
            if state.phase == Phase::Running {
                return Err(Error::InvalidState("pipeline already started".into()));
            }
            state.phase = Phase::Running;
            info!("Starting pipeline with {} entries.", state.entries.len());
            state
                .entries
                .iter()
                .filter(|e| e.is_ready())
                .cloned()
                .collect()
        };
        for entry in roots {
            self.shared.spawn(entry);
        }
        Ok(())
    }

    /// Block until the entries currently owning `masks` completed.
    pub fn await_masks(&self, masks: &[MaskId]) -> Result<()> {
        let pending: Vec<Arc<Entry<M>>> = {
            let state = self.shared.state.lock();
            let mut pending = Vec::new();
            for mask in masks {
                if let Some(i) = state.slot(*mask)?.latest {
                    pending.push(Arc::clone(&state.entries[i]));
                }
            }
            self.ensure_can_wait(&state, &pending)?;
            pending
        };
        wait_all(&pending)
    }

    /// Block until every declared entry completed. Returns the first failure in
    /// declaration order.
    pub fn join(&self) -> Result<()> {
        let entries: Vec<Arc<Entry<M>>> = {
            let state = self.shared.state.lock();
            self.ensure_can_wait(&state, &state.entries)?;
            state.entries.clone()
        };
        wait_all(&entries)?;
        info!("Pipeline finished {} entries.", entries.len());
        Ok(())
    }

    /// Same as [`Pipeline::join`].
    pub fn stop(&self) -> Result<()> {
        self.join()
    }

    /// Take the current value of `mask` on behalf of `requester`.
    ///
    /// Blocks until the entry owning `mask` completed. When `requester == mask` the original is
    /// moved out; any other requester consumes one of the clones reserved for it. Requesting
    /// more clones than were reserved is [`Error::FanOutExhausted`].
    pub fn get_result(&self, mask: MaskId, requester: MaskId) -> Result<M> {
        let (entry, requester_name) = {
            let state = self.shared.state.lock();
            let slot = state.slot(mask)?;
            let requester_name = state.slot(requester)?.name.clone();
            match slot.latest {
                Some(i) => {
                    let entry = Arc::clone(&state.entries[i]);
                    self.ensure_can_wait(&state, std::slice::from_ref(&entry))?;
                    (entry, requester_name)
                }
                None => {
                    return slot.seed.clone().ok_or_else(|| {
                        Error::InvalidState(format!("mask '{}' has no value", slot.name))
                    })
                }
            }
        };
        entry.take_result(requester, &requester_name)
    }

    /// Clone the current value of `mask` without consuming anything. `None` when the value
    /// already moved to a later owner.
    pub fn snapshot(&self, mask: MaskId) -> Result<Option<M>> {
        let entry = {
            let state = self.shared.state.lock();
            let slot = state.slot(mask)?;
            match slot.latest {
                Some(i) => {
                    let entry = Arc::clone(&state.entries[i]);
                    self.ensure_can_wait(&state, std::slice::from_ref(&entry))?;
                    entry
                }
                None => return Ok(slot.seed.clone()),
            }
        };
        entry.peek_result()
    }

    /// Hash records of all entries, in declaration order.
    pub fn hash_log(&self) -> HashLog {
        HashLog::from_records(self.shared.hashes.lock().clone())
    }

    /// Determinism warnings raised so far.
    pub fn warnings(&self) -> Vec<DeterminismWarning> {
        self.shared.warnings.lock().clone()
    }

    /// Drop every entry, mask, hash and warning and return to the building phase.
    /// The worker pool is kept. Waits for a started run to finish first.
    pub fn reset(&mut self) {
        if self.is_started() {
            if let Err(e) = self.join() {
                warn!("Pipeline reset after a failed run: {}.", e);
            }
        }
        self.shared = Arc::new(Shared::new(Arc::clone(&self.shared.pool)));
    }

    fn ensure_can_wait(&self, state: &State<M>, entries: &[Arc<Entry<M>>]) -> Result<()> {
        if state.phase == Phase::Building && entries.iter().any(|e| !e.is_complete()) {
            return Err(Error::InvalidState(
                "cannot wait for entries before the pipeline is started".into(),
            ));
        }
        Ok(())
    }
}

fn wait_all<M: Mask>(entries: &[Arc<Entry<M>>]) -> Result<()> {
    let mut first_error = None;
    for entry in entries {
        if let Err(e) = entry.wait() {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
