//! crates/noe_pipeline/src/controller.rs
//! Recomputation controller: owns the published nomination order.
//!
//! States: `Empty → Stable ⇄ Stale`.
//! - Readers get the current snapshot lock-free (`ArcSwapOption`); a snapshot
//!   is never mutated after publication.
//! - At most one merge runs at a time (`merge_lock`). Triggers arriving while
//!   a merge is in flight leave the controller `Stale`, so the next `refresh`
//!   recomputes again; triggers arriving before it starts are coalesced.
//! - A failed merge publishes nothing: current snapshot and history stay as
//!   they were.
//! - With a bound source (`with_source`), entering `Stale` runs the merge
//!   right away; without one, the caller drives merges through `refresh`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use noe_algo::{PolicyConfig, ReservationPolicy};
use noe_core::{Candidate, NominationOrder, Sha256};
use noe_core::determinism::sort_candidates_canonical;

use crate::build_order::{build_order, fingerprint_inputs, MergeSettings};
use crate::changes::{derive_changes, ChangeNotice, InputChange};
use crate::diff::{diff_orders, OrderDiff};
use crate::source::CandidateSource;
use crate::{EngineSettings, PipelineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing published yet.
    Empty,
    /// The published order reflects the last known inputs.
    Stable,
    /// Inputs changed since the published order was computed.
    Stale,
}

impl ControllerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ControllerState::Empty => "empty",
            ControllerState::Stable => "stable",
            ControllerState::Stale => "stale",
        }
    }
}

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    /// A merge ran and published `order`.
    Recomputed { order: Arc<NominationOrder>, diff: OrderDiff },
    /// Nothing to do; `order` is the current snapshot.
    UpToDate(Arc<NominationOrder>),
}

impl RefreshOutcome {
    pub fn order(&self) -> &Arc<NominationOrder> {
        match self {
            RefreshOutcome::Recomputed { order, .. } | RefreshOutcome::UpToDate(order) => order,
        }
    }
}

/// Bookkeeping guarded by one mutex.
struct Inner {
    state: ControllerState,
    next_version: u64,
    /// Retained published snapshots, oldest first; the last one is current.
    history: VecDeque<Arc<NominationOrder>>,
    /// Fingerprint and sorted snapshot last seen by `observe` or a merge.
    observed: Option<(Sha256, Vec<Candidate>)>,
    /// Changes not yet folded into a published order, tagged with their
    /// sequence number.
    pending: Vec<(u64, InputChange)>,
}

pub struct RecomputationController {
    policy: ReservationPolicy,
    settings: EngineSettings,
    current: ArcSwapOption<NominationOrder>,
    inner: Mutex<Inner>,
    merge_lock: Mutex<()>,
    /// Source merged from automatically when the controller goes `Stale`.
    source: Option<Arc<dyn CandidateSource>>,
    /// Bumped for every trigger; a merge compares before/after to detect
    /// triggers that raced it.
    change_seq: AtomicU64,
}

impl RecomputationController {
    pub fn new(policy: ReservationPolicy, settings: EngineSettings) -> Self {
        Self {
            policy,
            settings,
            current: ArcSwapOption::empty(),
            inner: Mutex::new(Inner {
                state: ControllerState::Empty,
                next_version: 1,
                history: VecDeque::new(),
                observed: None,
                pending: Vec::new(),
            }),
            merge_lock: Mutex::new(()),
            source: None,
            change_seq: AtomicU64::new(0),
        }
    }

    /// Build the policy from its file form. `settings.seats` wins over
    /// `config.seats` when both are set.
    pub fn from_config(config: &PolicyConfig, mut settings: EngineSettings) -> Result<Self, PipelineError> {
        let policy = config.build()?;
        settings.seats = settings.seats.or(config.seat_limit());
        Ok(Self::new(policy, settings))
    }

    /// Bind the candidate store: every trigger that leaves the controller
    /// `Stale` then recomputes from it before returning.
    pub fn with_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Resume from an order published by an earlier run. The controller starts
    /// `Stale` and the next merge is numbered `previous.version + 1`.
    pub fn resume_from(&self, previous: NominationOrder) -> Result<(), PipelineError> {
        let next_version = previous.version.checked_add(1).ok_or(PipelineError::VersionOverflow(previous.version))?;
        let mut inner = self.inner.lock();
        let previous = Arc::new(previous);
        inner.next_version = next_version;
        inner.history.clear();
        inner.history.push_back(Arc::clone(&previous));
        inner.state = ControllerState::Stale;
        self.current.store(Some(previous));
        Ok(())
    }

    // ----------------------------- Triggers -----------------------------

    /// Record an input change pushed by the registry side.
    pub fn notify(&self, notice: ChangeNotice) {
        let mut inner = self.inner.lock();
        let seq = self.change_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(seq, change = %notice, "change notice");
        inner.pending.push((seq, notice));
        if inner.state == ControllerState::Stable {
            inner.state = ControllerState::Stale;
        }
        drop(inner);
        self.drive();
    }

    /// Pull a snapshot and compare it with the last one seen. Returns the
    /// derived changes (empty when nothing changed).
    pub fn observe<S: CandidateSource + ?Sized>(&self, source: &S) -> Result<Vec<InputChange>, PipelineError> {
        let (fingerprint, snapshot) = self.take_snapshot(source)?;

        let mut inner = self.inner.lock();
        let changes = match &inner.observed {
            Some((seen, _)) if *seen == fingerprint => return Ok(Vec::new()),
            Some((_, before)) => derive_changes(before, &snapshot),
            None => derive_changes(&[], &snapshot),
        };
        inner.observed = Some((fingerprint, snapshot));
        if changes.is_empty() {
            return Ok(changes);
        }
        for change in &changes {
            let seq = self.change_seq.fetch_add(1, Ordering::SeqCst) + 1;
            inner.pending.push((seq, change.clone()));
        }
        if inner.state == ControllerState::Stable {
            inner.state = ControllerState::Stale;
        }
        tracing::debug!(changes = changes.len(), "snapshot changed");
        drop(inner);
        self.drive();
        Ok(changes)
    }

    // ----------------------------- Merges -----------------------------

    /// Merge if `Empty` or `Stale`; otherwise hand back the current order.
    pub fn refresh<S: CandidateSource + ?Sized>(&self, source: &S) -> Result<RefreshOutcome, PipelineError> {
        let outcome = {
            let _merging = self.merge_lock.lock();
            match self.current.load_full() {
                Some(order) if self.state() == ControllerState::Stable => {
                    tracing::debug!(version = order.version, "refresh coalesced; order is current");
                    return Ok(RefreshOutcome::UpToDate(order));
                }
                _ => self.merge_and_publish(source)?,
            }
        };
        self.drive();
        Ok(outcome)
    }

    /// Full merge regardless of state.
    pub fn recompute<S: CandidateSource + ?Sized>(&self, source: &S) -> Result<RefreshOutcome, PipelineError> {
        let outcome = {
            let _merging = self.merge_lock.lock();
            self.merge_and_publish(source)?
        };
        self.drive();
        Ok(outcome)
    }

    /// Merge from the bound source until `Stable` or a merge fails. A trigger
    /// that finds a merge in flight leaves the work to the lock holder, which
    /// re-checks the state after releasing the lock.
    fn drive(&self) {
        let Some(source) = self.source.as_deref() else { return };
        loop {
            let Some(_merging) = self.merge_lock.try_lock() else { return };
            if self.state() == ControllerState::Stable || self.merge_and_publish(source).is_err() {
                return;
            }
        }
    }

    /// Caller holds `merge_lock`.
    fn merge_and_publish<S: CandidateSource + ?Sized>(&self, source: &S) -> Result<RefreshOutcome, PipelineError> {
        let seq_at_start = self.change_seq.load(Ordering::SeqCst);
        let version = self.inner.lock().next_version;
        let next_version = version.checked_add(1).ok_or(PipelineError::VersionOverflow(version))?;
        tracing::info!(version, "recomputing nomination order");

        let attempt = self.take_snapshot(source).and_then(|(fingerprint, snapshot)| {
            let settings = MergeSettings { seat_limit: self.settings.seats, parallel_lists: self.settings.parallel_lists };
            build_order(&snapshot, &self.policy, settings, version).map(|built| (fingerprint, snapshot, built))
        });
        let (fingerprint, snapshot, built) = match attempt {
            Ok(ok) => ok,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.state == ControllerState::Stable {
                    inner.state = ControllerState::Stale;
                }
                tracing::warn!(version, error = %e, "merge failed; published order unchanged");
                return Err(e);
            }
        };

        let order = Arc::new(built.order);
        let mut inner = self.inner.lock();
        let previous = self.current.load_full();
        let diff = diff_orders(previous.as_deref(), &order);

        self.current.store(Some(Arc::clone(&order)));
        inner.next_version = next_version;
        inner.history.push_back(Arc::clone(&order));
        while inner.history.len() > self.settings.history_limit.max(1) {
            inner.history.pop_front();
        }
        inner.observed = Some((fingerprint, snapshot));
        inner.pending.retain(|(seq, _)| *seq > seq_at_start);
        inner.state = if self.change_seq.load(Ordering::SeqCst) == seq_at_start {
            ControllerState::Stable
        } else {
            ControllerState::Stale
        };

        tracing::info!(
            version,
            order_id = %order.order_id,
            seats = order.len(),
            moved = diff.moves.len(),
            state = inner.state.as_str(),
            "published nomination order"
        );
        if let Some(w) = &order.warning {
            tracing::warn!(requested = w.requested, filled = w.filled, "fewer candidates than requested seats");
        }
        Ok(RefreshOutcome::Recomputed { order, diff })
    }

    fn take_snapshot<S: CandidateSource + ?Sized>(&self, source: &S) -> Result<(Sha256, Vec<Candidate>), PipelineError> {
        let mut snapshot = source.snapshot()?;
        sort_candidates_canonical(&mut snapshot);
        let fingerprint = fingerprint_inputs(&snapshot, &self.policy, self.settings.seats)?;
        Ok((fingerprint, snapshot))
    }

    // ----------------------------- Readers -----------------------------

    pub fn state(&self) -> ControllerState {
        self.inner.lock().state
    }

    /// Current published order; lock-free.
    pub fn current(&self) -> Option<Arc<NominationOrder>> {
        self.current.load_full()
    }

    /// Retained snapshots, oldest first (the last is current).
    pub fn history(&self) -> Vec<Arc<NominationOrder>> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Snapshot with this version, if still retained.
    pub fn version(&self, version: u64) -> Option<Arc<NominationOrder>> {
        self.inner.lock().history.iter().find(|o| o.version == version).cloned()
    }

    /// Diff between two retained versions.
    pub fn diff_versions(&self, from: u64, to: u64) -> Option<OrderDiff> {
        let (a, b) = (self.version(from)?, self.version(to)?);
        Some(diff_orders(Some(&a), &b))
    }

    /// Changes recorded since the last published merge started.
    pub fn pending_changes(&self) -> Vec<InputChange> {
        self.inner.lock().pending.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}
