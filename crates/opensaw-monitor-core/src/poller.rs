//! Poll control: fetch → merge → wait → repeat, one cycle at a time.
//!
//! A [`Poller`] is a single async loop, so two cycles of the same poller can
//! never overlap. The [`PollerHandle`] it hands out is the control surface:
//! the dashboard and the headless watcher read status and flip the
//! enabled flag through it, and never touch the loop directly.
//!
//! State machine (per poller):
//!
//! ```text
//!            toggle             error
//!   Stop ◄──────────► Resume ◄─────── Stop
//!     │                  ▲
//!     │ done             │ toggle re-attempts
//!     ▼                  │
//!  Complete          (halted)
//! ```
//!
//! Pausing is cooperative. A fetch already in flight finishes and is merged;
//! the pause only takes effect at the next scheduling decision. Resuming
//! starts a cycle at once, even if the poller was paused mid-delay.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info};
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::error::{MonitorError, Result};

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Where snapshots come from. The HTTP implementation lives in
/// [`crate::source`]; tests script their own.
pub trait SnapshotSource {
    /// Fetch the raw body of one snapshot.
    fn fetch(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}

/// What a successful merge means for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Keep polling.
    Continue,
    /// The job is finished; nothing will change any more.
    Complete,
}

/// Long-lived visual state that snapshots are folded into.
pub trait MergeModel {
    type Snapshot: DeserializeOwned;

    /// Fold one snapshot in. An `Err` must leave the model as it was before
    /// the call.
    fn apply(&mut self, snapshot: Self::Snapshot) -> Result<Progress>;
}

/// Result of one fetch + merge.
#[derive(Debug)]
pub enum CycleOutcome {
    Continue,
    Complete,
    Failed(MonitorError),
}

/// Why [`Poller::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The job reported completion.
    Complete,
    /// [`PollerHandle::shutdown`] was called.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Status & control surface
// ---------------------------------------------------------------------------

/// What the view's single toggle control shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLabel {
    /// Polling; pressing the control pauses.
    Stop,
    /// Paused or halted; pressing the control polls again.
    Resume,
    /// The job finished; the control is gone and a completion marker shows.
    Complete,
}

impl ControlLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::Resume => "Resume",
            Self::Complete => "Complete",
        }
    }
}

/// Point-in-time copy of a poller's flags and counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollerStatus {
    pub enabled: bool,
    pub halted: bool,
    pub complete: bool,
    /// A fetch or merge is running right now.
    pub in_flight: bool,
    /// Cycles started, successful or not.
    pub cycles: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    /// Shutdown was requested; the loop exits at its next scheduling point.
    pub shutdown: bool,
    /// Times the poller went from disabled to enabled.
    pub resumes: u64,
}

impl PollerStatus {
    /// Derived from the flags; the label never feeds back into them.
    pub fn label(&self) -> ControlLabel {
        if self.complete {
            ControlLabel::Complete
        } else if self.enabled {
            ControlLabel::Stop
        } else {
            ControlLabel::Resume
        }
    }

    fn runnable(&self) -> bool {
        self.enabled && !self.halted && !self.complete
    }
}

struct Shared {
    name: String,
    status: Mutex<PollerStatus>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PollerStatus> {
        match self.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cloneable control surface for one poller.
#[derive(Clone)]
pub struct PollerHandle {
    shared: Arc<Shared>,
}

impl PollerHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn status(&self) -> PollerStatus {
        self.shared.lock().clone()
    }

    pub fn label(&self) -> ControlLabel {
        self.shared.lock().label()
    }

    /// Flip `enabled`. Enabling a halted poller clears the halt, so the next
    /// cycle re-attempts immediately. Does nothing once complete.
    ///
    /// Returns the new value of `enabled`.
    pub fn toggle(&self) -> bool {
        self.set_enabled(|enabled| !enabled)
    }

    pub fn pause(&self) {
        self.set_enabled(|_| false);
    }

    pub fn resume(&self) {
        self.set_enabled(|_| true);
    }

    // Reads and writes `enabled` under one lock.
    fn set_enabled(&self, next: impl FnOnce(bool) -> bool) -> bool {
        let (enabled, changed) = {
            let mut s = self.shared.lock();
            if s.complete || s.shutdown {
                return false;
            }
            let enabled = next(s.enabled);
            let changed = enabled != s.enabled;
            s.enabled = enabled;
            if changed && enabled {
                s.halted = false;
                s.resumes += 1;
            }
            (enabled, changed)
        };
        match (changed, enabled) {
            (false, _) => {}
            (true, true) => {
                info!("{}: resumed", self.name());
                self.shared.changed.notify_waiters();
            }
            (true, false) => info!("{}: paused", self.name()),
        }
        enabled
    }

    /// Ask the loop to exit at its next scheduling point.
    pub fn shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.changed.notify_waiters();
    }

    fn begin_cycle(&self) {
        let mut s = self.shared.lock();
        s.in_flight = true;
        s.cycles += 1;
    }

    fn end_cycle(&self) {
        self.shared.lock().in_flight = false;
    }

    fn halt(&self, err: &MonitorError) {
        let mut s = self.shared.lock();
        s.halted = true;
        s.enabled = false;
        s.failures += 1;
        s.last_error = Some(err.to_string());
    }

    fn mark_complete(&self) {
        let mut s = self.shared.lock();
        s.complete = true;
        s.enabled = false;
    }

    /// Wait until the loop may start a cycle, or must exit.
    async fn wait_runnable(&self) -> Option<PollerExit> {
        loop {
            // Registered before the check so a wakeup between check and await
            // is not lost.
            let notified = self.shared.changed.notified();
            {
                let s = self.shared.lock();
                if s.shutdown {
                    return Some(PollerExit::Shutdown);
                }
                if s.complete {
                    return Some(PollerExit::Complete);
                }
                if s.runnable() {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Sit out the delay between cycles. Returns early with `None` when the
    /// poller is paused and resumed again before the delay ends, so the next
    /// cycle starts right away.
    async fn wait_delay(&self, delay: Duration) -> Option<PollerExit> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let resumes = self.shared.lock().resumes;
        loop {
            let notified = self.shared.changed.notified();
            {
                let s = self.shared.lock();
                if s.shutdown {
                    return Some(PollerExit::Shutdown);
                }
                if s.runnable() && s.resumes != resumes {
                    return None;
                }
            }
            tokio::select! {
                _ = &mut sleep => return None,
                _ = notified => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Drives one merge model from one snapshot source.
pub struct Poller<S, M> {
    source: S,
    model: M,
    delay: Duration,
    handle: PollerHandle,
}

impl<S, M> Poller<S, M>
where
    S: SnapshotSource,
    M: MergeModel,
{
    /// A poller that starts enabled. `delay` is the pause between the end of
    /// one merge and the next fetch.
    pub fn new(name: impl Into<String>, source: S, model: M, delay: Duration) -> Self {
        let handle = PollerHandle {
            shared: Arc::new(Shared {
                name: name.into(),
                status: Mutex::new(PollerStatus {
                    enabled: true,
                    ..Default::default()
                }),
                changed: Notify::new(),
            }),
        };
        Self {
            source,
            model,
            delay,
            handle,
        }
    }

    pub fn handle(&self) -> PollerHandle {
        self.handle.clone()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Poll until the job completes or the handle asks for shutdown.
    ///
    /// A failed cycle halts the poller; the loop then sleeps until someone
    /// resumes it through the handle.
    pub async fn run(&mut self) -> PollerExit {
        info!(
            "{}: polling {} every {:?}",
            self.handle.name(),
            self.source.describe(),
            self.delay
        );
        loop {
            if let Some(exit) = self.handle.wait_runnable().await {
                return exit;
            }

            match self.cycle().await {
                CycleOutcome::Continue => {}
                CycleOutcome::Complete => {
                    self.handle.mark_complete();
                    info!("{}: job complete, polling finished", self.handle.name());
                    return PollerExit::Complete;
                }
                CycleOutcome::Failed(err) => {
                    error!("{}: halted on {} error: {err}", self.handle.name(), err.kind());
                    self.handle.halt(&err);
                    continue;
                }
            }

            if let Some(exit) = self.handle.wait_delay(self.delay).await {
                return exit;
            }
        }
    }

    /// One fetch + merge, regardless of the enabled flag.
    pub async fn cycle(&mut self) -> CycleOutcome {
        self.handle.begin_cycle();
        debug!("{}: cycle {}", self.handle.name(), self.handle.status().cycles);
        let result = self.fetch_and_merge().await;
        self.handle.end_cycle();
        match result {
            Ok(Progress::Continue) => CycleOutcome::Continue,
            Ok(Progress::Complete) => CycleOutcome::Complete,
            Err(err) => CycleOutcome::Failed(err),
        }
    }

    async fn fetch_and_merge(&mut self) -> Result<Progress> {
        let body = self.source.fetch().await?;
        let snapshot: M::Snapshot = serde_json::from_slice(&body)?;
        self.model.apply(snapshot)
    }
}
