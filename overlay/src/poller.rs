//! The background fetch, reconcile and apply loop.

use std::marker::PhantomData;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nws::{FetchError, NwsAlertsAPI, Snapshot};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::AlertConfig;
use crate::queue::{round_trip, RenderQueue};
use crate::reconcile::{reconcile, unchanged, ReconcilePlan};
use crate::registry::AlertLayer;
use crate::FatalError;

/// Where snapshots come from
#[allow(async_fn_in_trait)]
pub trait SnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

impl SnapshotSource for NwsAlertsAPI {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.fetch_active_alerts().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Shutdown,
    /// The cycle budget is spent
    MaxCycles,
    /// The render side went away
    RenderClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    /// Fetches attempted
    pub cycles: u64,
    /// Non-empty plans handed to the render side
    pub applied: u64,
    pub failed_fetches: u64,
    pub stop: StopReason,
}

/// Timing for the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub initial_delay: Duration,
    pub max_cycles: u64,
}

impl From<&AlertConfig> for PollerSettings {
    fn from(config: &AlertConfig) -> Self {
        Self {
            interval: config.fetch_interval(),
            initial_delay: config.initial_delay(),
            max_cycles: config.max_cycles(),
        }
    }
}

#[derive(Debug)]
enum PollState {
    Idle,
    Fetching,
    Reconciling { snapshot: Snapshot },
    Applying(ReconcilePlan),
    Sleeping,
    Stopped(StopReason),
}

/// Drives one `AlertLayer` on the render thread from a `SnapshotSource`.
///
/// At most one cycle is in flight: the loop waits for each apply to finish
/// before it sleeps.
pub struct AlertPoller<Src, Q, L> {
    settings: PollerSettings,
    source: Src,
    queue: Q,
    shutdown: watch::Receiver<bool>,
    cycles: u64,
    applied: u64,
    failed_fetches: u64,
    cycle_start: Instant,
    layer: PhantomData<fn(&mut L)>,
}

impl<Src, Q, L> AlertPoller<Src, Q, L>
where
    Src: SnapshotSource,
    Q: RenderQueue<L>,
    L: AlertLayer + 'static,
{
    /// The loop stops when `shutdown` turns true or its sender is dropped.
    pub fn new(settings: PollerSettings, source: Src, queue: Q, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            settings,
            source,
            queue,
            shutdown,
            cycles: 0,
            applied: 0,
            failed_fetches: 0,
            cycle_start: Instant::now(),
            layer: PhantomData,
        }
    }

    pub async fn run(mut self) -> PollSummary {
        info!(
            "Alert poller started: every {:?}, at most {} cycles",
            self.settings.interval, self.settings.max_cycles
        );

        let mut state = PollState::Idle;
        loop {
            state = match state {
                PollState::Idle => self.idle().await,
                PollState::Fetching => self.fetch().await,
                PollState::Reconciling { snapshot } => self.reconcile(snapshot).await,
                PollState::Applying(plan) => self.apply(plan).await,
                PollState::Sleeping => self.sleep().await,
                PollState::Stopped(stop) => {
                    let summary = PollSummary {
                        cycles: self.cycles,
                        applied: self.applied,
                        failed_fetches: self.failed_fetches,
                        stop,
                    };
                    info!("Alert poller stopped ({:?}) after {} cycles", stop, self.cycles);
                    return summary;
                }
            };
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait until `deadline`; false if shutdown came first. A deadline past
    /// what `Instant` can hold only ends on shutdown.
    async fn wait_until(&mut self, deadline: Option<Instant>) -> bool {
        if self.shutdown_requested() {
            return false;
        }

        let Some(deadline) = deadline else {
            warn!("Wait is out of range, idling until shutdown");
            let _ = self.shutdown.changed().await;
            return false;
        };

        tokio::select! {
            biased;
            _ = self.shutdown.changed() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }

    /// Run `f` against the layer on the render thread. A shutdown stops the
    /// wait; the job itself may still run.
    async fn on_render<R, F>(&mut self, f: F) -> Result<R, PollState>
    where
        F: FnOnce(&mut L) -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::select! {
            biased;
            _ = self.shutdown.changed() => Err(PollState::Stopped(StopReason::Shutdown)),
            result = round_trip(&self.queue, f) => result.map_err(|_| PollState::Stopped(StopReason::RenderClosed)),
        }
    }

    async fn idle(&mut self) -> PollState {
        debug!("Idle for {:?} before the first fetch", self.settings.initial_delay);
        if self.wait_until(Instant::now().checked_add(self.settings.initial_delay)).await {
            PollState::Fetching
        } else {
            PollState::Stopped(StopReason::Shutdown)
        }
    }

    async fn fetch(&mut self) -> PollState {
        if self.shutdown_requested() {
            return PollState::Stopped(StopReason::Shutdown);
        }
        if self.cycles >= self.settings.max_cycles {
            return PollState::Stopped(StopReason::MaxCycles);
        }

        self.cycles += 1;
        self.cycle_start = Instant::now();
        debug!("Cycle {}: fetching", self.cycles);

        let result = tokio::select! {
            biased;
            _ = self.shutdown.changed() => {
                info!("Shutdown requested during fetch, discarding result");
                return PollState::Stopped(StopReason::Shutdown);
            }
            result = self.source.fetch() => result,
        };

        if self.shutdown_requested() {
            return PollState::Stopped(StopReason::Shutdown);
        }

        match result {
            Ok(snapshot) => PollState::Reconciling { snapshot },
            Err(e) => {
                self.failed_fetches += 1;
                warn!("Cycle {}: alert fetch failed, keeping current overlay: {}", self.cycles, e);
                PollState::Sleeping
            }
        }
    }

    async fn reconcile(&mut self, snapshot: Snapshot) -> PollState {
        debug!("Cycle {}: reconciling {} alerts", self.cycles, snapshot.len());

        let previous = match self.on_render(|layer: &mut L| layer.current_ids()).await {
            Ok(ids) => ids,
            Err(stopped) => return stopped,
        };

        let plan = reconcile(&previous, &snapshot);
        info!(
            "Cycle {}: {} active, {} unchanged, {} to add, {} to remove",
            self.cycles,
            snapshot.len(),
            unchanged(&previous, &snapshot),
            plan.to_add.len(),
            plan.to_remove.len()
        );

        if plan.is_empty() {
            PollState::Sleeping
        } else {
            PollState::Applying(plan)
        }
    }

    async fn apply(&mut self, plan: ReconcilePlan) -> PollState {
        debug!("Cycle {}: applying plan", self.cycles);

        match self.on_render(move |layer: &mut L| layer.apply(plan)).await {
            Ok(report) => {
                self.applied += 1;
                debug!(
                    "Cycle {}: drew {}, text-only {}, removed {}, skipped {}",
                    self.cycles, report.drawn, report.text_only, report.removed, report.skipped
                );
                if !report.is_clean() {
                    warn!("Cycle {}: {} overlay changes failed", self.cycles, report.failures.len());
                }
                PollState::Sleeping
            }
            Err(stopped) => stopped,
        }
    }

    async fn sleep(&mut self) -> PollState {
        if self.cycles >= self.settings.max_cycles {
            return PollState::Stopped(StopReason::MaxCycles);
        }

        // Cadence is measured start to start
        let next = self.cycle_start.checked_add(self.settings.interval);
        if let Some(next) = next {
            debug!("Sleeping {:?}", next.saturating_duration_since(Instant::now()));
        }

        if self.wait_until(next).await {
            PollState::Fetching
        } else {
            PollState::Stopped(StopReason::Shutdown)
        }
    }
}

/// A running poller thread
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    thread: JoinHandle<PollSummary>,
}

impl PollerHandle {
    /// Ask the loop to stop; it finishes the job it is waiting on, if any
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to stop
    pub fn join(self) -> thread::Result<PollSummary> {
        self.thread.join()
    }
}

/// Start the polling loop on its own thread with a single-threaded runtime.
///
/// The runtime is built before the thread starts so that a failure surfaces
/// here rather than in the background.
pub fn spawn_alert_poller<Src, Q, L>(config: &AlertConfig, source: Src, queue: Q) -> Result<PollerHandle, FatalError>
where
    Src: SnapshotSource + Send + 'static,
    Q: RenderQueue<L>,
    L: AlertLayer + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(FatalError::Runtime)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = AlertPoller::new(PollerSettings::from(config), source, queue, shutdown_rx);

    let thread = thread::Builder::new()
        .name("alert-poller".to_string())
        .spawn(move || runtime.block_on(poller.run()))
        .map_err(FatalError::Spawn)?;

    Ok(PollerHandle {
        shutdown: shutdown_tx,
        thread,
    })
}
