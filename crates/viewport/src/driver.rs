//! Effect execution and the tokio event loop.
//!
//! [`Dispatcher`] owns the controller, the renderer and the pending verify
//! timers. It is clock-agnostic: callers pass `now`. The tokio loop maps
//! `tokio::time::Instant` onto [`Millis`]; [`crate::ManualDriver`] uses a
//! [`runtime::ManualClock`].

use foundation::LatLon;
use runtime::{Event, EventBus, Millis, MetricsSnapshot, TimerQueue};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};

use crate::camera::{CameraCommand, MapRenderer};
use crate::controller::{
    Effect, SearchResolution, Settlement, VerifyRequest, ViewportController, ViewportError,
    ViewportEvent,
};
use crate::state::ViewportState;

pub struct Dispatcher<R> {
    controller: ViewportController,
    renderer: R,
    timers: TimerQueue<VerifyRequest>,
    commands: EventBus<CameraCommand>,
    settlements: Vec<Settlement>,
}

impl<R: MapRenderer> Dispatcher<R> {
    pub fn new(controller: ViewportController, renderer: R) -> Self {
        Self {
            controller,
            renderer,
            timers: TimerQueue::new(),
            commands: EventBus::new(),
            settlements: Vec::new(),
        }
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Every command sent to the renderer, stamped with dispatch time.
    pub fn commands(&self) -> &[Event<CameraCommand>] {
        self.commands.events()
    }

    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.timers.next_due()
    }

    pub fn dispatch(&mut self, now: Millis, event: ViewportEvent) -> Result<(), ViewportError> {
        let effects = self.controller.handle(event)?;
        self.execute(now, effects);
        Ok(())
    }

    /// Runs every verification due at or before `now`; returns how many ran.
    pub fn fire_due(&mut self, now: Millis) -> Result<usize, ViewportError> {
        let mut fired = 0;
        while let Some((_, _, req)) = self.timers.pop_due(now) {
            let observed = self.renderer.view();
            self.dispatch(
                now,
                ViewportEvent::VerifyDue {
                    transition: req.transition,
                    attempt: req.attempt,
                    observed,
                },
            )?;
            fired += 1;
        }
        Ok(fired)
    }

    fn execute(&mut self, now: Millis, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Apply(command) => {
                    self.renderer.apply(&command);
                    self.commands.emit(now, command);
                }
                Effect::ScheduleVerify(req) => {
                    // Verifications of superseded transitions would be no-ops anyway.
                    self.timers.cancel_where(|r| r.transition != req.transition);
                    self.timers.schedule(now.saturating_add(req.after_ms), req);
                }
                Effect::Settled(settlement) => self.settlements.push(settlement),
            }
        }
    }

    pub fn into_report(self) -> DriverReport<R> {
        DriverReport {
            state: self.controller.state().clone(),
            metrics: self.controller.metrics().snapshot(),
            commands: self.commands.into_events(),
            settlements: self.settlements,
            renderer: self.renderer,
        }
    }
}

/// What a finished driver leaves behind.
#[derive(Debug)]
pub struct DriverReport<R> {
    pub renderer: R,
    pub commands: Vec<Event<CameraCommand>>,
    pub settlements: Vec<Settlement>,
    pub state: ViewportState,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Error)]
#[error("viewport driver has shut down")]
pub struct DriverClosed;

/// Sending side of a running driver. Dropping every handle stops the driver
/// once its pending verifications have run.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::UnboundedSender<ViewportEvent>,
}

impl DriverHandle {
    pub fn send(&self, event: ViewportEvent) -> Result<(), DriverClosed> {
        self.tx.send(event).map_err(|_| DriverClosed)
    }

    pub fn signals_changed(&self, positions: Vec<LatLon>) -> Result<(), DriverClosed> {
        self.send(ViewportEvent::SignalsChanged { positions })
    }

    pub fn user_located(&self, position: LatLon) -> Result<(), DriverClosed> {
        self.send(ViewportEvent::UserLocated { position })
    }

    pub fn search(&self, resolution: SearchResolution) -> Result<(), DriverClosed> {
        self.send(ViewportEvent::SearchCommitted(resolution))
    }

    pub fn reset(&self) -> Result<(), DriverClosed> {
        self.send(ViewportEvent::ResetRequested)
    }
}

/// Spawns [`run_driver`] on the current tokio runtime.
pub fn spawn_driver<R>(
    controller: ViewportController,
    renderer: R,
) -> (DriverHandle, JoinHandle<DriverReport<R>>)
where
    R: MapRenderer + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_driver(controller, renderer, rx));
    (DriverHandle { tx }, task)
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Single-writer loop: host events and verify timers are handled one at a
/// time, in arrival order.
pub async fn run_driver<R: MapRenderer>(
    controller: ViewportController,
    renderer: R,
    mut rx: mpsc::UnboundedReceiver<ViewportEvent>,
) -> DriverReport<R> {
    let start = Instant::now();
    let now = || Millis(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));
    let mut dispatcher = Dispatcher::new(controller, renderer);
    let mut open = true;

    loop {
        let next = dispatcher.next_due();
        if !open && next.is_none() {
            break;
        }
        let deadline = next.map(|due| start + Duration::from_millis(due.0));

        tokio::select! {
            received = rx.recv(), if open => match received {
                Some(event) => {
                    if let Err(err) = dispatcher.dispatch(now(), event) {
                        tracing::debug!(error = %err, "driver dropped event");
                    }
                }
                None => {
                    tracing::debug!(pending = dispatcher.timers.len(), "driver input closed");
                    open = false;
                }
            },
            _ = wait_until(deadline) => {
                if let Err(err) = dispatcher.fire_due(now()) {
                    tracing::debug!(error = %err, "verification failed");
                }
            }
        }
    }

    dispatcher.into_report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraTarget;
    use crate::config::ViewportConfig;
    use crate::controller::Convergence;
    use crate::sim::SimulatedRenderer;
    use crate::state::{TransitionId, ViewportMode};
    use pretty_assertions::assert_eq;

    const NYC: LatLon = LatLon::new(40.7, -74.0);
    const LONDON: LatLon = LatLon::new(51.5, -0.1);
    const LA: LatLon = LatLon::new(34.05, -118.24);

    fn controller() -> ViewportController {
        ViewportController::new(ViewportConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn user_lock_supersedes_fit_and_settles() {
        let (handle, task) = spawn_driver(controller(), SimulatedRenderer::new([1024.0, 768.0]));
        handle.signals_changed(vec![NYC, LONDON]).unwrap();
        handle.user_located(LA).unwrap();
        drop(handle);

        let report = task.await.unwrap();
        assert_eq!(report.commands.len(), 2);
        assert_eq!(report.settlements.len(), 1);

        let settled = report.settlements[0];
        assert_eq!(settled.transition, TransitionId(2));
        assert_eq!(settled.mode, ViewportMode::LockedUser);
        assert_eq!(settled.convergence, Convergence::Verified);
        assert_eq!(report.state.mode, ViewportMode::LockedUser);
        assert!(report.state.is_settled());
        assert!(report.metrics.counters.contains(&("viewport.verified", 1)));
        assert!(!report.metrics.counters.iter().any(|(k, _)| *k == "viewport.stale_verify"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_run_on_the_tokio_clock() {
        let mut renderer = SimulatedRenderer::new([1024.0, 768.0]);
        renderer.lag(2);
        let (handle, task) = spawn_driver(controller(), renderer);
        handle
            .search(SearchResolution {
                matches: vec![],
                fallback: Some(LONDON),
            })
            .unwrap();
        drop(handle);

        let report = task.await.unwrap();
        let times: Vec<u64> = report.commands.iter().map(|e| e.at.0).collect();
        // Applied at 0, re-applied after the 150 ms and 300 ms verifications.
        assert_eq!(times, vec![0, 150, 450]);
        assert_eq!(report.settlements[0].attempts, 3);
        assert_eq!(report.settlements[0].convergence, Convergence::Verified);
        assert_eq!(
            report.renderer.view().center,
            match report.commands[2].payload.target {
                CameraTarget::Center { center, .. } => center,
                CameraTarget::Bounds { bounds, .. } => bounds.center(),
            }
        );
    }

    #[tokio::test]
    async fn closed_driver_rejects_events() {
        let (handle, task) = spawn_driver(controller(), SimulatedRenderer::new([800.0, 600.0]));
        let other = handle.clone();
        drop(handle);
        drop(other);
        let report = task.await.unwrap();
        assert!(report.commands.is_empty());

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let dead = DriverHandle { tx };
        assert!(dead.reset().is_err());
    }
}
