use runtime::{Clock, Event, ManualClock, Millis};

use crate::camera::{CameraCommand, MapRenderer};
use crate::controller::{Settlement, ViewportController, ViewportError, ViewportEvent};
use crate::driver::{Dispatcher, DriverReport};

/// Deterministic driver: time moves only through [`ManualDriver::advance`].
pub struct ManualDriver<R> {
    clock: ManualClock,
    dispatcher: Dispatcher<R>,
}

impl<R: MapRenderer> ManualDriver<R> {
    pub fn new(controller: ViewportController, renderer: R) -> Self {
        Self {
            clock: ManualClock::new(),
            dispatcher: Dispatcher::new(controller, renderer),
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn controller(&self) -> &ViewportController {
        self.dispatcher.controller()
    }

    pub fn renderer(&self) -> &R {
        self.dispatcher.renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        self.dispatcher.renderer_mut()
    }

    pub fn commands(&self) -> &[Event<CameraCommand>] {
        self.dispatcher.commands()
    }

    pub fn settlements(&self) -> &[Settlement] {
        self.dispatcher.settlements()
    }

    pub fn submit(&mut self, event: ViewportEvent) -> Result<(), ViewportError> {
        self.dispatcher.dispatch(self.clock.now(), event)
    }

    /// Moves the clock forward by `ms`, firing verifications as they fall due.
    pub fn advance(&mut self, ms: u64) -> Result<(), ViewportError> {
        let target = self.clock.now().saturating_add(ms);
        while let Some(due) = self.dispatcher.next_due()
            && due <= target
        {
            let now = self.clock.advance_to(due);
            self.dispatcher.fire_due(now)?;
        }
        self.clock.advance_to(target);
        Ok(())
    }

    /// Fires timers until nothing is pending. Terminates because every
    /// transition settles within its attempt budget.
    pub fn run_until_idle(&mut self) -> Result<(), ViewportError> {
        while let Some(due) = self.dispatcher.next_due() {
            let now = self.clock.advance_to(due);
            self.dispatcher.fire_due(now)?;
        }
        Ok(())
    }

    pub fn into_report(self) -> DriverReport<R> {
        self.dispatcher.into_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewportConfig;
    use crate::controller::{Convergence, SearchResolution};
    use crate::sim::SimulatedRenderer;
    use crate::state::{TransitionId, ViewportMode};
    use foundation::LatLon;
    use pretty_assertions::assert_eq;

    const NYC: LatLon = LatLon::new(40.7, -74.0);
    const LONDON: LatLon = LatLon::new(51.5, -0.1);

    fn driver(renderer: SimulatedRenderer) -> ManualDriver<SimulatedRenderer> {
        let controller = ViewportController::new(ViewportConfig::default()).unwrap();
        ManualDriver::new(controller, renderer)
    }

    fn search(point: LatLon) -> ViewportEvent {
        ViewportEvent::SearchCommitted(SearchResolution {
            matches: vec![point],
            fallback: None,
        })
    }

    #[test]
    fn lagging_renderer_converges_on_retry() {
        let mut renderer = SimulatedRenderer::new([1024.0, 768.0]);
        renderer.lag(1);
        let mut d = driver(renderer);

        d.submit(search(LONDON)).unwrap();
        d.advance(149).unwrap();
        assert!(d.settlements().is_empty());
        assert_eq!(d.commands().len(), 1);

        d.advance(1).unwrap();
        assert_eq!(d.commands().len(), 2);
        assert_eq!(d.commands()[1].at, Millis(150));

        d.run_until_idle().unwrap();
        assert_eq!(d.now(), Millis(450));
        let s = d.settlements()[0];
        assert_eq!(s.convergence, Convergence::Verified);
        assert_eq!(s.attempts, 2);
        assert_eq!(d.controller().state().last_verified_zoom, 5.0);
    }

    #[test]
    fn zoom_limited_renderer_settles_best_effort() {
        let renderer = SimulatedRenderer::new([1024.0, 768.0]).with_zoom_range(0.0, 3.0);
        let mut d = driver(renderer);

        d.submit(search(LONDON)).unwrap();
        d.run_until_idle().unwrap();

        assert_eq!(d.now(), Millis(150 + 300 + 600 + 1000));
        assert_eq!(d.commands().len(), 4);
        let s = d.settlements()[0];
        assert_eq!(s.convergence, Convergence::BestEffort);
        assert_eq!(s.view.zoom, 3.0);
        assert_eq!(d.controller().state().mode, ViewportMode::LockedTarget);
        assert_eq!(d.controller().metrics().counter("viewport.best_effort"), 1);
    }

    #[test]
    fn user_lock_across_the_antimeridian_verifies_first_time() {
        let mut d = driver(SimulatedRenderer::new([1024.0, 768.0]));
        d.submit(ViewportEvent::SignalsChanged {
            positions: vec![LatLon::new(-17.8, -179.9)],
        })
        .unwrap();
        d.run_until_idle().unwrap();
        d.submit(ViewportEvent::UserLocated {
            position: LatLon::new(-17.8, 179.9),
        })
        .unwrap();
        d.run_until_idle().unwrap();

        let s = d.settlements()[1];
        assert_eq!(s.mode, ViewportMode::LockedUser);
        assert_eq!(s.convergence, Convergence::Verified);
        assert_eq!(s.attempts, 1);
        assert_eq!(s.view.zoom, 10.0);
        assert!(s.view.bounds.crosses_antimeridian());
        assert!(s.view.bounds.lon_span() < 2.0);
    }

    #[test]
    fn new_search_cancels_pending_verification() {
        let mut d = driver(SimulatedRenderer::new([1024.0, 768.0]));
        d.submit(search(NYC)).unwrap();
        d.advance(50).unwrap();
        d.submit(search(LONDON)).unwrap();
        d.run_until_idle().unwrap();

        let settled: Vec<TransitionId> = d.settlements().iter().map(|s| s.transition).collect();
        assert_eq!(settled, vec![TransitionId(2)]);
        assert_eq!(d.now(), Millis(200));
        assert_eq!(d.controller().metrics().counter("viewport.stale_verify"), 0);
        assert_eq!(d.controller().state().anchor, Some(LONDON));
    }

    #[test]
    fn report_carries_final_state() {
        let mut d = driver(SimulatedRenderer::new([1024.0, 768.0]));
        d.submit(ViewportEvent::SignalsChanged {
            positions: vec![NYC, LONDON],
        })
        .unwrap();
        d.run_until_idle().unwrap();
        d.submit(ViewportEvent::ResetRequested).unwrap();
        d.run_until_idle().unwrap();

        let report = d.into_report();
        assert_eq!(report.state.mode, ViewportMode::FitAll);
        assert_eq!(report.settlements.len(), 2);
        assert!(
            report
                .settlements
                .iter()
                .all(|s| s.convergence == Convergence::Verified)
        );
        assert_eq!(report.renderer.applied().len(), 2);
    }
}
