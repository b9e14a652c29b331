use foundation::LatLon;

use crate::camera::{CameraCommand, CameraTarget, CameraView, MapRenderer, fit_zoom};

/// Renderer stand-in for tests, simulations and the CLI.
///
/// Commands take effect immediately unless the renderer is lagging, in which
/// case the next `lag` commands are recorded but dropped. Zoom is clamped to
/// the renderer's supported range, like a real tile map.
#[derive(Debug, Clone)]
pub struct SimulatedRenderer {
    viewport_px: [f64; 2],
    min_zoom: f64,
    max_zoom: f64,
    lag: u32,
    view: CameraView,
    applied: Vec<CameraCommand>,
}

impl SimulatedRenderer {
    pub fn new(viewport_px: [f64; 2]) -> Self {
        Self {
            viewport_px,
            min_zoom: 0.0,
            max_zoom: 18.0,
            lag: 0,
            view: CameraView::around(LatLon::new(20.0, 0.0), 2.0, viewport_px),
            applied: Vec::new(),
        }
    }

    pub fn with_zoom_range(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self.view = self.place(self.view.center, self.view.zoom);
        self
    }

    /// Drops the next `n` commands.
    pub fn lag(&mut self, n: u32) {
        self.lag = n;
    }

    /// Every command received, including dropped ones.
    pub fn applied(&self) -> &[CameraCommand] {
        &self.applied
    }

    fn place(&self, center: LatLon, zoom: f64) -> CameraView {
        let zoom = if zoom.is_finite() { zoom } else { self.max_zoom };
        CameraView::around(center, zoom.clamp(self.min_zoom, self.max_zoom), self.viewport_px)
    }
}

impl MapRenderer for SimulatedRenderer {
    fn apply(&mut self, command: &CameraCommand) {
        self.applied.push(*command);
        if self.lag > 0 {
            self.lag -= 1;
            return;
        }
        self.view = match command.target {
            CameraTarget::Center { center, zoom } => self.place(center, zoom),
            CameraTarget::Bounds { bounds, max_zoom } => {
                let zoom = fit_zoom(&bounds, self.viewport_px, 0.0).min(max_zoom);
                self.place(bounds.center(), zoom)
            }
        };
    }

    fn view(&self) -> CameraView {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TransitionId, ViewportMode};
    use foundation::GeoBounds;

    fn command(target: CameraTarget) -> CameraCommand {
        CameraCommand {
            transition: TransitionId(1),
            attempt: 1,
            mode: ViewportMode::FitAll,
            target,
        }
    }

    #[test]
    fn bounds_target_is_fitted_and_capped() {
        let mut r = SimulatedRenderer::new([1024.0, 768.0]);
        let bounds = GeoBounds::new(30.0, -80.0, 45.0, -60.0);
        r.apply(&command(CameraTarget::Bounds {
            bounds,
            max_zoom: 20.0,
        }));
        let v = r.view();
        assert!(v.bounds.contains(LatLon::new(30.0, -80.0)));
        assert!(v.bounds.contains(LatLon::new(45.0, -60.0)));

        let point = GeoBounds::from_point(LatLon::new(1.0, 1.0));
        r.apply(&command(CameraTarget::Bounds {
            bounds: point,
            max_zoom: 6.0,
        }));
        assert_eq!(r.view().zoom, 6.0);
    }

    #[test]
    fn lag_drops_commands_but_records_them() {
        let mut r = SimulatedRenderer::new([800.0, 600.0]);
        let before = r.view();
        r.lag(1);
        let target = CameraTarget::Center {
            center: LatLon::new(51.5, -0.1),
            zoom: 5.0,
        };
        r.apply(&command(target));
        assert_eq!(r.view(), before);
        r.apply(&command(target));
        assert_eq!(r.view().zoom, 5.0);
        assert_eq!(r.applied().len(), 2);
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut r = SimulatedRenderer::new([800.0, 600.0]).with_zoom_range(0.0, 3.0);
        r.apply(&command(CameraTarget::Center {
            center: LatLon::new(0.0, 0.0),
            zoom: 9.0,
        }));
        assert_eq!(r.view().zoom, 3.0);
    }
}
