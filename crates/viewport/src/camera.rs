use foundation::{GeoBounds, LatLon};
use serde::{Deserialize, Serialize};

use crate::state::{TransitionId, ViewportMode};

/// Web-map tile edge in pixels; zoom `z` shows `256 * 2^z` px of world width.
pub const TILE_PX: f64 = 256.0;

/// Where the renderer should point the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraTarget {
    Center { center: LatLon, zoom: f64 },
    Bounds { bounds: GeoBounds, max_zoom: f64 },
}

/// Outbound instruction for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraCommand {
    pub transition: TransitionId,
    pub attempt: u32,
    pub mode: ViewportMode,
    pub target: CameraTarget,
}

/// What the renderer reports it is actually showing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub center: LatLon,
    pub zoom: f64,
    pub bounds: GeoBounds,
}

impl CameraView {
    /// View of a `viewport_px` canvas centered at `center`.
    ///
    /// Uses an equirectangular approximation (no Mercator stretch), which
    /// slightly overstates the visible latitude range away from the equator.
    pub fn around(center: LatLon, zoom: f64, viewport_px: [f64; 2]) -> Self {
        let deg_per_px = 360.0 / (TILE_PX * 2f64.powf(zoom));
        let half_lon = viewport_px[0] * 0.5 * deg_per_px;
        let half_lat = viewport_px[1] * 0.5 * deg_per_px;
        let bounds = GeoBounds::around(center, half_lat, half_lon);
        CameraView {
            center,
            zoom,
            bounds,
        }
    }
}

/// Highest zoom at which `bounds` fits inside the padded viewport.
///
/// Degenerate bounds fit at any zoom and return `f64::INFINITY`; callers clamp.
pub fn fit_zoom(bounds: &GeoBounds, viewport_px: [f64; 2], padding_px: f64) -> f64 {
    let usable_w = (viewport_px[0] - 2.0 * padding_px).max(1.0);
    let usable_h = (viewport_px[1] - 2.0 * padding_px).max(1.0);
    let fit = |usable: f64, span: f64| {
        if span <= f64::EPSILON {
            f64::INFINITY
        } else {
            (usable * 360.0 / (TILE_PX * span)).log2()
        }
    };
    fit(usable_w, bounds.lon_span()).min(fit(usable_h, bounds.lat_span()))
}

/// Anything that can move a map camera and report where it ended up.
///
/// Application is allowed to be lazy or partial; the controller verifies by
/// reading [`MapRenderer::view`] after a delay.
pub trait MapRenderer {
    fn apply(&mut self, command: &CameraCommand);
    fn view(&self) -> CameraView;
}

impl<R: MapRenderer + ?Sized> MapRenderer for Box<R> {
    fn apply(&mut self, command: &CameraCommand) {
        (**self).apply(command)
    }

    fn view(&self) -> CameraView {
        (**self).view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn zoom_zero_shows_whole_world_on_one_tile() {
        let v = CameraView::around(LatLon::new(0.0, 0.0), 0.0, [256.0, 128.0]);
        assert_eq!(v.bounds, GeoBounds::new(-90.0, -180.0, 90.0, 180.0));
    }

    #[test]
    fn each_zoom_level_halves_the_span() {
        let c = LatLon::new(10.0, 10.0);
        let a = CameraView::around(c, 4.0, [1024.0, 768.0]);
        let b = CameraView::around(c, 5.0, [1024.0, 768.0]);
        assert_close(a.bounds.lon_span(), 2.0 * b.bounds.lon_span(), 1e-9);
        assert!(b.bounds.contains(c));
    }

    #[test]
    fn fit_then_view_contains_bounds() {
        let bounds = GeoBounds::new(30.0, -80.0, 45.0, -60.0);
        let px = [1024.0, 768.0];
        let z = fit_zoom(&bounds, px, 0.0);
        let view = CameraView::around(bounds.center(), z, px);
        assert!(view.bounds.lon_span() + 1e-9 >= bounds.lon_span());
        assert!(view.bounds.lat_span() + 1e-9 >= bounds.lat_span());
    }

    #[test]
    fn view_near_the_antimeridian_wraps() {
        let v = CameraView::around(LatLon::new(-17.8, 180.0), 10.0, [1024.0, 768.0]);
        assert!(v.bounds.crosses_antimeridian());
        assert!(v.bounds.contains(LatLon::new(-17.8, 179.9)));
        assert!(v.bounds.contains(LatLon::new(-17.8, -179.9)));
        assert!(!v.bounds.contains(LatLon::new(-17.8, 0.0)));
    }

    #[test]
    fn crossing_bounds_fit_by_their_short_span() {
        let b = GeoBounds::new(-20.0, 178.0, -16.0, -178.0);
        let z = fit_zoom(&b, [1024.0, 768.0], 0.0);
        assert!(z > 5.0, "fitted zoom {z}");
    }

    #[test]
    fn degenerate_bounds_fit_at_any_zoom() {
        let b = GeoBounds::from_point(LatLon::new(1.0, 1.0));
        assert_eq!(fit_zoom(&b, [800.0, 600.0], 20.0), f64::INFINITY);
    }
}
