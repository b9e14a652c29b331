use foundation::LatLon;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraCommand, CameraView};

/// Camera modes, declared in ascending priority so `Ord` follows priority.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportMode {
    Default,
    FitAll,
    LockedTarget,
    LockedUser,
}

impl ViewportMode {
    pub fn is_locked(self) -> bool {
        matches!(self, ViewportMode::LockedTarget | ViewportMode::LockedUser)
    }
}

impl std::fmt::Display for ViewportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViewportMode::Default => "default",
            ViewportMode::FitAll => "fit_all",
            ViewportMode::LockedTarget => "locked_target",
            ViewportMode::LockedUser => "locked_user",
        };
        f.write_str(s)
    }
}

/// Identity of one camera-targeting transition. Later transitions supersede
/// earlier ones; verification for anything but the current id is stale.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub u64);

/// What a move has to achieve to count as converged.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub anchor: LatLon,
    pub min_zoom: f64,
    /// Extra positions that must also be in view (e.g. signals near the user).
    pub keep_visible: Vec<LatLon>,
}

/// Result of checking one observed view against a [`Goal`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Check {
    // Field order is the ranking used to pick the best failed attempt.
    pub anchor_visible: bool,
    pub zoom_ok: bool,
    pub visible: usize,
    pub required: usize,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.anchor_visible && self.zoom_ok && self.visible == self.required
    }
}

impl Goal {
    pub fn check(&self, view: &CameraView) -> Check {
        let zoom_ok = view.zoom.is_finite() && view.zoom + 1e-9 >= self.min_zoom;
        Check {
            anchor_visible: view.bounds.contains(self.anchor),
            zoom_ok,
            visible: self
                .keep_visible
                .iter()
                .filter(|p| view.bounds.contains(**p))
                .count(),
            required: self.keep_visible.len(),
        }
    }
}

/// An in-flight move awaiting verification.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub command: CameraCommand,
    pub goal: Goal,
    pub max_attempts: u32,
    /// Best observation so far, kept for best-effort acceptance.
    pub best: Option<(Check, CameraView)>,
}

impl PendingMove {
    pub fn transition(&self) -> TransitionId {
        self.command.transition
    }
}

/// The controller's complete mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub mode: ViewportMode,
    /// Lock anchor (user position or search target); `None` when unlocked.
    pub anchor: Option<LatLon>,
    pub last_verified_zoom: f64,
    /// Attempt number of the current (or last) move, 1-based.
    pub attempt: u32,
    pub pending: Option<PendingMove>,
    /// Last transition id handed out.
    pub generation: TransitionId,
}

impl ViewportState {
    pub fn initial(default_zoom: f64) -> Self {
        Self {
            mode: ViewportMode::Default,
            anchor: None,
            last_verified_zoom: default_zoom,
            attempt: 0,
            pending: None,
            generation: TransitionId(0),
        }
    }

    pub fn active_transition(&self) -> Option<TransitionId> {
        self.pending.as_ref().map(PendingMove::transition)
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::GeoBounds;

    fn view(bounds: GeoBounds, zoom: f64) -> CameraView {
        CameraView {
            center: bounds.center(),
            zoom,
            bounds,
        }
    }

    #[test]
    fn priority_order_matches_declaration() {
        assert!(ViewportMode::LockedUser > ViewportMode::LockedTarget);
        assert!(ViewportMode::LockedTarget > ViewportMode::FitAll);
        assert!(ViewportMode::FitAll > ViewportMode::Default);
        assert!(ViewportMode::LockedTarget.is_locked());
        assert!(!ViewportMode::FitAll.is_locked());
    }

    #[test]
    fn check_requires_anchor_zoom_and_extras() {
        let goal = Goal {
            anchor: LatLon::new(10.0, 10.0),
            min_zoom: 4.0,
            keep_visible: vec![LatLon::new(12.0, 12.0)],
        };
        let wide = GeoBounds::new(0.0, 0.0, 20.0, 20.0);
        assert!(goal.check(&view(wide, 4.0)).passed());
        assert!(!goal.check(&view(wide, 3.5)).passed());

        let tight = GeoBounds::new(9.0, 9.0, 11.0, 11.0);
        let c = goal.check(&view(tight, 6.0));
        assert!(c.anchor_visible);
        assert_eq!((c.visible, c.required), (0, 1));
        assert!(!c.passed());
    }

    #[test]
    fn checks_rank_anchor_visibility_first() {
        let anchored = Check {
            anchor_visible: true,
            zoom_ok: false,
            visible: 0,
            required: 2,
        };
        let zoomed = Check {
            anchor_visible: false,
            zoom_ok: true,
            visible: 2,
            required: 2,
        };
        assert!(anchored > zoomed);
    }
}
