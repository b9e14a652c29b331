//! The camera state machine.
//!
//! [`transition`] is a pure function of `(state, signals, event, config)`; it
//! never touches a renderer or a clock. Everything with a side effect comes
//! back as [`Effect`]s for a driver to carry out, and verification arrives as
//! a later [`ViewportEvent::VerifyDue`].
//!
//! Mode priority, highest first: `LockedUser`, `LockedTarget`, `FitAll`,
//! `Default`. Only an explicit search or reset leaves a locked mode.

use foundation::{GeoBounds, GeoError, LatLon};
use layers::rank_within;
use runtime::Metrics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{CameraCommand, CameraTarget, CameraView};
use crate::config::ViewportConfig;
use crate::state::{Goal, PendingMove, TransitionId, ViewportMode, ViewportState};

/// What a committed search resolved to, as supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResolution {
    /// Positions of the signals matching the search.
    #[serde(default)]
    pub matches: Vec<LatLon>,
    /// Geocoded position to use when nothing matches.
    #[serde(default)]
    pub fallback: Option<LatLon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewportEvent {
    SignalsChanged { positions: Vec<LatLon> },
    UserLocated { position: LatLon },
    SearchCommitted(SearchResolution),
    ResetRequested,
    VerifyDue {
        transition: TransitionId,
        attempt: u32,
        observed: CameraView,
    },
}

/// Delayed verification a driver must schedule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub transition: TransitionId,
    pub attempt: u32,
    pub after_ms: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    Verified,
    BestEffort,
}

/// Final word on one transition.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub transition: TransitionId,
    pub mode: ViewportMode,
    pub convergence: Convergence,
    pub view: CameraView,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Apply(CameraCommand),
    ScheduleVerify(VerifyRequest),
    Settled(Settlement),
}

/// How a step changed the controller, for logging and metrics.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Outcome {
    Unchanged,
    Retargeted {
        from: ViewportMode,
        to: ViewportMode,
        transition: TransitionId,
    },
    Retry {
        transition: TransitionId,
        attempt: u32,
    },
    Settled(Settlement),
    Stale {
        transition: TransitionId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: ViewportState,
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

impl Step {
    fn unchanged(state: &ViewportState) -> Self {
        Step {
            state: state.clone(),
            effects: Vec::new(),
            outcome: Outcome::Unchanged,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ViewportError {
    #[error("invalid anchor: {0}")]
    InvalidAnchor(#[from] GeoError),
    #[error("search resolved to neither matches nor a fallback position")]
    NoSearchTarget,
    #[error("invalid viewport config: {0}")]
    InvalidConfig(String),
}

/// Positions that can be placed on the map; the rest are dropped silently.
pub fn placeable(points: &[LatLon]) -> Vec<LatLon> {
    points.iter().copied().filter(LatLon::is_valid).collect()
}

struct Plan {
    target: CameraTarget,
    goal: Goal,
}

fn corners(bounds: &GeoBounds) -> Vec<LatLon> {
    vec![
        LatLon::new(bounds.south, bounds.west),
        LatLon::new(bounds.north, bounds.east),
    ]
}

fn default_plan(config: &ViewportConfig) -> Plan {
    Plan {
        target: CameraTarget::Center {
            center: config.default_center,
            zoom: config.default_zoom,
        },
        goal: Goal {
            anchor: config.default_center,
            min_zoom: 0.0,
            keep_visible: Vec::new(),
        },
    }
}

fn fit_all_plan(signals: &[LatLon], config: &ViewportConfig) -> Option<Plan> {
    let bounds = GeoBounds::from_points(signals.iter().copied())?;
    Some(Plan {
        target: CameraTarget::Bounds {
            bounds: bounds.padded(config.fit_padding),
            max_zoom: config.fit_all_max_zoom,
        },
        goal: Goal {
            anchor: bounds.center(),
            min_zoom: config.fit_all_min_zoom,
            keep_visible: corners(&bounds),
        },
    })
}

fn user_plan(user: LatLon, signals: &[LatLon], config: &ViewportConfig) -> Plan {
    let nearby: Vec<LatLon> = rank_within(signals, user, config.user_nearby_radius_km, |_| true)
        .into_iter()
        .take(config.user_nearby_max)
        .map(|hit| *hit.item)
        .collect();

    if nearby.is_empty() {
        // Nothing to frame: stay wide rather than zooming onto an empty map.
        return Plan {
            target: CameraTarget::Center {
                center: user,
                zoom: config.user_fallback_zoom,
            },
            goal: Goal {
                anchor: user,
                min_zoom: config.user_fallback_min_zoom,
                keep_visible: Vec::new(),
            },
        };
    }

    let mut bounds = GeoBounds::from_point(user);
    for p in &nearby {
        bounds.extend(*p);
    }
    if bounds.is_degenerate() {
        // Every nearby signal sits on the user; there is no extent to fit.
        return Plan {
            target: CameraTarget::Center {
                center: user,
                zoom: config.user_max_zoom,
            },
            goal: Goal {
                anchor: user,
                min_zoom: config.user_nearby_min_zoom,
                keep_visible: nearby,
            },
        };
    }
    Plan {
        target: CameraTarget::Bounds {
            bounds: bounds.padded(config.fit_padding),
            max_zoom: config.user_max_zoom,
        },
        goal: Goal {
            anchor: user,
            min_zoom: config.user_nearby_min_zoom,
            keep_visible: nearby,
        },
    }
}

fn point_target_plan(point: LatLon, config: &ViewportConfig) -> Plan {
    Plan {
        target: CameraTarget::Center {
            center: point,
            zoom: config.target_default_zoom,
        },
        goal: Goal {
            anchor: point,
            min_zoom: config.target_point_min_zoom,
            keep_visible: Vec::new(),
        },
    }
}

fn search_plan(search: &SearchResolution, config: &ViewportConfig) -> Result<Plan, ViewportError> {
    for p in &search.matches {
        p.validate()?;
    }
    if let Some(bounds) = GeoBounds::from_points(search.matches.iter().copied()) {
        if bounds.is_degenerate() {
            return Ok(point_target_plan(bounds.center(), config));
        }
        return Ok(Plan {
            target: CameraTarget::Bounds {
                bounds: bounds.padded(config.fit_padding),
                max_zoom: config.target_max_zoom,
            },
            goal: Goal {
                anchor: bounds.center(),
                min_zoom: config.target_min_zoom,
                keep_visible: corners(&bounds),
            },
        });
    }
    let point = search.fallback.ok_or(ViewportError::NoSearchTarget)?.validate()?;
    Ok(point_target_plan(point, config))
}

/// Starts a new transition toward `plan`, superseding anything in flight.
fn begin(
    state: &ViewportState,
    mode: ViewportMode,
    anchor: Option<LatLon>,
    plan: Plan,
    config: &ViewportConfig,
) -> Step {
    let transition = TransitionId(state.generation.0 + 1);
    let command = CameraCommand {
        transition,
        attempt: 1,
        mode,
        target: plan.target,
    };
    let next = ViewportState {
        mode,
        anchor,
        last_verified_zoom: state.last_verified_zoom,
        attempt: 1,
        pending: Some(PendingMove {
            command,
            goal: plan.goal,
            max_attempts: config.max_attempts,
            best: None,
        }),
        generation: transition,
    };
    Step {
        state: next,
        effects: vec![
            Effect::Apply(command),
            Effect::ScheduleVerify(VerifyRequest {
                transition,
                attempt: 1,
                after_ms: config.verify_delay_ms(1),
            }),
        ],
        outcome: Outcome::Retargeted {
            from: state.mode,
            to: mode,
            transition,
        },
    }
}

fn reset(state: &ViewportState, signals: &[LatLon], config: &ViewportConfig) -> Step {
    let idle = state.mode == ViewportMode::Default
        && state.anchor.is_none()
        && state.pending.is_none()
        && signals.is_empty();
    if idle {
        return Step::unchanged(state);
    }
    match fit_all_plan(signals, config) {
        Some(plan) => begin(state, ViewportMode::FitAll, None, plan, config),
        None => begin(state, ViewportMode::Default, None, default_plan(config), config),
    }
}

fn verify(
    state: &ViewportState,
    transition: TransitionId,
    attempt: u32,
    observed: CameraView,
    config: &ViewportConfig,
) -> Step {
    let Some(pending) = state.pending.as_ref() else {
        return stale(state, transition);
    };
    if pending.transition() != transition || pending.command.attempt != attempt {
        return stale(state, transition);
    }

    let check = pending.goal.check(&observed);
    let best = match pending.best {
        Some((prev, view)) if prev >= check => (prev, view),
        _ => (check, observed),
    };

    let settle = |convergence: Convergence, view: CameraView| {
        let settlement = Settlement {
            transition,
            mode: state.mode,
            convergence,
            view,
            attempts: attempt,
        };
        Step {
            state: ViewportState {
                last_verified_zoom: view.zoom,
                attempt,
                pending: None,
                ..state.clone()
            },
            effects: vec![Effect::Settled(settlement)],
            outcome: Outcome::Settled(settlement),
        }
    };

    if check.passed() {
        return settle(Convergence::Verified, observed);
    }
    if attempt >= pending.max_attempts {
        return settle(Convergence::BestEffort, best.1);
    }

    let next_attempt = attempt + 1;
    let command = CameraCommand {
        attempt: next_attempt,
        ..pending.command
    };
    Step {
        state: ViewportState {
            attempt: next_attempt,
            pending: Some(PendingMove {
                command,
                best: Some(best),
                ..pending.clone()
            }),
            ..state.clone()
        },
        effects: vec![
            Effect::Apply(command),
            Effect::ScheduleVerify(VerifyRequest {
                transition,
                attempt: next_attempt,
                after_ms: config.verify_delay_ms(next_attempt),
            }),
        ],
        outcome: Outcome::Retry {
            transition,
            attempt: next_attempt,
        },
    }
}

fn stale(state: &ViewportState, transition: TransitionId) -> Step {
    Step {
        state: state.clone(),
        effects: Vec::new(),
        outcome: Outcome::Stale { transition },
    }
}

/// Applies one event to `state`.
///
/// `signals` is the placeable signal set known before the event; for
/// [`ViewportEvent::SignalsChanged`] the event's own positions are used. On
/// error nothing changes and no effect is produced.
pub fn transition(
    state: &ViewportState,
    signals: &[LatLon],
    event: &ViewportEvent,
    config: &ViewportConfig,
) -> Result<Step, ViewportError> {
    let step = match event {
        ViewportEvent::SignalsChanged { positions } => {
            let positions = placeable(positions);
            let refit = !state.mode.is_locked()
                && state.mode != ViewportMode::FitAll
                && !positions.is_empty();
            match fit_all_plan(&positions, config) {
                Some(plan) if refit => begin(state, ViewportMode::FitAll, None, plan, config),
                _ => Step::unchanged(state),
            }
        }
        ViewportEvent::UserLocated { position } => {
            let user = position.validate()?;
            if state.mode == ViewportMode::LockedUser {
                Step::unchanged(state)
            } else {
                let plan = user_plan(user, signals, config);
                begin(state, ViewportMode::LockedUser, Some(user), plan, config)
            }
        }
        ViewportEvent::SearchCommitted(search) => {
            let plan = search_plan(search, config)?;
            let anchor = plan.goal.anchor;
            begin(state, ViewportMode::LockedTarget, Some(anchor), plan, config)
        }
        ViewportEvent::ResetRequested => reset(state, signals, config),
        ViewportEvent::VerifyDue {
            transition,
            attempt,
            observed,
        } => verify(state, *transition, *attempt, *observed, config),
    };
    Ok(step)
}

/// Single owner of the camera state.
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    state: ViewportState,
    signals: Vec<LatLon>,
    metrics: Metrics,
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Result<Self, ViewportError> {
        config.validate()?;
        Ok(Self {
            state: ViewportState::initial(config.default_zoom),
            config,
            signals: Vec::new(),
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn signals(&self) -> &[LatLon] {
        &self.signals
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Feeds one event through [`transition`] and commits the result.
    pub fn handle(&mut self, event: ViewportEvent) -> Result<Vec<Effect>, ViewportError> {
        let step = match transition(&self.state, &self.signals, &event, &self.config) {
            Ok(step) => step,
            Err(err) => {
                self.metrics.incr("viewport.rejected");
                tracing::warn!(mode = %self.state.mode, error = %err, "camera request rejected");
                return Err(err);
            }
        };

        if let ViewportEvent::SignalsChanged { positions } = &event {
            self.signals = placeable(positions);
        }
        self.observe(&step.outcome);
        self.state = step.state;
        Ok(step.effects)
    }

    fn observe(&mut self, outcome: &Outcome) {
        match *outcome {
            Outcome::Unchanged => {}
            Outcome::Retargeted {
                from,
                to,
                transition,
            } => {
                self.metrics.incr("viewport.transitions");
                tracing::info!(%from, %to, transition = transition.0, "camera retargeted");
            }
            Outcome::Retry {
                transition,
                attempt,
            } => {
                self.metrics.incr("viewport.retries");
                tracing::debug!(transition = transition.0, attempt, "camera not converged, retrying");
            }
            Outcome::Settled(s) => {
                self.metrics.record("viewport.attempts", s.attempts as f64);
                match s.convergence {
                    Convergence::Verified => {
                        self.metrics.incr("viewport.verified");
                        tracing::debug!(
                            transition = s.transition.0,
                            mode = %s.mode,
                            attempts = s.attempts,
                            zoom = s.view.zoom,
                            "camera verified"
                        );
                    }
                    Convergence::BestEffort => {
                        self.metrics.incr("viewport.best_effort");
                        tracing::warn!(
                            transition = s.transition.0,
                            mode = %s.mode,
                            attempts = s.attempts,
                            zoom = s.view.zoom,
                            "camera did not converge, accepting best view"
                        );
                    }
                }
            }
            Outcome::Stale { transition } => {
                self.metrics.incr("viewport.stale_verify");
                tracing::debug!(
                    transition = transition.0,
                    active = ?self.state.active_transition().map(|t| t.0),
                    "ignoring stale verification"
                );
            }
        }
    }
}
