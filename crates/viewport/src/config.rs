use foundation::LatLon;
use serde::{Deserialize, Serialize};

use crate::controller::ViewportError;

/// Upper bound on verification attempts per transition. Delays are capped,
/// so this keeps the longest settle under `8 * verify_max_delay_ms`.
pub const MAX_VERIFY_ATTEMPTS: u32 = 8;

/// Camera policy knobs. Zoom values are web-map zoom levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub default_center: LatLon,
    pub default_zoom: f64,

    pub fit_all_max_zoom: f64,
    pub fit_all_min_zoom: f64,
    /// Fraction of the framed span added on every side.
    pub fit_padding: f64,

    pub user_nearby_radius_km: f64,
    pub user_nearby_max: usize,
    pub user_nearby_min_zoom: f64,
    pub user_max_zoom: f64,
    /// Zoom used when nothing is reported near the user.
    pub user_fallback_zoom: f64,
    pub user_fallback_min_zoom: f64,

    pub target_default_zoom: f64,
    pub target_point_min_zoom: f64,
    pub target_max_zoom: f64,
    pub target_min_zoom: f64,

    pub max_attempts: u32,
    pub verify_base_delay_ms: u64,
    pub verify_max_delay_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_center: LatLon::new(20.0, 0.0),
            default_zoom: 2.0,
            fit_all_max_zoom: 6.0,
            fit_all_min_zoom: 0.0,
            fit_padding: 0.1,
            user_nearby_radius_km: 1000.0,
            user_nearby_max: 10,
            user_nearby_min_zoom: 4.0,
            user_max_zoom: 10.0,
            user_fallback_zoom: 3.0,
            user_fallback_min_zoom: 2.0,
            target_default_zoom: 5.0,
            target_point_min_zoom: 4.0,
            target_max_zoom: 8.0,
            target_min_zoom: 1.0,
            max_attempts: 4,
            verify_base_delay_ms: 150,
            verify_max_delay_ms: 1000,
        }
    }
}

impl ViewportConfig {
    pub fn validate(&self) -> Result<(), ViewportError> {
        let invalid = |msg: &str| Err(ViewportError::InvalidConfig(msg.to_string()));

        if !self.default_center.is_valid() {
            return invalid("default_center is not a valid coordinate");
        }
        let zooms = [
            self.default_zoom,
            self.fit_all_max_zoom,
            self.fit_all_min_zoom,
            self.user_nearby_min_zoom,
            self.user_max_zoom,
            self.user_fallback_zoom,
            self.user_fallback_min_zoom,
            self.target_default_zoom,
            self.target_point_min_zoom,
            self.target_max_zoom,
            self.target_min_zoom,
        ];
        if zooms.iter().any(|z| !z.is_finite() || *z < 0.0) {
            return invalid("zoom levels must be finite and non-negative");
        }
        if self.fit_all_min_zoom > self.fit_all_max_zoom {
            return invalid("fit_all_min_zoom exceeds fit_all_max_zoom");
        }
        if self.user_fallback_min_zoom > self.user_fallback_zoom {
            return invalid("user_fallback_min_zoom exceeds user_fallback_zoom");
        }
        if self.user_nearby_min_zoom > self.user_max_zoom {
            return invalid("user_nearby_min_zoom exceeds user_max_zoom");
        }
        if self.target_point_min_zoom > self.target_default_zoom {
            return invalid("target_point_min_zoom exceeds target_default_zoom");
        }
        if self.target_min_zoom > self.target_max_zoom {
            return invalid("target_min_zoom exceeds target_max_zoom");
        }
        if !(0.0..1.0).contains(&self.fit_padding) {
            return invalid("fit_padding must be in [0, 1)");
        }
        if !(self.user_nearby_radius_km >= 0.0) {
            return invalid("user_nearby_radius_km must be non-negative");
        }
        if !(1..=MAX_VERIFY_ATTEMPTS).contains(&self.max_attempts) {
            return invalid("max_attempts must be between 1 and 8");
        }
        if self.verify_base_delay_ms == 0 || self.verify_base_delay_ms > self.verify_max_delay_ms {
            return invalid("verify delays must satisfy 0 < base <= max");
        }
        Ok(())
    }

    /// Delay before verifying `attempt` (1-based): doubles per attempt, capped.
    pub fn verify_delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        self.verify_base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.verify_max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ViewportConfig::default().validate().unwrap();
    }

    #[test]
    fn delays_double_then_cap() {
        let cfg = ViewportConfig::default();
        let delays: Vec<u64> = (1..=5).map(|a| cfg.verify_delay_ms(a)).collect();
        assert_eq!(delays, vec![150, 300, 600, 1000, 1000]);
        assert_eq!(cfg.verify_delay_ms(u32::MAX), 1000);
    }

    #[test]
    fn rejects_inconsistent_knobs() {
        let cfg = ViewportConfig {
            max_attempts: 0,
            ..ViewportConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ViewportError::InvalidConfig(_))));

        let cfg = ViewportConfig {
            max_attempts: MAX_VERIFY_ATTEMPTS,
            ..ViewportConfig::default()
        };
        assert!(cfg.validate().is_ok());
        let cfg = ViewportConfig {
            max_attempts: MAX_VERIFY_ATTEMPTS + 1,
            ..ViewportConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ViewportConfig {
            user_fallback_min_zoom: 5.0,
            ..ViewportConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ViewportConfig {
            default_zoom: f64::NAN,
            ..ViewportConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ViewportConfig = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(cfg.max_attempts, 2);
        assert_eq!(cfg.user_fallback_zoom, 3.0);
    }
}
