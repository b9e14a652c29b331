use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use catalog::TaxonomyConfig;
use layers::{AggregationConfig, GlyphStyle};
use serde::{Deserialize, Serialize};
use viewport::ViewportConfig;

/// Env var naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "OUTBREAK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub taxonomy: TaxonomyConfig,
    pub aggregation: AggregationConfig,
    pub glyph: GlyphStyle,
    pub viewport: ViewportConfig,
    /// Canvas size of the simulated renderer, in pixels.
    pub viewport_px: [f64; 2],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            taxonomy: TaxonomyConfig::default(),
            aggregation: AggregationConfig::default(),
            glyph: GlyphStyle::default(),
            viewport: ViewportConfig::default(),
            viewport_px: [1280.0, 720.0],
        }
    }
}

impl Config {
    /// Defaults, then the config file (if any), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "OUTBREAK_MAX_ATTEMPTS", &mut self.viewport.max_attempts);
        override_from(
            &lookup,
            "OUTBREAK_VERIFY_DELAY_MS",
            &mut self.viewport.verify_base_delay_ms,
        );
        override_from(
            &lookup,
            "OUTBREAK_NEARBY_RADIUS_KM",
            &mut self.viewport.user_nearby_radius_km,
        );
        override_from(
            &lookup,
            "OUTBREAK_INDIVIDUAL_ZOOM",
            &mut self.aggregation.individual_zoom,
        );
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregation.validate().context("aggregation config")?;
        self.viewport.validate().context("viewport config")?;
        if self.viewport_px.iter().any(|px| !px.is_finite() || *px <= 0.0) {
            bail!("viewport_px must be positive, got {:?}", self.viewport_px);
        }
        Ok(())
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable override"),
    }
}
