use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use catalog::{
    Category, Color, MatchKind, NormalizedBatch, Signal, SignalFilter, Taxonomy,
    parse_raw_signals,
};
use foundation::{LatLon, Timestamp};
use layers::{DiseaseSummary, RankedSignal, RenderItem, compute_cells, diseases_near, query_near, render_cells};
use runtime::{Event, MetricsSnapshot};
use serde::Serialize;
use viewport::{
    CameraCommand, CameraView, MapRenderer, Settlement, SimulatedRenderer, ViewportController,
    ViewportEvent, ViewportMode, spawn_driver,
};

use crate::config::Config;

/// Reads a JSON array of raw signals and normalizes it.
pub fn load_signals(path: &Path, taxonomy: &Taxonomy) -> Result<NormalizedBatch> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading signals {}", path.display()))?;
    let batch = parse_raw_signals(&text)
        .with_context(|| format!("parsing signals {}", path.display()))?
        .normalize(taxonomy);
    if !batch.rejected.is_empty() {
        tracing::warn!(
            rejected = batch.rejected.len(),
            accepted = batch.signals.len(),
            "some signals were excluded"
        );
    }
    Ok(batch)
}

/// `"lat,lon"` as accepted on the command line.
pub fn parse_lat_lon(text: &str) -> Result<LatLon, String> {
    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {text:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    LatLon::validated(lat, lon).map_err(|e| e.to_string())
}

/// Timestamp argument: epoch milliseconds, RFC 3339 or `YYYY-MM-DD`.
pub fn parse_timestamp(text: &str) -> Result<Timestamp, String> {
    match text.trim().parse::<i64>() {
        Ok(ms) => Ok(Timestamp(ms)),
        Err(_) => Timestamp::parse(text).map_err(|e| e.to_string()),
    }
}

/// Category named on the command line; anything the taxonomy cannot place
/// (other than "Other" itself) is an error here rather than a fallback.
pub fn parse_category(taxonomy: &Taxonomy, text: &str) -> Result<Category> {
    let resolved = taxonomy.resolve(text);
    if resolved.matched_by == MatchKind::Fallback && !text.trim().eq_ignore_ascii_case("other") {
        bail!("unknown category {text:?}");
    }
    Ok(resolved.category)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRow {
    pub input: String,
    pub category: Category,
    pub color: Color,
    pub matched_by: MatchKind,
    pub implied: Vec<Category>,
}

pub fn resolve_rows(taxonomy: &Taxonomy, inputs: &[String]) -> Vec<ResolveRow> {
    inputs
        .iter()
        .map(|input| {
            let (r, implied) = taxonomy.resolve_composite(input);
            ResolveRow {
                input: input.clone(),
                category: r.category,
                color: r.color,
                matched_by: r.matched_by,
                implied,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellsReport<'a> {
    pub zoom: f64,
    pub resolution: layers::Resolution,
    pub selected: usize,
    pub items: Vec<RenderItem<'a>>,
}

pub fn cells_report<'a>(
    signals: &'a [Signal],
    filter: &SignalFilter,
    zoom: f64,
    config: &Config,
    taxonomy: &Taxonomy,
) -> CellsReport<'a> {
    let selected = filter.apply(signals);
    let count = selected.len();
    let cells = compute_cells(selected, zoom, &config.aggregation);
    CellsReport {
        zoom,
        resolution: config.aggregation.resolution(zoom),
        selected: count,
        items: render_cells(&cells, taxonomy, &config.glyph),
    }
}

#[derive(Debug, Serialize)]
pub struct NearReport<'a> {
    pub hits: Vec<RankedSignal<'a>>,
    pub diseases: Vec<DiseaseSummary>,
}

pub fn near_report(
    signals: &[Signal],
    center: LatLon,
    radius_km: f64,
    category: Option<Category>,
) -> NearReport<'_> {
    NearReport {
        hits: query_near(signals, center, radius_km, category),
        diseases: diseases_near(signals, center, radius_km, category),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraReport {
    pub mode: ViewportMode,
    pub anchor: Option<LatLon>,
    pub last_verified_zoom: f64,
    pub final_view: CameraView,
    pub commands: Vec<Event<CameraCommand>>,
    pub settlements: Vec<Settlement>,
    pub metrics: MetricsSnapshot,
}

/// Plays `events` through the tokio driver against a simulated renderer that
/// drops its first `lag` commands.
pub async fn run_camera(config: &Config, events: Vec<ViewportEvent>, lag: u32) -> Result<CameraReport> {
    let controller = ViewportController::new(config.viewport.clone())?;
    let mut renderer = SimulatedRenderer::new(config.viewport_px);
    renderer.lag(lag);

    let (handle, task) = spawn_driver(controller, renderer);
    for event in events {
        handle.send(event)?;
    }
    drop(handle);
    let report = task.await.context("viewport driver panicked")?;

    Ok(CameraReport {
        mode: report.state.mode,
        anchor: report.state.anchor,
        last_verified_zoom: report.state.last_verified_zoom,
        final_view: report.renderer.view(),
        commands: report.commands,
        settlements: report.settlements,
        metrics: report.metrics,
    })
}
