use std::collections::{BTreeMap, HashMap};

use catalog::{Category, Signal};
use foundation::LatLon;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::symbology::SeverityTier;

/// Per-category member counts, iterated in canonical category order.
pub type CategoryCounts = BTreeMap<Category, u32>;

/// One row of the zoom → cell size table.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStep {
    /// Applies to zoom levels strictly below this value.
    pub below_zoom: f64,
    pub cell_deg: f64,
}

impl ResolutionStep {
    pub const fn new(below_zoom: f64, cell_deg: f64) -> Self {
        Self {
            below_zoom,
            cell_deg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Ascending by `below_zoom`, non-increasing in `cell_deg`.
    pub steps: Vec<ResolutionStep>,
    /// At or above this zoom, aggregation is bypassed.
    pub individual_zoom: f64,
    /// Quantum for grouping coincident markers in bypass mode.
    pub coincident_epsilon_deg: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                ResolutionStep::new(3.0, 60.0),
                ResolutionStep::new(4.0, 30.0),
                ResolutionStep::new(5.0, 15.0),
                ResolutionStep::new(6.0, 8.0),
                ResolutionStep::new(7.0, 4.0),
                ResolutionStep::new(8.0, 2.0),
            ],
            individual_zoom: 8.0,
            coincident_epsilon_deg: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("resolution table is empty")]
    EmptySteps,
    #[error("step {index}: cell size must be finite and positive, got {cell_deg}")]
    InvalidCellSize { index: usize, cell_deg: f64 },
    #[error("step {index}: zoom thresholds must strictly increase")]
    ZoomNotAscending { index: usize },
    #[error("step {index}: cell size grows with zoom")]
    CellSizeGrows { index: usize },
    #[error("individual zoom {individual_zoom} is below the last step threshold {last_below}")]
    IndividualZoomTooLow { individual_zoom: f64, last_below: f64 },
    #[error("coincident epsilon must be positive and no larger than the finest cell")]
    InvalidEpsilon,
}

/// Grid resolution chosen for one aggregation pass.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Resolution {
    Grid { cell_deg: f64 },
    Individual { epsilon_deg: f64 },
}

impl Resolution {
    /// Effective bucket size in degrees.
    pub fn cell_size(&self) -> f64 {
        match *self {
            Resolution::Grid { cell_deg } => cell_deg,
            Resolution::Individual { epsilon_deg } => epsilon_deg,
        }
    }

    pub fn is_individual(&self) -> bool {
        matches!(self, Resolution::Individual { .. })
    }

    pub fn key(&self, p: LatLon) -> CellKey {
        let size = self.cell_size();
        CellKey {
            row: (p.lat / size).floor() as i64,
            col: (p.lon / size).floor() as i64,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(last) = self.steps.last() else {
            return Err(ConfigError::EmptySteps);
        };

        for (index, step) in self.steps.iter().enumerate() {
            if !step.cell_deg.is_finite() || step.cell_deg <= 0.0 {
                return Err(ConfigError::InvalidCellSize {
                    index,
                    cell_deg: step.cell_deg,
                });
            }
            if index == 0 {
                continue;
            }
            let prev = self.steps[index - 1];
            if step.below_zoom.partial_cmp(&prev.below_zoom) != Some(std::cmp::Ordering::Greater) {
                return Err(ConfigError::ZoomNotAscending { index });
            }
            if step.cell_deg > prev.cell_deg {
                return Err(ConfigError::CellSizeGrows { index });
            }
        }

        if !(self.individual_zoom >= last.below_zoom) {
            return Err(ConfigError::IndividualZoomTooLow {
                individual_zoom: self.individual_zoom,
                last_below: last.below_zoom,
            });
        }

        let eps = self.coincident_epsilon_deg;
        if !eps.is_finite() || eps <= 0.0 || eps > last.cell_deg {
            return Err(ConfigError::InvalidEpsilon);
        }

        Ok(())
    }

    /// Resolution for `zoom`; non-finite zoom is treated as fully zoomed out.
    pub fn resolution(&self, zoom: f64) -> Resolution {
        let zoom = if zoom.is_finite() { zoom } else { 0.0 };
        let individual = Resolution::Individual {
            epsilon_deg: self.coincident_epsilon_deg,
        };
        if zoom >= self.individual_zoom {
            return individual;
        }
        match self.steps.iter().find(|s| zoom < s.below_zoom) {
            Some(step) => Resolution::Grid {
                cell_deg: step.cell_deg,
            },
            // Between the last threshold and the bypass zoom: stay at the finest grid.
            None => match self.steps.last() {
                Some(step) => Resolution::Grid {
                    cell_deg: step.cell_deg,
                },
                None => individual,
            },
        }
    }
}

/// Integer grid coordinates of a cell at one resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellKey {
    pub row: i64,
    pub col: i64,
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Marker,
    Cluster,
}

/// Aggregation bucket for one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell<'a> {
    pub key: CellKey,
    /// Position of the first-inserted member, never a centroid.
    pub position: LatLon,
    pub members: Vec<&'a Signal>,
    pub category_counts: CategoryCounts,
}

impl<'a> GridCell<'a> {
    fn open(key: CellKey, first: &'a Signal) -> Self {
        let mut cell = GridCell {
            key,
            position: first.position,
            members: Vec::new(),
            category_counts: CategoryCounts::new(),
        };
        cell.push(first);
        cell
    }

    fn push(&mut self, signal: &'a Signal) {
        self.members.push(signal);
        for category in &signal.categories {
            *self.category_counts.entry(*category).or_insert(0) += 1;
        }
    }

    pub fn kind(&self) -> CellKind {
        if self.members.len() > 1 {
            CellKind::Cluster
        } else {
            CellKind::Marker
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.kind() == CellKind::Marker
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of category counts; exceeds `len()` when members are composite.
    pub fn category_total(&self) -> u32 {
        self.category_counts.values().sum()
    }

    pub fn severity(&self) -> SeverityTier {
        SeverityTier::for_count(self.members.len())
    }

    /// Category with the highest count; ties go to canonical order.
    pub fn dominant_category(&self) -> Category {
        let mut best = (Category::Other, 0u32);
        for (category, count) in &self.category_counts {
            if *count > best.1 {
                best = (*category, *count);
            }
        }
        best.0
    }
}

/// Buckets `signals` at the resolution for `zoom`.
///
/// Pure: the same signals in the same order always produce the same cells, in
/// first-appearance order. Category filtering belongs upstream; pass the
/// filtered subset.
pub fn compute_cells<'a, I>(signals: I, zoom: f64, config: &AggregationConfig) -> Vec<GridCell<'a>>
where
    I: IntoIterator<Item = &'a Signal>,
{
    let resolution = config.resolution(zoom);
    let mut cells: Vec<GridCell<'a>> = Vec::new();
    let mut index: HashMap<CellKey, usize> = HashMap::new();

    for signal in signals {
        if !signal.position.is_valid() {
            tracing::debug!(id = %signal.id, "skipping signal without a placeable position");
            continue;
        }
        let key = resolution.key(signal.position);
        match index.get(&key) {
            Some(&i) => cells[i].push(signal),
            None => {
                index.insert(key, cells.len());
                cells.push(GridCell::open(key, signal));
            }
        }
    }

    cells
}
