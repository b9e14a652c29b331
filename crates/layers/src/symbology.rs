use std::f64::consts::TAU;

use catalog::{Category, Color, Signal, Taxonomy};
use foundation::LatLon;
use serde::{Deserialize, Serialize};

use crate::cells::{CategoryCounts, CellKey, GridCell};

/// Coarse severity derived from a member count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl SeverityTier {
    pub const MEDIUM_FROM: usize = 10;
    pub const HIGH_FROM: usize = 50;

    pub fn for_count(count: usize) -> Self {
        if count >= Self::HIGH_FROM {
            SeverityTier::High
        } else if count >= Self::MEDIUM_FROM {
            SeverityTier::Medium
        } else {
            SeverityTier::Low
        }
    }

    pub fn color(self) -> Color {
        match self {
            SeverityTier::Low => Color::rgb(0xfa, 0xcc, 0x15),
            SeverityTier::Medium => Color::rgb(0xf9, 0x73, 0x16),
            SeverityTier::High => Color::rgb(0xdc, 0x26, 0x26),
        }
    }
}

/// One wedge of a cluster glyph. Angles are radians, clockwise from 12 o'clock.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slice {
    pub category: Category,
    pub color: Color,
    pub count: u32,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Slice {
    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Glyph {
    pub slices: Vec<Slice>,
    /// Label value: sum of the category counts.
    pub total: u32,
}

/// Proportional slice layout for a cluster's category mix.
///
/// Slices follow map iteration order and zero counts are skipped. The last
/// slice always closes at exactly `TAU`. An empty (or all-zero) map renders
/// as one full `Other` slice with a total of zero.
pub fn compute_glyph(counts: &CategoryCounts, taxonomy: &Taxonomy) -> Glyph {
    let total: u32 = counts.values().sum();
    if total == 0 {
        return Glyph {
            slices: vec![Slice {
                category: Category::Other,
                color: taxonomy.color(Category::Other),
                count: 0,
                start_angle: 0.0,
                end_angle: TAU,
            }],
            total: 0,
        };
    }

    let nonzero: Vec<(Category, u32)> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(c, n)| (*c, *n))
        .collect();

    let mut slices = Vec::with_capacity(nonzero.len());
    let mut start = 0.0;
    for (i, (category, count)) in nonzero.iter().enumerate() {
        let end = if i + 1 == nonzero.len() {
            TAU
        } else {
            start + TAU * (*count as f64 / total as f64)
        };
        slices.push(Slice {
            category: *category,
            color: taxonomy.color(*category),
            count: *count,
            start_angle: start,
            end_angle: end,
        });
        start = end;
    }

    Glyph { slices, total }
}

/// Pixel sizing for glyphs and markers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphStyle {
    pub marker_radius_px: f32,
    pub base_radius_px: f32,
    pub max_radius_px: f32,
    /// Multiplier applied to the highlighted slice.
    pub highlight_scale: f32,
}

impl Default for GlyphStyle {
    fn default() -> Self {
        Self {
            marker_radius_px: 6.0,
            base_radius_px: 14.0,
            max_radius_px: 40.0,
            highlight_scale: 1.15,
        }
    }
}

impl GlyphStyle {
    /// Radius grows with log2 of the total, capped at `max_radius_px`.
    pub fn radius_for_total(&self, total: u32) -> f32 {
        let growth = 4.0 * (total.max(1) as f32).log2();
        (self.base_radius_px + growth).min(self.max_radius_px)
    }

    /// Outer radius for `slice`, enlarged when its category is highlighted.
    ///
    /// The highlight is owned by the host; the glyph itself never changes.
    pub fn slice_radius(&self, glyph: &Glyph, slice: &Slice, highlighted: Option<Category>) -> f32 {
        let radius = self.radius_for_total(glyph.total);
        if highlighted == Some(slice.category) {
            radius * self.highlight_scale
        } else {
            radius
        }
    }
}

/// Renderer-facing description of one aggregation cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderItem<'a> {
    Marker {
        key: CellKey,
        signal: &'a Signal,
        color: Color,
        radius_px: f32,
    },
    Cluster {
        key: CellKey,
        position: LatLon,
        members: usize,
        severity: SeverityTier,
        radius_px: f32,
        glyph: Glyph,
    },
}

pub fn render_cells<'a>(
    cells: &[GridCell<'a>],
    taxonomy: &Taxonomy,
    style: &GlyphStyle,
) -> Vec<RenderItem<'a>> {
    cells
        .iter()
        .map(|cell| match cell.members.as_slice() {
            [only] => RenderItem::Marker {
                key: cell.key,
                signal: *only,
                color: taxonomy.color(only.category),
                radius_px: style.marker_radius_px,
            },
            _ => {
                let glyph = compute_glyph(&cell.category_counts, taxonomy);
                RenderItem::Cluster {
                    key: cell.key,
                    position: cell.position,
                    members: cell.len(),
                    severity: cell.severity(),
                    radius_px: style.radius_for_total(glyph.total),
                    glyph,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::{AggregationConfig, compute_cells};
    use catalog::RawSignal;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(SeverityTier::for_count(0), SeverityTier::Low);
        assert_eq!(SeverityTier::for_count(9), SeverityTier::Low);
        assert_eq!(SeverityTier::for_count(10), SeverityTier::Medium);
        assert_eq!(SeverityTier::for_count(49), SeverityTier::Medium);
        assert_eq!(SeverityTier::for_count(50), SeverityTier::High);
    }

    #[test]
    fn slices_are_proportional_and_contiguous() {
        let counts = CategoryCounts::from([
            (Category::Foodborne, 1),
            (Category::Airborne, 1),
            (Category::Zoonotic, 2),
        ]);
        let glyph = compute_glyph(&counts, Taxonomy::global());
        assert_eq!(glyph.total, 4);

        let cats: Vec<_> = glyph.slices.iter().map(|s| s.category).collect();
        assert_eq!(
            cats,
            vec![Category::Foodborne, Category::Airborne, Category::Zoonotic]
        );
        assert!(close(glyph.slices[0].sweep(), TAU / 4.0));
        assert!(close(glyph.slices[2].sweep(), TAU / 2.0));
        for pair in glyph.slices.windows(2) {
            assert_eq!(pair[0].end_angle, pair[1].start_angle);
        }
        assert_eq!(glyph.slices.last().map(|s| s.end_angle), Some(TAU));
        assert_eq!(
            glyph.slices[0].color,
            Taxonomy::global().color(Category::Foodborne)
        );
    }

    #[test]
    fn empty_counts_render_as_full_other() {
        let glyph = compute_glyph(&CategoryCounts::new(), Taxonomy::global());
        assert_eq!(glyph.total, 0);
        assert_eq!(glyph.slices.len(), 1);
        assert_eq!(glyph.slices[0].category, Category::Other);
        assert_eq!(glyph.slices[0].start_angle, 0.0);
        assert_eq!(glyph.slices[0].end_angle, TAU);

        let zeros = CategoryCounts::from([(Category::Airborne, 0)]);
        assert_eq!(compute_glyph(&zeros, Taxonomy::global()), glyph);
    }

    #[test]
    fn zero_count_entries_are_skipped() {
        let counts = CategoryCounts::from([(Category::Foodborne, 0), (Category::Airborne, 3)]);
        let glyph = compute_glyph(&counts, Taxonomy::global());
        assert_eq!(glyph.slices.len(), 1);
        assert_eq!(glyph.slices[0].category, Category::Airborne);
        assert_eq!(glyph.slices[0].sweep(), TAU);
    }

    #[test]
    fn highlight_only_enlarges_matching_slice() {
        let style = GlyphStyle::default();
        let counts = CategoryCounts::from([(Category::Foodborne, 3), (Category::Airborne, 1)]);
        let glyph = compute_glyph(&counts, Taxonomy::global());
        let base = style.radius_for_total(glyph.total);

        let food = &glyph.slices[0];
        let air = &glyph.slices[1];
        let hl = Some(Category::Airborne);
        assert_eq!(style.slice_radius(&glyph, food, hl), base);
        assert_eq!(style.slice_radius(&glyph, air, hl), base * style.highlight_scale);
        assert_eq!(style.slice_radius(&glyph, air, None), base);
    }

    #[test]
    fn radius_grows_then_caps() {
        let style = GlyphStyle::default();
        assert_eq!(style.radius_for_total(1), style.base_radius_px);
        assert!(style.radius_for_total(8) > style.radius_for_total(2));
        assert_eq!(style.radius_for_total(u32::MAX), style.max_radius_px);
    }

    #[test]
    fn render_cells_distinguishes_markers_and_clusters() {
        let taxonomy = Taxonomy::global();
        let signals: Vec<Signal> = [
            ("a", "Foodborne", 40.7, -74.0),
            ("b", "Foodborne", 40.71, -74.01),
            ("c", "Airborne", 51.5, -0.1),
        ]
        .into_iter()
        .map(|(id, cat, lat, lon)| {
            Signal::from_raw(RawSignal::new(id, "x", cat, lat, lon), taxonomy).unwrap()
        })
        .collect();

        let cells = compute_cells(&signals, 2.0, &AggregationConfig::default());
        let items = render_cells(&cells, taxonomy, &GlyphStyle::default());
        assert_eq!(items.len(), 2);
        match &items[0] {
            RenderItem::Cluster {
                members,
                severity,
                glyph,
                ..
            } => {
                assert_eq!(*members, 2);
                assert_eq!(*severity, SeverityTier::Low);
                assert_eq!(glyph.total, 2);
            }
            other => panic!("expected cluster, got {other:?}"),
        }
        match &items[1] {
            RenderItem::Marker { signal, color, .. } => {
                assert_eq!(signal.id.as_str(), "c");
                assert_eq!(*color, taxonomy.color(Category::Airborne));
            }
            other => panic!("expected marker, got {other:?}"),
        }
    }
}
