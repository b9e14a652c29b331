use std::collections::BTreeMap;

use catalog::{Category, Signal};
use foundation::{LatLon, Located, haversine_km};
use serde::Serialize;

/// An item annotated with its great-circle distance from the query center.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked<'a, T> {
    pub item: &'a T,
    pub distance_km: f64,
}

pub type RankedSignal<'a> = Ranked<'a, Signal>;

/// Items within `radius_km` of `center` that pass `keep`, nearest first.
///
/// Equal distances keep input order. A negative or NaN radius, or an
/// unplaceable center, matches nothing.
pub fn rank_within<'a, T, F>(items: &'a [T], center: LatLon, radius_km: f64, keep: F) -> Vec<Ranked<'a, T>>
where
    T: Located,
    F: Fn(&T) -> bool,
{
    if !(radius_km >= 0.0) || !center.is_valid() {
        return Vec::new();
    }

    let mut out: Vec<Ranked<'a, T>> = items
        .iter()
        .filter(|item| keep(item))
        .filter_map(|item| {
            let distance_km = haversine_km(center, item.position());
            (distance_km <= radius_km).then_some(Ranked { item, distance_km })
        })
        .collect();

    out.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    out
}

/// Signals within `radius_km` of `center`, optionally restricted to those
/// implying `category`, nearest first.
pub fn query_near<'a>(
    signals: &'a [Signal],
    center: LatLon,
    radius_km: f64,
    category: Option<Category>,
) -> Vec<RankedSignal<'a>> {
    rank_within(signals, center, radius_km, |s| {
        category.is_none_or(|c| s.implies(c))
    })
}

/// The `n` items closest to `center`, regardless of distance.
pub fn nearest<T: Located>(items: &[T], center: LatLon, n: usize) -> Vec<Ranked<'_, T>> {
    let mut all = rank_within(items, center, f64::INFINITY, |_| true);
    all.truncate(n);
    all
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseSummary {
    pub disease: String,
    pub count: usize,
    pub nearest_km: f64,
}

/// Diseases reported within `radius_km` of `center`.
///
/// Ordered by count (descending), then nearest report, then name.
pub fn diseases_near(
    signals: &[Signal],
    center: LatLon,
    radius_km: f64,
    category: Option<Category>,
) -> Vec<DiseaseSummary> {
    let mut by_disease: BTreeMap<String, DiseaseSummary> = BTreeMap::new();
    for hit in query_near(signals, center, radius_km, category) {
        let name = hit.item.disease.trim();
        let entry = by_disease
            .entry(name.to_lowercase())
            .or_insert_with(|| DiseaseSummary {
                disease: name.to_string(),
                count: 0,
                nearest_km: hit.distance_km,
            });
        entry.count += 1;
        entry.nearest_km = entry.nearest_km.min(hit.distance_km);
    }

    let mut out: Vec<DiseaseSummary> = by_disease.into_values().collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.nearest_km.total_cmp(&b.nearest_km))
            .then_with(|| a.disease.cmp(&b.disease))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{RawSignal, Taxonomy};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn signal(id: &str, disease: &str, category: &str, lat: f64, lon: f64) -> Signal {
        Signal::from_raw(
            RawSignal::new(id, disease, category, lat, lon),
            Taxonomy::global(),
        )
        .unwrap()
    }

    fn fixture() -> Vec<Signal> {
        vec![
            signal("london", "Measles", "Airborne", 51.5, -0.1),
            signal("nyc", "Salmonella", "Foodborne", 40.7, -74.0),
            signal("boston", "Salmonella", "Foodborne, Zoonotic", 42.36, -71.06),
            signal("philly", "Measles", "Airborne", 39.95, -75.17),
        ]
    }

    #[test]
    fn sorted_by_distance_with_annotations() {
        let signals = fixture();
        let center = LatLon::new(40.7, -74.0);
        let hits = query_near(&signals, center, 500.0, None);
        let ids: Vec<_> = hits.iter().map(|h| h.item.id.as_str()).collect();
        assert_eq!(ids, vec!["nyc", "philly", "boston"]);
        assert_eq!(hits[0].distance_km, 0.0);
        assert!(hits.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn category_filter_is_composite_aware() {
        let signals = fixture();
        let center = LatLon::new(40.7, -74.0);
        let hits = query_near(&signals, center, 500.0, Some(Category::Zoonotic));
        let ids: Vec<_> = hits.iter().map(|h| h.item.id.as_str()).collect();
        assert_eq!(ids, vec!["boston"]);
    }

    #[test]
    fn invalid_radius_or_center_matches_nothing() {
        let signals = fixture();
        let center = LatLon::new(40.7, -74.0);
        assert!(query_near(&signals, center, -1.0, None).is_empty());
        assert!(query_near(&signals, center, f64::NAN, None).is_empty());
        assert!(query_near(&signals, LatLon::new(120.0, 0.0), 1e6, None).is_empty());
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let signals = vec![
            signal("a", "x", "Airborne", 10.0, 10.0),
            signal("b", "x", "Airborne", 10.0, 10.0),
        ];
        let hits = query_near(&signals, LatLon::new(0.0, 0.0), 20_000.0, None);
        let ids: Vec<_> = hits.iter().map(|h| h.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn nearest_works_on_bare_positions() {
        let points = vec![
            LatLon::new(0.0, 10.0),
            LatLon::new(0.0, 1.0),
            LatLon::new(0.0, 5.0),
        ];
        let top = nearest(&points, LatLon::new(0.0, 0.0), 2);
        let lons: Vec<_> = top.iter().map(|r| r.item.lon).collect();
        assert_eq!(lons, vec![1.0, 5.0]);
    }

    #[test]
    fn disease_summary_groups_case_insensitively() {
        let mut signals = fixture();
        signals.push(signal("nj", "salmonella ", "Foodborne", 40.73, -74.17));
        let summary = diseases_near(&signals, LatLon::new(40.7, -74.0), 500.0, None);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].disease, "Salmonella");
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[0].nearest_km, 0.0);
        assert_eq!(summary[1].disease, "Measles");
        assert_eq!(summary[1].count, 1);
    }

    proptest! {
        #[test]
        fn shrinking_radius_never_adds_matches(
            pts in prop::collection::vec((-90.0f64..=90.0, -180.0f64..=180.0), 0..30),
            big in 0.0f64..20_000.0,
            shrink in 0.0f64..=1.0,
        ) {
            let signals: Vec<Signal> = pts
                .iter()
                .enumerate()
                .map(|(i, (lat, lon))| signal(&i.to_string(), "x", "Airborne", *lat, *lon))
                .collect();
            let center = LatLon::new(12.0, 34.0);
            let wide = query_near(&signals, center, big, None).len();
            let narrow = query_near(&signals, center, big * shrink, None).len();
            prop_assert!(narrow <= wide);
        }
    }
}
