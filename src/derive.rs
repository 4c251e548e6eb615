//! Derived views of the current snapshot.
//!
//! Everything here is a pure function of the aggregation list, the search
//! term and the selected bairro. Results borrow the snapshot; nothing is
//! mutated.

use crate::models::{AggregationRecord, StatsSummary};

/// Number of neighborhoods shown as highlight chips.
pub const TOP_N: usize = 4;

/// Smallest marker radius, also used when no record has incidents.
pub const MIN_MARKER_RADIUS: f64 = 8.0;

/// Radius of the marker with the most incidents.
pub const MAX_MARKER_RADIUS: f64 = 26.0;

/// Map center (lat, lon) when nothing can be located: Recife.
pub const DEFAULT_CENTER: (f64, f64) = (-8.0476, -34.8761);

/// Color bucket for a map marker, by share of the busiest neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerTier {
    /// Ratio >= 0.75.
    Critical,
    /// Ratio >= 0.50.
    High,
    /// Ratio >= 0.25.
    Caution,
    /// Below 0.25.
    Low,
    /// No neighborhood has any incidents.
    Neutral,
}

impl MarkerTier {
    /// Tiers in legend order, lowest first.
    pub const LEGEND: [MarkerTier; 4] = [
        MarkerTier::Low,
        MarkerTier::Caution,
        MarkerTier::High,
        MarkerTier::Critical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MarkerTier::Critical => "Very critical",
            MarkerTier::High => "Critical",
            MarkerTier::Caution => "Attention",
            MarkerTier::Low => "Low incidence",
            MarkerTier::Neutral => "No incidents",
        }
    }
}

/// How to pick a new selection when the selected bairro disappears from
/// a refreshed snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SelectionFallback {
    /// First record in the order the server returned them.
    #[default]
    FetchOrder,
    /// Record with the most incidents (first in ranked order).
    HighestIncidence,
}

/// Stable descending sort by `total_crimes`.
pub fn sort_by_incidence(records: &[AggregationRecord]) -> Vec<&AggregationRecord> {
    let mut sorted: Vec<&AggregationRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.total_crimes.cmp(&a.total_crimes));
    sorted
}

/// Records whose name contains `term` (trimmed, case-insensitive), ranked
/// by incidence. An empty term keeps every record.
pub fn filter_by_search<'a>(records: &'a [AggregationRecord], term: &str) -> Vec<&'a AggregationRecord> {
    let needle = term.trim().to_lowercase();
    let mut sorted = sort_by_incidence(records);
    if !needle.is_empty() {
        sorted.retain(|r| r.bairro.to_lowercase().contains(&needle));
    }
    sorted
}

/// The `n` neighborhoods with the most incidents, ties in input order.
pub fn top_bairros(records: &[AggregationRecord], n: usize) -> Vec<&AggregationRecord> {
    let mut sorted = sort_by_incidence(records);
    sorted.truncate(n);
    sorted
}

/// Records that can be placed on the map, in input order.
pub fn map_markers(records: &[AggregationRecord]) -> Vec<&AggregationRecord> {
    records.iter().filter(|r| r.coordinates().is_some()).collect()
}

/// Highest `total_crimes` in the snapshot, 0 when empty.
pub fn max_total_crimes(records: &[AggregationRecord]) -> u64 {
    records.iter().map(|r| r.total_crimes).max().unwrap_or(0)
}

/// Marker radius scaled against the busiest neighborhood.
pub fn marker_radius(total_crimes: u64, max_total: u64) -> f64 {
    if max_total == 0 {
        return MIN_MARKER_RADIUS;
    }
    let scaled = total_crimes as f64 / max_total as f64 * MAX_MARKER_RADIUS;
    scaled.max(MIN_MARKER_RADIUS)
}

/// Color tier for a marker.
pub fn marker_tier(total_crimes: u64, max_total: u64) -> MarkerTier {
    if max_total == 0 {
        return MarkerTier::Neutral;
    }
    let ratio = total_crimes as f64 / max_total as f64;
    if ratio >= 0.75 {
        MarkerTier::Critical
    } else if ratio >= 0.5 {
        MarkerTier::High
    } else if ratio >= 0.25 {
        MarkerTier::Caution
    } else {
        MarkerTier::Low
    }
}

/// Where the map should look, as `(lat, lon)`.
pub fn map_center(selected: Option<&AggregationRecord>, markers: &[&AggregationRecord]) -> (f64, f64) {
    if let Some(coords) = selected.and_then(AggregationRecord::coordinates) {
        return coords;
    }

    let located: Vec<(f64, f64)> = markers.iter().filter_map(|r| r.coordinates()).collect();
    if located.is_empty() {
        return DEFAULT_CENTER;
    }

    let n = located.len() as f64;
    let (lat_sum, lon_sum) = located
        .iter()
        .fold((0.0, 0.0), |(lat_acc, lon_acc), (lat, lon)| (lat_acc + lat, lon_acc + lon));
    (lat_sum / n, lon_sum / n)
}

/// Selection to hold after `snapshot` replaced the previous one.
///
/// Keeps `previous` when that bairro is still present; otherwise falls
/// back per `policy`. `None` only for an empty snapshot.
pub fn reconcile_selection(
    previous: Option<&str>,
    snapshot: &[AggregationRecord],
    policy: SelectionFallback,
) -> Option<String> {
    if let Some(name) = previous {
        if snapshot.iter().any(|r| r.bairro == name) {
            return Some(name.to_string());
        }
    }

    let fallback = match policy {
        SelectionFallback::FetchOrder => snapshot.first(),
        SelectionFallback::HighestIncidence => sort_by_incidence(snapshot).first().copied(),
    };
    fallback.map(|r| r.bairro.clone())
}

/// Looks up the record for a selected name.
pub fn find_bairro<'a>(records: &'a [AggregationRecord], name: &str) -> Option<&'a AggregationRecord> {
    records.iter().find(|r| r.bairro == name)
}

/// A map marker with its scale and color resolved.
#[derive(Debug, Clone, Copy)]
pub struct Marker<'a> {
    pub record: &'a AggregationRecord,
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
    pub tier: MarkerTier,
}

/// Everything the view renders, computed in one pass over the snapshot.
#[derive(Debug, Clone)]
pub struct Projection<'a> {
    /// Search-filtered, ranked list.
    pub list: Vec<&'a AggregationRecord>,
    /// Highest-incidence neighborhoods, ignoring the search term.
    pub top: Vec<&'a AggregationRecord>,
    pub markers: Vec<Marker<'a>>,
    pub max_total_crimes: u64,
    /// `(lat, lon)`.
    pub center: (f64, f64),
    pub selected: Option<&'a AggregationRecord>,
}

impl<'a> Projection<'a> {
    pub fn new(records: &'a [AggregationRecord], search_term: &str, selected: Option<&str>) -> Self {
        let max_total = max_total_crimes(records);
        let selected = selected.and_then(|name| find_bairro(records, name));
        let located = map_markers(records);
        let center = map_center(selected, &located);

        let markers = located
            .into_iter()
            .filter_map(|record| {
                let (lat, lon) = record.coordinates()?;
                Some(Marker {
                    record,
                    lat,
                    lon,
                    radius: marker_radius(record.total_crimes, max_total),
                    tier: marker_tier(record.total_crimes, max_total),
                })
            })
            .collect();

        Self {
            list: filter_by_search(records, search_term),
            top: top_bairros(records, TOP_N),
            markers,
            max_total_crimes: max_total,
            center,
            selected,
        }
    }

    /// Position of the selected bairro in the filtered list.
    pub fn selected_index(&self) -> Option<usize> {
        let selected = self.selected?;
        self.list.iter().position(|r| r.bairro == selected.bairro)
    }
}

/// One summary card: headline value plus an optional secondary figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub label: &'static str,
    pub value: Option<CardValue>,
    pub secondary: Option<(&'static str, CardValue)>,
}

/// Raw card figure; formatting is left to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Count(u64),
    Money(f64),
    Name(String),
}

/// The four summary cards above the map.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCards {
    pub crimes: Card,
    pub impact: Card,
    pub bairros: Card,
    pub highest: Card,
}

impl SummaryCards {
    pub fn from_stats(stats: Option<&StatsSummary>) -> Self {
        let crimes = Card {
            label: "Crimes registered",
            value: stats.map(|s| CardValue::Count(s.total_crimes)),
            secondary: stats
                .filter(|s| s.total_crimes > 0 && s.total_prejuizo != 0.0)
                .map(|s| {
                    (
                        "Average loss",
                        CardValue::Money(s.total_prejuizo / s.total_crimes.max(1) as f64),
                    )
                }),
        };

        let impact = Card {
            label: "Financial impact",
            value: stats.map(|s| CardValue::Money(s.total_prejuizo)),
            secondary: stats
                .filter(|s| s.total_prejuizo != 0.0 && s.total_bairros > 0)
                .map(|s| {
                    (
                        "Per bairro",
                        CardValue::Money(s.total_prejuizo / s.total_bairros.max(1) as f64),
                    )
                }),
        };

        let bairros = Card {
            label: "Bairros monitored",
            value: stats.map(|s| CardValue::Count(s.total_bairros)),
            secondary: stats
                .filter(|s| s.total_crimes > 0 && s.total_bairros > 0)
                .map(|s| {
                    let avg = (s.total_crimes as f64 / s.total_bairros.max(1) as f64).round();
                    ("Crimes per bairro", CardValue::Count(avg as u64))
                }),
        };

        let highlight = stats.and_then(|s| s.bairro_mais_crimes.as_ref());
        let highest = Card {
            label: "Highest incidence",
            value: highlight
                .filter(|h| !h.bairro.is_empty())
                .map(|h| CardValue::Name(h.bairro.clone())),
            secondary: highlight.map(|h| ("Occurrences", CardValue::Count(h.total_crimes))),
        };

        Self {
            crimes,
            impact,
            bairros,
            highest,
        }
    }

    pub fn cards(&self) -> [&Card; 4] {
        [&self.crimes, &self.impact, &self.bairros, &self.highest]
    }
}
