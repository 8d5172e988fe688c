//! Chart Plotter Module
//! Turns loan aggregates into chart-ready data for any charting front end.

use crate::stats::{Dimension, GroupTotal, Measure, QualitySplit};
use serde::Serialize;

/// Hole ratio of donut charts.
pub const DONUT_HOLE: f64 = 0.6;

/// Location mode understood by US choropleth renderers.
pub const USA_STATES: &str = "USA-states";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub location: String,
    pub value: f64,
}

/// One chart, described as plain data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartData {
    Line {
        title: String,
        x_label: String,
        y_label: String,
        points: Vec<Point>,
    },
    Bar {
        title: String,
        x_label: String,
        y_label: String,
        bars: Vec<Point>,
    },
    Pie {
        title: String,
        hole: f64,
        slices: Vec<Slice>,
    },
    Choropleth {
        title: String,
        location_mode: String,
        scope: String,
        value_label: String,
        regions: Vec<Region>,
    },
}

impl ChartData {
    pub fn title(&self) -> &str {
        match self {
            ChartData::Line { title, .. }
            | ChartData::Bar { title, .. }
            | ChartData::Pie { title, .. }
            | ChartData::Choropleth { title, .. } => title,
        }
    }
}

/// Builds [`ChartData`] from grouped totals.
pub struct ChartPlotter;

impl ChartPlotter {
    fn points(groups: &[GroupTotal], measure: Measure) -> Vec<Point> {
        groups
            .iter()
            .map(|g| Point {
                x: g.key.clone(),
                y: g.measure(measure),
            })
            .collect()
    }

    /// Line over the month breakdown.
    pub fn monthly_trend(by_month: &[GroupTotal], measure: Measure) -> ChartData {
        ChartData::Line {
            title: format!("{} by Month", measure.label()),
            x_label: Dimension::Month.label().to_string(),
            y_label: measure.label().to_string(),
            points: Self::points(by_month, measure),
        }
    }

    pub fn bar(
        title: &str,
        dimension: Dimension,
        groups: &[GroupTotal],
        measure: Measure,
    ) -> ChartData {
        ChartData::Bar {
            title: title.to_string(),
            x_label: dimension.label().to_string(),
            y_label: measure.label().to_string(),
            bars: Self::points(groups, measure),
        }
    }

    pub fn pie(title: &str, groups: &[GroupTotal], measure: Measure) -> ChartData {
        ChartData::Pie {
            title: title.to_string(),
            hole: 0.0,
            slices: groups
                .iter()
                .map(|g| Slice {
                    label: g.key.clone(),
                    value: g.measure(measure),
                })
                .collect(),
        }
    }

    /// US state map colored by `measure`.
    pub fn state_map(by_state: &[GroupTotal], measure: Measure) -> ChartData {
        ChartData::Choropleth {
            title: format!("{} by State", measure.label()),
            location_mode: USA_STATES.to_string(),
            scope: "usa".to_string(),
            value_label: measure.label().to_string(),
            regions: by_state
                .iter()
                .map(|g| Region {
                    location: g.key.clone(),
                    value: g.measure(measure),
                })
                .collect(),
        }
    }

    /// Donuts for good and bad loans, each against the other class.
    pub fn quality_donuts(split: &QualitySplit) -> (ChartData, ChartData) {
        let donut = |title: &str, label: &str, value: u64, other: u64| ChartData::Pie {
            title: title.to_string(),
            hole: DONUT_HOLE,
            slices: vec![
                Slice {
                    label: label.to_string(),
                    value: value as f64,
                },
                Slice {
                    label: "Other".to_string(),
                    value: other as f64,
                },
            ],
        };

        (
            donut("GOOD LOAN ISSUED", "Good", split.good, split.bad),
            donut("BAD LOAN ISSUED", "Bad", split.bad, split.good),
        )
    }
}
