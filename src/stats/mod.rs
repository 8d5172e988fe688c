//! Stats module - loan KPIs and grouped breakdowns

mod calculator;

pub use calculator::{
    Aggregator, Dimension, GroupTotal, Kpis, Measure, QualitySplit, RateStats, StatsError,
    UnknownMeasure, UNKNOWN_KEY,
};
