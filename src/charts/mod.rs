//! Charts module - chart-ready data

mod plotter;

pub use plotter::{ChartData, ChartPlotter, Point, Region, Slice, DONUT_HOLE, USA_STATES};
