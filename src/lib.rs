//! Loan Report - loan CSV loading & dashboard aggregation
//!
//! Loads a loan CSV once into an immutable [`LoanTable`] and answers
//! filter requests with plain, serializable [`SummaryView`]s that any
//! charting or table front end can render.

pub mod charts;
pub mod config;
pub mod data;
pub mod report;
pub mod stats;

pub use config::{ConfigError, ReportConfig};
pub use data::{FilterSpec, LoanLoader, LoanRecord, LoanTable, LoaderError, ParseError};
pub use report::{build_summary, Reporter, SummaryRequest, SummaryView};
pub use stats::{Aggregator, Dimension, Measure};
