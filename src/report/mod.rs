//! Report module - the presentation boundary
//!
//! A [`Reporter`] owns the loan table for the life of the process and
//! answers one [`SummaryRequest`] at a time with a plain [`SummaryView`].

mod view;

pub use view::{
    build_summary, Charts, DetailRow, DetailsTable, FilterOptions, ReportError, SummaryRequest,
    SummaryView,
};

use crate::config::ReportConfig;
use crate::data::{LoanLoader, LoaderError, LoanTable};

/// Loaded table plus the settings used to summarize it.
#[derive(Debug, Clone)]
pub struct Reporter {
    table: LoanTable,
    config: ReportConfig,
    options: FilterOptions,
}

impl Reporter {
    pub fn new(table: LoanTable, config: ReportConfig) -> Self {
        let options = FilterOptions::of(&table);
        Self {
            table,
            config,
            options,
        }
    }

    /// Load the configured CSV. A failure here is fatal to startup.
    pub fn load(config: ReportConfig) -> Result<Self, LoaderError> {
        let table = LoanLoader::new()
            .with_good_statuses(config.good_statuses.clone())
            .load(&config.csv_path)?;
        Ok(Self::new(table, config))
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn summary(&self, request: &SummaryRequest) -> Result<SummaryView, ReportError> {
        view::build_summary_with_options(&self.table, request, &self.config, self.options.clone())
    }
}
