//! Data module - loan CSV loading, the loan table and filters

mod filter;
mod loader;
mod record;
mod table;

pub use filter::FilterSpec;
pub use loader::{LoanLoader, LoaderError, ParseError};
pub use record::{columns, InvalidMonth, LoanQuality, LoanRecord, Month, DEFAULT_GOOD_STATUSES};
pub use table::{FilteredLoans, LoanTable};
