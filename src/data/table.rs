//! Loan Table Module
//! The immutable in-memory loan table and filtered views over it.

use super::filter::FilterSpec;
use super::record::{columns, LoanRecord};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Loan records loaded once, never mutated afterwards.
///
/// Alongside the records the table keeps a columnar projection used by
/// the aggregations. Its `__row` column indexes back into `records`.
#[derive(Debug, Clone)]
pub struct LoanTable {
    records: Vec<LoanRecord>,
    frame: DataFrame,
    source_columns: Vec<String>,
}

impl LoanTable {
    /// Build a table from already parsed records.
    ///
    /// Source columns default to the typed columns followed by every extra
    /// column seen, by name.
    pub fn from_records(records: Vec<LoanRecord>) -> PolarsResult<Self> {
        let frame = Self::project(&records)?;
        let extra: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.extra.keys().map(String::as_str))
            .collect();
        let source_columns = columns::TYPED
            .iter()
            .copied()
            .chain(extra)
            .map(str::to_string)
            .collect();
        Ok(Self {
            records,
            frame,
            source_columns,
        })
    }

    /// Replace the source column order, e.g. with a file's header.
    pub fn with_source_columns(mut self, columns: Vec<String>) -> Self {
        self.source_columns = columns;
        self
    }

    /// Column names of the source, in source order.
    pub fn source_columns(&self) -> &[String] {
        &self.source_columns
    }

    fn project(records: &[LoanRecord]) -> PolarsResult<DataFrame> {
        let n = records.len();
        let mut rows: Vec<u32> = Vec::with_capacity(n);
        let mut ids: Vec<String> = Vec::with_capacity(n);
        let mut states: Vec<String> = Vec::with_capacity(n);
        let mut purposes: Vec<String> = Vec::with_capacity(n);
        let mut statuses: Vec<String> = Vec::with_capacity(n);
        let mut qualities: Vec<String> = Vec::with_capacity(n);
        let mut issue_dates: Vec<String> = Vec::with_capacity(n);
        let mut issue_months: Vec<String> = Vec::with_capacity(n);
        let mut amounts: Vec<f64> = Vec::with_capacity(n);
        let mut rates: Vec<f64> = Vec::with_capacity(n);
        let mut grades: Vec<Option<String>> = Vec::with_capacity(n);
        let mut terms: Vec<Option<String>> = Vec::with_capacity(n);
        let mut payments: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut dtis: Vec<Option<f64>> = Vec::with_capacity(n);

        for (i, r) in records.iter().enumerate() {
            rows.push(i as u32);
            ids.push(r.id.clone());
            states.push(r.address_state.clone());
            purposes.push(r.purpose.clone());
            statuses.push(r.loan_status.clone());
            qualities.push(r.quality.label().to_string());
            issue_dates.push(r.issue_date.format("%Y-%m-%d").to_string());
            issue_months.push(r.issue_month().to_string());
            amounts.push(r.loan_amount);
            rates.push(r.int_rate);
            grades.push(r.grade.clone());
            terms.push(r.term.clone());
            payments.push(r.total_payment);
            dtis.push(r.dti);
        }

        DataFrame::new(vec![
            Column::new(columns::ROW.into(), rows),
            Column::new(columns::ID.into(), ids),
            Column::new(columns::ADDRESS_STATE.into(), states),
            Column::new(columns::PURPOSE.into(), purposes),
            Column::new(columns::LOAN_STATUS.into(), statuses),
            Column::new(columns::QUALITY.into(), qualities),
            Column::new(columns::ISSUE_DATE.into(), issue_dates),
            Column::new(columns::ISSUE_MONTH.into(), issue_months),
            Column::new(columns::LOAN_AMOUNT.into(), amounts),
            Column::new(columns::INT_RATE.into(), rates),
            Column::new(columns::GRADE.into(), grades),
            Column::new(columns::TERM.into(), terms),
            Column::new(columns::TOTAL_PAYMENT.into(), payments),
            Column::new(columns::DTI.into(), dtis),
        ])
    }

    pub fn records(&self) -> &[LoanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// View over every row.
    pub fn all(&self) -> FilteredLoans<'_> {
        FilteredLoans {
            table: self,
            frame: self.frame.clone(),
        }
    }

    /// View over the rows matching `filter`.
    pub fn filter(&self, filter: &FilterSpec) -> PolarsResult<FilteredLoans<'_>> {
        if filter.is_empty() {
            return Ok(self.all());
        }

        let frame = self
            .frame
            .clone()
            .lazy()
            .filter(filter.predicate())
            .collect()?;

        Ok(FilteredLoans { table: self, frame })
    }

    /// Sorted distinct non-null values of a frame column.
    pub fn distinct(&self, column: &str) -> Vec<String> {
        let Ok(unique) = self.frame.column(column).and_then(|col| col.unique()) else {
            return Vec::new();
        };

        let mut values: Vec<String> = match unique.str() {
            Ok(ca) => ca.into_iter().flatten().map(str::to_string).collect(),
            Err(_) => return Vec::new(),
        };
        values.sort();
        values
    }
}

/// Rows of a [`LoanTable`] selected by a filter.
#[derive(Debug, Clone)]
pub struct FilteredLoans<'a> {
    table: &'a LoanTable,
    frame: DataFrame,
}

impl<'a> FilteredLoans<'a> {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Matching records in table order.
    pub fn records(&self) -> PolarsResult<Vec<&'a LoanRecord>> {
        let table = self.table;
        let rows = self.frame.column(columns::ROW)?.u32()?;
        Ok(rows
            .into_iter()
            .flatten()
            .filter_map(|i| table.records.get(i as usize))
            .collect())
    }
}
