//! Loan CSV Loader Module
//! Reads the loan CSV with Polars and coerces each row into a `LoanRecord`.

use super::record::{columns, LoanQuality, LoanRecord, DEFAULT_GOOD_STATUSES};
use super::table::LoanTable;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Date layouts found in loan exports, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A cell that could not be coerced to its column type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: column '{column}' has value '{value}', expected {expected}")]
pub struct ParseError {
    pub column: String,
    /// 1-based file line of the record, the header being line 1.
    ///
    /// Counted as one line per record, blank lines included. A quoted
    /// field spanning several lines earlier in the file shifts the real
    /// line further down.
    pub line: usize,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Missing required data file: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Loads loan CSV files into an immutable [`LoanTable`].
#[derive(Debug, Clone)]
pub struct LoanLoader {
    good_statuses: Vec<String>,
}

impl Default for LoanLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanLoader {
    pub fn new() -> Self {
        Self {
            good_statuses: DEFAULT_GOOD_STATUSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the statuses classified as good loans.
    pub fn with_good_statuses(mut self, statuses: Vec<String>) -> Self {
        self.good_statuses = statuses;
        self
    }

    /// Load a CSV file. Any missing column or bad value fails the whole load.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoanTable, LoaderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoaderError::MissingFile(path.to_path_buf()));
        }

        let started = Instant::now();
        log::info!("loading loans from {}", path.display());

        // Schema inference is off: every column arrives as text and the
        // coercion below decides what is valid.
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(0))
            .with_has_header(true)
            .finish()?
            .collect()?;

        let records = self.parse_frame(&df)?;
        let header = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let table = LoanTable::from_records(records)?.with_source_columns(header);

        log::info!(
            "loaded {} loans from {} in {:?}",
            table.len(),
            path.display(),
            started.elapsed()
        );
        Ok(table)
    }

    /// Coerce a text-typed frame into records.
    ///
    /// Rows with every cell empty are blank lines and are skipped. Columns
    /// without a typed field are kept on each record as text.
    pub fn parse_frame(&self, df: &DataFrame) -> Result<Vec<LoanRecord>, LoaderError> {
        let present: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing: Vec<String> = columns::REQUIRED
            .iter()
            .filter(|c| !present.contains(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::MissingColumns(missing));
        }

        let text = |name: &'static str| TextColumn::of(df, name);
        let all: Vec<TextColumn<'_>> = df
            .get_column_names()
            .into_iter()
            .map(|name| TextColumn::of(df, name.as_str()))
            .collect::<Result<_, _>>()?;
        let extras: Vec<&TextColumn<'_>> = all.iter().filter(|c| is_extra(c.name)).collect();

        let id = text(columns::ID)?;
        let state = text(columns::ADDRESS_STATE)?;
        let purpose = text(columns::PURPOSE)?;
        let status = text(columns::LOAN_STATUS)?;
        let issue_date = text(columns::ISSUE_DATE)?;
        let amount = text(columns::LOAN_AMOUNT)?;
        let rate = text(columns::INT_RATE)?;
        let grade = text(columns::GRADE)?;
        let sub_grade = text(columns::SUB_GRADE)?;
        let term = text(columns::TERM)?;
        let emp_length = text(columns::EMP_LENGTH)?;
        let home_ownership = text(columns::HOME_OWNERSHIP)?;
        let total_payment = text(columns::TOTAL_PAYMENT)?;
        let installment = text(columns::INSTALLMENT)?;
        let dti = text(columns::DTI)?;
        let annual_income = text(columns::ANNUAL_INCOME)?;
        let last_payment = text(columns::LAST_PAYMENT_DATE)?;
        let next_payment = text(columns::NEXT_PAYMENT_DATE)?;
        let last_credit_pull = text(columns::LAST_CREDIT_PULL_DATE)?;

        let mut records = Vec::with_capacity(df.height());
        let mut seen_ids: HashSet<String> = HashSet::with_capacity(df.height());
        let mut duplicate_ids = 0usize;
        let mut blank_rows = 0usize;

        for row in 0..df.height() {
            if all.iter().all(|c| c.cell(row).is_none()) {
                blank_rows += 1;
                continue;
            }

            let status_text = status.optional_text(row).unwrap_or_default();
            let record = LoanRecord {
                id: id.required_text(row)?,
                address_state: state.required_text(row)?.to_uppercase(),
                purpose: purpose.required_text(row)?,
                quality: LoanQuality::classify(&status_text, &self.good_statuses),
                loan_status: status_text,
                issue_date: issue_date.required(row, parse_date, "a date")?,
                loan_amount: amount.required(row, parse_number, "a number")?,
                int_rate: rate.required(row, parse_number, "a number")?,
                grade: grade.optional_text(row),
                sub_grade: sub_grade.optional_text(row),
                term: term.optional_text(row),
                emp_length: emp_length.optional_text(row),
                home_ownership: home_ownership.optional_text(row),
                total_payment: total_payment.optional(row, parse_number, "a number")?,
                installment: installment.optional(row, parse_number, "a number")?,
                dti: dti.optional(row, parse_number, "a number")?,
                annual_income: annual_income.optional(row, parse_number, "a number")?,
                last_payment_date: last_payment.optional(row, parse_date, "a date")?,
                next_payment_date: next_payment.optional(row, parse_date, "a date")?,
                last_credit_pull_date: last_credit_pull.optional(row, parse_date, "a date")?,
                extra: extras
                    .iter()
                    .map(|c| (c.name.to_string(), c.cell(row).unwrap_or_default().to_string()))
                    .collect::<BTreeMap<_, _>>(),
            };

            if !seen_ids.insert(record.id.clone()) {
                duplicate_ids += 1;
            }
            records.push(record);
        }

        if blank_rows > 0 {
            log::debug!("skipped {blank_rows} blank rows");
        }
        if duplicate_ids > 0 {
            log::warn!("{duplicate_ids} rows reuse an id already seen in the file");
        }

        Ok(records)
    }
}

/// A text column of the raw frame; absent optional columns have no values.
struct TextColumn<'a> {
    name: &'a str,
    values: Option<&'a StringChunked>,
}

impl<'a> TextColumn<'a> {
    fn of(df: &'a DataFrame, name: &'a str) -> Result<Self, LoaderError> {
        let values = match df.column(name) {
            Ok(col) => Some(col.str()?),
            Err(_) => None,
        };
        Ok(Self { name, values })
    }

    fn cell(&self, row: usize) -> Option<&str> {
        self.values
            .and_then(|ca| ca.get(row))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn error(&self, row: usize, expected: &'static str) -> ParseError {
        ParseError {
            column: self.name.to_string(),
            line: row + 2,
            value: self
                .values
                .and_then(|ca| ca.get(row))
                .unwrap_or_default()
                .to_string(),
            expected,
        }
    }

    fn optional_text(&self, row: usize) -> Option<String> {
        self.cell(row).map(str::to_string)
    }

    fn required_text(&self, row: usize) -> Result<String, ParseError> {
        self.optional_text(row)
            .ok_or_else(|| self.error(row, "a non-empty value"))
    }

    fn optional<T>(
        &self,
        row: usize,
        parse: fn(&str) -> Option<T>,
        expected: &'static str,
    ) -> Result<Option<T>, ParseError> {
        match self.cell(row) {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).ok_or_else(|| self.error(row, expected)),
        }
    }

    fn required<T>(
        &self,
        row: usize,
        parse: fn(&str) -> Option<T>,
        expected: &'static str,
    ) -> Result<T, ParseError> {
        self.optional(row, parse, expected)?
            .ok_or_else(|| self.error(row, expected))
    }
}

/// Untyped source columns, excluding names the record already serializes.
fn is_extra(name: &str) -> bool {
    !columns::TYPED.contains(&name)
        && ![columns::ROW, columns::ISSUE_MONTH, columns::QUALITY, "quality"].contains(&name)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
                .ok()
                .map(|dt| dt.date())
        })
}
