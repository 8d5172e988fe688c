//! Loan Record Module
//! Row type of the loan table, its derived quality class and issue month.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column names of the source CSV.
pub mod columns {
    pub const ID: &str = "id";
    pub const ADDRESS_STATE: &str = "address_state";
    pub const PURPOSE: &str = "purpose";
    pub const LOAN_STATUS: &str = "loan_status";
    pub const ISSUE_DATE: &str = "issue_date";
    pub const LOAN_AMOUNT: &str = "loan_amount";
    pub const INT_RATE: &str = "int_rate";

    pub const GRADE: &str = "grade";
    pub const SUB_GRADE: &str = "sub_grade";
    pub const TERM: &str = "term";
    pub const EMP_LENGTH: &str = "emp_length";
    pub const HOME_OWNERSHIP: &str = "home_ownership";
    pub const TOTAL_PAYMENT: &str = "total_payment";
    pub const INSTALLMENT: &str = "installment";
    pub const DTI: &str = "dti";
    pub const ANNUAL_INCOME: &str = "annual_income";
    pub const LAST_PAYMENT_DATE: &str = "last_payment_date";
    pub const NEXT_PAYMENT_DATE: &str = "next_payment_date";
    pub const LAST_CREDIT_PULL_DATE: &str = "last_credit_pull_date";

    /// Derived columns, only present in the in-memory frame.
    pub const ROW: &str = "__row";
    pub const ISSUE_MONTH: &str = "issue_month";
    pub const QUALITY: &str = "loan_quality";

    /// Source columns parsed into typed [`LoanRecord`](super::LoanRecord) fields.
    pub const TYPED: [&str; 19] = [
        ID,
        ADDRESS_STATE,
        PURPOSE,
        LOAN_STATUS,
        ISSUE_DATE,
        LOAN_AMOUNT,
        INT_RATE,
        GRADE,
        SUB_GRADE,
        TERM,
        EMP_LENGTH,
        HOME_OWNERSHIP,
        TOTAL_PAYMENT,
        INSTALLMENT,
        DTI,
        ANNUAL_INCOME,
        LAST_PAYMENT_DATE,
        NEXT_PAYMENT_DATE,
        LAST_CREDIT_PULL_DATE,
    ];

    /// Columns a file must carry to be loadable.
    pub const REQUIRED: [&str; 7] = [
        ID,
        ADDRESS_STATE,
        PURPOSE,
        LOAN_STATUS,
        ISSUE_DATE,
        LOAN_AMOUNT,
        INT_RATE,
    ];
}

/// Statuses counted as good loans unless configured otherwise.
pub const DEFAULT_GOOD_STATUSES: [&str; 4] = ["Fully Paid", "Current", "Issued", "In Grace Period"];

/// Good/bad split of loan statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoanQuality {
    Good,
    Bad,
    Unknown,
}

impl LoanQuality {
    /// Classify a raw status against the set of good statuses.
    pub fn classify<S: AsRef<str>>(status: &str, good_statuses: &[S]) -> Self {
        let status = status.trim();
        if status.is_empty() {
            LoanQuality::Unknown
        } else if good_statuses.iter().any(|g| g.as_ref().trim() == status) {
            LoanQuality::Good
        } else {
            LoanQuality::Bad
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoanQuality::Good => "Good",
            LoanQuality::Bad => "Bad",
            LoanQuality::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LoanQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid month '{0}', expected YYYY-MM")]
pub struct InvalidMonth(pub String);

impl FromStr for Month {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || InvalidMonth(s.to_string());
        let (year, month) = trimmed.split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        Month::new(year, month).ok_or_else(err)
    }
}

/// One parsed row of the loan table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanRecord {
    pub id: String,
    pub address_state: String,
    pub purpose: String,
    pub loan_status: String,
    pub quality: LoanQuality,
    pub issue_date: NaiveDate,
    pub loan_amount: f64,
    pub int_rate: f64,

    pub grade: Option<String>,
    pub sub_grade: Option<String>,
    pub term: Option<String>,
    pub emp_length: Option<String>,
    pub home_ownership: Option<String>,
    pub total_payment: Option<f64>,
    pub installment: Option<f64>,
    pub dti: Option<f64>,
    pub annual_income: Option<f64>,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    pub last_credit_pull_date: Option<NaiveDate>,

    /// Source columns without a typed field, kept as text.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl LoanRecord {
    /// Record with only the required fields set; the rest are empty.
    pub fn new(
        id: impl Into<String>,
        address_state: impl Into<String>,
        purpose: impl Into<String>,
        loan_status: impl Into<String>,
        issue_date: NaiveDate,
        loan_amount: f64,
        int_rate: f64,
    ) -> Self {
        let loan_status = loan_status.into();
        let quality = LoanQuality::classify(&loan_status, &DEFAULT_GOOD_STATUSES);
        Self {
            id: id.into(),
            address_state: address_state.into().trim().to_uppercase(),
            purpose: purpose.into(),
            loan_status,
            quality,
            issue_date,
            loan_amount,
            int_rate,
            grade: None,
            sub_grade: None,
            term: None,
            emp_length: None,
            home_ownership: None,
            total_payment: None,
            installment: None,
            dti: None,
            annual_income: None,
            last_payment_date: None,
            next_payment_date: None,
            last_credit_pull_date: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn with_total_payment(mut self, total_payment: f64) -> Self {
        self.total_payment = Some(total_payment);
        self
    }

    pub fn with_dti(mut self, dti: f64) -> Self {
        self.dti = Some(dti);
        self
    }

    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(column.into(), value.into());
        self
    }

    pub fn issue_month(&self) -> Month {
        Month::of(self.issue_date)
    }

    /// Copy with every float rounded to 2 decimals, for display tables.
    pub fn rounded(&self) -> Self {
        let round = |v: f64| (v * 100.0).round() / 100.0;
        Self {
            loan_amount: round(self.loan_amount),
            int_rate: round(self.int_rate),
            total_payment: self.total_payment.map(round),
            installment: self.installment.map(round),
            dti: self.dti.map(round),
            annual_income: self.annual_income.map(round),
            ..self.clone()
        }
    }
}
