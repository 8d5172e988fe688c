//! Loan Aggregation Module
//! KPIs, grouped breakdowns and good/bad split over a filtered loan view.

use crate::data::{columns, FilteredLoans, LoanQuality};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, OrderStatistics};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key used for rows whose dimension value is missing.
pub const UNKNOWN_KEY: &str = "Unknown";

const KEY: &str = "key";
const COUNT: &str = "count";
const TOTAL_FUNDED: &str = "total_funded";
const TOTAL_RECEIVED: &str = "total_received";
const AVG_INT_RATE: &str = "avg_int_rate";

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Categorical dimension a breakdown groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    State,
    Purpose,
    Grade,
    Month,
    Quality,
    Term,
}

impl Dimension {
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::State => columns::ADDRESS_STATE,
            Dimension::Purpose => columns::PURPOSE,
            Dimension::Grade => columns::GRADE,
            Dimension::Month => columns::ISSUE_MONTH,
            Dimension::Quality => columns::QUALITY,
            Dimension::Term => columns::TERM,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::State => "State",
            Dimension::Purpose => "Purpose",
            Dimension::Grade => "Grade",
            Dimension::Month => "Issue Month",
            Dimension::Quality => "Loan Quality",
            Dimension::Term => "Term",
        }
    }
}

/// Quantity plotted per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    TotalApplications,
    #[default]
    TotalFunded,
    TotalReceived,
    AvgIntRate,
}

impl Measure {
    pub fn label(&self) -> &'static str {
        match self {
            Measure::TotalApplications => "Total Loan Applications",
            Measure::TotalFunded => "Total Funded Amount",
            Measure::TotalReceived => "Total Amount Received",
            Measure::AvgIntRate => "Avg Interest Rate",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown measure '{0}'")]
pub struct UnknownMeasure(pub String);

impl FromStr for Measure {
    type Err = UnknownMeasure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "total_apps" | "total_applications" => Ok(Measure::TotalApplications),
            "total_funded" => Ok(Measure::TotalFunded),
            "total_received" => Ok(Measure::TotalReceived),
            "avg_int_rate" => Ok(Measure::AvgIntRate),
            _ => Err(UnknownMeasure(s.to_string())),
        }
    }
}

/// Totals for one value of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub count: u64,
    pub total_funded: f64,
    pub total_received: f64,
    pub avg_int_rate: Option<f64>,
}

impl GroupTotal {
    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::TotalApplications => self.count as f64,
            Measure::TotalFunded => self.total_funded,
            Measure::TotalReceived => self.total_received,
            Measure::AvgIntRate => self.avg_int_rate.unwrap_or(0.0),
        }
    }
}

/// Distribution of interest rates across the filtered loans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p05: f64,
    pub p95: f64,
}

/// Headline figures of a filtered view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_applications: u64,
    pub unique_loans: u64,
    pub total_funded: f64,
    pub total_received: f64,
    pub avg_int_rate: Option<f64>,
    pub avg_dti: Option<f64>,
    pub int_rate_stats: Option<RateStats>,
}

/// Good vs bad loan counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualitySplit {
    pub good: u64,
    pub bad: u64,
    pub unknown: u64,
    /// Share of good loans among good and bad, in percent.
    pub good_pct: f64,
    pub bad_pct: f64,
}

/// Aggregations over filtered loans. Every function is pure.
pub struct Aggregator;

impl Aggregator {
    /// Non-null values of a float column.
    fn values(loans: &FilteredLoans<'_>, column: &str) -> Result<Vec<f64>, StatsError> {
        Ok(loans
            .frame()
            .column(column)?
            .f64()?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Descriptive statistics for a sample, `None` when empty.
    pub fn describe(values: &[f64]) -> Option<RateStats> {
        if values.is_empty() {
            return None;
        }

        let mut data = Data::new(values.to_vec());
        let mean = data.mean().unwrap_or(f64::NAN);
        let std_dev = data
            .std_dev()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);

        Some(RateStats {
            count: values.len(),
            mean,
            median: data.median(),
            std_dev,
            p05: data.percentile(5),
            p95: data.percentile(95),
        })
    }

    pub fn kpis(loans: &FilteredLoans<'_>) -> Result<Kpis, StatsError> {
        if loans.is_empty() {
            return Ok(Kpis::default());
        }

        let amounts = Self::values(loans, columns::LOAN_AMOUNT)?;
        let payments = Self::values(loans, columns::TOTAL_PAYMENT)?;
        let rates = Self::values(loans, columns::INT_RATE)?;
        let dtis = Self::values(loans, columns::DTI)?;

        let ids = loans.frame().column(columns::ID)?.str()?;
        let unique: HashSet<&str> = ids.into_iter().flatten().collect();

        let int_rate_stats = Self::describe(&rates);
        let avg_dti = Self::describe(&dtis).map(|s| s.mean);

        Ok(Kpis {
            total_applications: loans.len() as u64,
            unique_loans: unique.len() as u64,
            total_funded: amounts.iter().fold(0.0, |acc, v| acc + v),
            total_received: payments.iter().fold(0.0, |acc, v| acc + v),
            avg_int_rate: int_rate_stats.as_ref().map(|s| s.mean),
            avg_dti,
            int_rate_stats,
        })
    }

    /// Totals per dimension value, sorted by key.
    ///
    /// Missing values are grouped under [`UNKNOWN_KEY`], so group counts
    /// always add up to the number of filtered loans.
    pub fn breakdown(
        loans: &FilteredLoans<'_>,
        dimension: Dimension,
    ) -> Result<Vec<GroupTotal>, StatsError> {
        if loans.is_empty() {
            return Ok(Vec::new());
        }

        let grouped = loans
            .frame()
            .clone()
            .lazy()
            .group_by([col(dimension.column())
                .fill_null(lit(UNKNOWN_KEY))
                .alias(KEY)])
            .agg([
                col(columns::LOAN_AMOUNT).count().alias(COUNT),
                col(columns::LOAN_AMOUNT).sum().alias(TOTAL_FUNDED),
                col(columns::TOTAL_PAYMENT).sum().alias(TOTAL_RECEIVED),
                col(columns::INT_RATE).mean().alias(AVG_INT_RATE),
            ])
            .collect()?;

        let keys = grouped.column(KEY)?.str()?;
        let counts = grouped.column(COUNT)?.cast(&DataType::UInt64)?;
        let counts = counts.u64()?;
        let funded = grouped.column(TOTAL_FUNDED)?.cast(&DataType::Float64)?;
        let funded = funded.f64()?;
        let received = grouped.column(TOTAL_RECEIVED)?.cast(&DataType::Float64)?;
        let received = received.f64()?;
        let rates = grouped.column(AVG_INT_RATE)?.cast(&DataType::Float64)?;
        let rates = rates.f64()?;

        let mut groups: Vec<GroupTotal> = (0..grouped.height())
            .filter_map(|i| {
                Some(GroupTotal {
                    key: keys.get(i)?.to_string(),
                    count: counts.get(i).unwrap_or(0),
                    total_funded: funded.get(i).unwrap_or(0.0),
                    total_received: received.get(i).unwrap_or(0.0),
                    avg_int_rate: rates.get(i).filter(|v| !v.is_nan()),
                })
            })
            .collect();

        groups.sort_by(|a, b| a.key.cmp(&b.key));
        log::debug!(
            "breakdown by {:?}: {} groups over {} loans",
            dimension,
            groups.len(),
            loans.len()
        );
        Ok(groups)
    }

    /// The `n` largest groups by `measure`, ties broken by key.
    pub fn top_groups(
        loans: &FilteredLoans<'_>,
        dimension: Dimension,
        measure: Measure,
        n: usize,
    ) -> Result<Vec<GroupTotal>, StatsError> {
        let mut groups = Self::breakdown(loans, dimension)?;
        groups.sort_by(|a, b| {
            b.measure(measure)
                .total_cmp(&a.measure(measure))
                .then_with(|| a.key.cmp(&b.key))
        });
        groups.truncate(n);
        Ok(groups)
    }

    pub fn quality_split(loans: &FilteredLoans<'_>) -> Result<QualitySplit, StatsError> {
        let mut split = QualitySplit::default();
        for group in Self::breakdown(loans, Dimension::Quality)? {
            if group.key == LoanQuality::Good.label() {
                split.good = group.count;
            } else if group.key == LoanQuality::Bad.label() {
                split.bad = group.count;
            } else {
                split.unknown += group.count;
            }
        }

        let classified = split.good + split.bad;
        if classified > 0 {
            split.good_pct = split.good as f64 * 100.0 / classified as f64;
            split.bad_pct = split.bad as f64 * 100.0 / classified as f64;
        }
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FilterSpec, LoanRecord, LoanTable};
    use chrono::NaiveDate;

    fn table() -> LoanTable {
        let d = |m| NaiveDate::from_ymd_opt(2021, m, 15).unwrap();
        LoanTable::from_records(vec![
            LoanRecord::new("1", "CA", "car", "Fully Paid", d(1), 1000.0, 0.10)
                .with_grade("A")
                .with_total_payment(1100.0),
            LoanRecord::new("2", "CA", "credit_card", "Charged Off", d(2), 2000.0, 0.20)
                .with_total_payment(400.0)
                .with_dti(0.3),
            LoanRecord::new("3", "NY", "car", "Current", d(2), 500.0, 0.15)
                .with_grade("A")
                .with_dti(0.1),
        ])
        .unwrap()
    }

    #[test]
    fn breakdown_by_state_sums_amounts() {
        let table = table();
        let groups = Aggregator::breakdown(&table.all(), Dimension::State).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "CA");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].total_funded, 3000.0);
        assert_eq!(groups[0].total_received, 1500.0);
        assert_eq!(groups[1].key, "NY");
        assert_eq!(groups[1].total_funded, 500.0);
        assert_eq!(groups[1].total_received, 0.0);
    }

    #[test]
    fn missing_grades_group_as_unknown() {
        let table = table();
        let groups = Aggregator::breakdown(&table.all(), Dimension::Grade).unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["A", UNKNOWN_KEY]);
        assert_eq!(groups.iter().map(|g| g.count).sum::<u64>(), 3);
    }

    #[test]
    fn months_sort_chronologically() {
        let table = table();
        let groups = Aggregator::breakdown(&table.all(), Dimension::Month).unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2021-01", "2021-02"]);
    }

    #[test]
    fn kpis_cover_amounts_and_rates() {
        let table = table();
        let kpis = Aggregator::kpis(&table.all()).unwrap();
        assert_eq!(kpis.total_applications, 3);
        assert_eq!(kpis.unique_loans, 3);
        assert_eq!(kpis.total_funded, 3500.0);
        assert_eq!(kpis.total_received, 1500.0);
        assert!((kpis.avg_int_rate.unwrap() - 0.15).abs() < 1e-12);
        assert!((kpis.avg_dti.unwrap() - 0.2).abs() < 1e-12);
        let stats = kpis.int_rate_stats.unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.median - 0.15).abs() < 1e-12);
    }

    #[test]
    fn missing_payments_sum_to_positive_zero() {
        let d = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let table = LoanTable::from_records(vec![
            LoanRecord::new("1", "CA", "car", "Current", d, 1000.0, 0.10),
            LoanRecord::new("2", "CA", "car", "Current", d, 2000.0, 0.10),
        ])
        .unwrap();
        let kpis = Aggregator::kpis(&table.all()).unwrap();
        assert!(kpis.total_received == 0.0 && kpis.total_received.is_sign_positive());

        let json = serde_json::to_string(&kpis).unwrap();
        assert!(json.contains(r#""total_received":0.0"#), "{json}");
    }

    #[test]
    fn breakdown_by_term_groups_term_text() {
        let d = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let table = LoanTable::from_records(vec![
            LoanRecord::new("1", "CA", "car", "Current", d, 1000.0, 0.10).with_term("36 months"),
            LoanRecord::new("2", "NY", "car", "Current", d, 2000.0, 0.12).with_term("60 months"),
            LoanRecord::new("3", "NY", "car", "Current", d, 500.0, 0.14).with_term("36 months"),
            LoanRecord::new("4", "TX", "car", "Current", d, 700.0, 0.16),
        ])
        .unwrap();
        let groups = Aggregator::breakdown(&table.all(), Dimension::Term).unwrap();
        let totals: Vec<(&str, u64, f64)> = groups
            .iter()
            .map(|g| (g.key.as_str(), g.count, g.total_funded))
            .collect();
        assert_eq!(
            totals,
            vec![
                ("36 months", 2, 1500.0),
                ("60 months", 1, 2000.0),
                (UNKNOWN_KEY, 1, 700.0),
            ]
        );
    }

    #[test]
    fn empty_view_yields_zero_aggregates() {
        let table = table();
        let none = table
            .filter(&FilterSpec::default().with_state("TX"))
            .unwrap();
        assert_eq!(Aggregator::kpis(&none).unwrap(), Kpis::default());
        assert!(Aggregator::breakdown(&none, Dimension::Purpose)
            .unwrap()
            .is_empty());
        assert_eq!(Aggregator::quality_split(&none).unwrap(), QualitySplit::default());
    }

    #[test]
    fn top_groups_orders_by_measure() {
        let table = table();
        let top = Aggregator::top_groups(&table.all(), Dimension::Purpose, Measure::TotalFunded, 1)
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].key, "credit_card");

        let by_count =
            Aggregator::top_groups(&table.all(), Dimension::Purpose, Measure::TotalApplications, 5)
                .unwrap();
        assert_eq!(by_count[0].key, "car");
    }

    #[test]
    fn quality_split_percentages() {
        let table = table();
        let split = Aggregator::quality_split(&table.all()).unwrap();
        assert_eq!((split.good, split.bad, split.unknown), (2, 1, 0));
        assert!((split.good_pct - 200.0 / 3.0).abs() < 1e-9);
        assert!((split.good_pct + split.bad_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn describe_single_value_has_zero_spread() {
        let stats = Aggregator::describe(&[0.12]).unwrap();
        assert_eq!(stats.mean, 0.12);
        assert_eq!(stats.std_dev, 0.0);
        assert!(Aggregator::describe(&[]).is_none());
    }

    #[test]
    fn measure_parses_dashboard_ids() {
        assert_eq!("total_apps".parse::<Measure>().unwrap(), Measure::TotalApplications);
        assert_eq!("total-funded".parse::<Measure>().unwrap(), Measure::TotalFunded);
        assert!("median".parse::<Measure>().is_err());
    }
}
