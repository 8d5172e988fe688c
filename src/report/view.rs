//! Summary View Module
//! Assembles everything a dashboard render needs from one filter request.

use crate::charts::{ChartData, ChartPlotter};
use crate::config::ReportConfig;
use crate::data::{columns, FilterSpec, LoanRecord, LoanTable};
use crate::stats::{Aggregator, Dimension, GroupTotal, Kpis, Measure, QualitySplit, StatsError};
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to filter loans: {0}")]
    Filter(#[from] PolarsError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Details fields computed at load time rather than read from the file.
const DERIVED_COLUMNS: [&str; 2] = ["quality", columns::ISSUE_MONTH];

/// What the presentation layer asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryRequest {
    pub filter: FilterSpec,
    pub measure: Measure,
}

impl SummaryRequest {
    pub fn new(filter: FilterSpec) -> Self {
        Self {
            filter,
            measure: Measure::default(),
        }
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measure = measure;
        self
    }
}

/// Values available to each filter control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub states: Vec<String>,
    pub grades: Vec<String>,
    pub purposes: Vec<String>,
    pub months: Vec<String>,
}

impl FilterOptions {
    pub fn of(table: &LoanTable) -> Self {
        Self {
            states: table.distinct(columns::ADDRESS_STATE),
            grades: table.distinct(columns::GRADE),
            purposes: table.distinct(columns::PURPOSE),
            months: table.distinct(columns::ISSUE_MONTH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charts {
    pub monthly_trend: ChartData,
    pub state_map: ChartData,
    pub top_purposes: ChartData,
    pub grade_distribution: ChartData,
    pub good_donut: ChartData,
    pub bad_donut: ChartData,
}

/// One details row: the rounded record plus its derived issue month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    #[serde(flatten)]
    pub record: LoanRecord,
    pub issue_month: String,
}

impl DetailRow {
    fn of(record: &LoanRecord) -> Self {
        Self {
            issue_month: record.issue_month().to_string(),
            record: record.rounded(),
        }
    }
}

/// Row-level view of the filtered loans, capped for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailsTable {
    /// Source columns in file order, then the derived ones.
    pub columns: Vec<String>,
    /// Number of filtered loans before the cap.
    pub total: usize,
    pub rows: Vec<DetailRow>,
}

/// Result of one dashboard request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub filter: FilterSpec,
    pub measure: Measure,
    pub kpis: Kpis,
    pub quality: QualitySplit,
    pub by_state: Vec<GroupTotal>,
    pub by_purpose: Vec<GroupTotal>,
    pub by_grade: Vec<GroupTotal>,
    pub by_month: Vec<GroupTotal>,
    pub by_term: Vec<GroupTotal>,
    pub charts: Charts,
    pub details: DetailsTable,
    pub options: FilterOptions,
}

/// Compute the summary for one request.
///
/// Output depends only on the arguments. Filter values that match nothing,
/// including malformed months, produce an all-zero view.
pub fn build_summary(
    table: &LoanTable,
    request: &SummaryRequest,
    config: &ReportConfig,
) -> Result<SummaryView, ReportError> {
    build_summary_with_options(table, request, config, FilterOptions::of(table))
}

pub(crate) fn build_summary_with_options(
    table: &LoanTable,
    request: &SummaryRequest,
    config: &ReportConfig,
    options: FilterOptions,
) -> Result<SummaryView, ReportError> {
    let loans = table.filter(&request.filter)?;
    log::debug!(
        "summary for {:?}: {} of {} loans",
        request.filter,
        loans.len(),
        table.len()
    );

    let kpis = Aggregator::kpis(&loans)?;
    let quality = Aggregator::quality_split(&loans)?;
    let by_state = Aggregator::breakdown(&loans, Dimension::State)?;
    let by_purpose = Aggregator::breakdown(&loans, Dimension::Purpose)?;
    let by_grade = Aggregator::breakdown(&loans, Dimension::Grade)?;
    let by_month = Aggregator::breakdown(&loans, Dimension::Month)?;
    let by_term = Aggregator::breakdown(&loans, Dimension::Term)?;
    let top_purposes = Aggregator::top_groups(
        &loans,
        Dimension::Purpose,
        Measure::TotalFunded,
        config.top_purposes,
    )?;

    let (good_donut, bad_donut) = ChartPlotter::quality_donuts(&quality);
    let charts = Charts {
        monthly_trend: ChartPlotter::monthly_trend(&by_month, request.measure),
        state_map: ChartPlotter::state_map(&by_state, Measure::TotalFunded),
        top_purposes: ChartPlotter::bar(
            "Top Purposes by Funded Amount",
            Dimension::Purpose,
            &top_purposes,
            Measure::TotalFunded,
        ),
        grade_distribution: ChartPlotter::pie(
            "Distribution by Grade",
            &by_grade,
            Measure::TotalApplications,
        ),
        good_donut,
        bad_donut,
    };

    let details = DetailsTable {
        columns: table
            .source_columns()
            .iter()
            .cloned()
            .chain(DERIVED_COLUMNS.iter().map(|c| c.to_string()))
            .collect(),
        total: loans.len(),
        rows: loans
            .records()?
            .into_iter()
            .take(config.details_row_limit)
            .map(DetailRow::of)
            .collect(),
    };

    Ok(SummaryView {
        filter: request.filter.clone(),
        measure: request.measure,
        kpis,
        quality,
        by_state,
        by_purpose,
        by_grade,
        by_month,
        by_term,
        charts,
        details,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(n: usize) -> LoanTable {
        let d = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        LoanTable::from_records(
            (0..n)
                .map(|i| {
                    let purpose = format!("p{}", i % 12);
                    let amount = 100.0 + i as f64;
                    LoanRecord::new(i.to_string(), "TX", purpose, "Current", d, amount, 0.1)
                        .with_term(if i % 2 == 0 { "36 months" } else { "60 months" })
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn details_are_capped_but_total_is_not() {
        let config = ReportConfig {
            details_row_limit: 5,
            ..ReportConfig::default()
        };
        let view = build_summary(&table(8), &SummaryRequest::default(), &config).unwrap();
        assert_eq!(view.details.total, 8);
        assert_eq!(view.details.rows.len(), 5);
        assert_eq!(view.details.rows[0].record.id, "0");
        assert_eq!(view.details.rows[0].issue_month, "2021-06");
        assert_eq!(view.details.columns.last().map(String::as_str), Some("issue_month"));
    }

    #[test]
    fn default_request_trends_funded_amount() {
        let view = build_summary(&table(4), &SummaryRequest::default(), &ReportConfig::default())
            .unwrap();
        assert_eq!(view.measure, Measure::TotalFunded);
        match &view.charts.monthly_trend {
            ChartData::Line { title, points, .. } => {
                assert_eq!(title, "Total Funded Amount by Month");
                assert_eq!(points[0].y, 100.0 + 101.0 + 102.0 + 103.0);
            }
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn terms_are_broken_down() {
        let view = build_summary(&table(5), &SummaryRequest::default(), &ReportConfig::default())
            .unwrap();
        let terms: Vec<(&str, u64)> = view
            .by_term
            .iter()
            .map(|g| (g.key.as_str(), g.count))
            .collect();
        assert_eq!(terms, vec![("36 months", 3), ("60 months", 2)]);
    }

    #[test]
    fn top_purposes_respects_config() {
        let view = build_summary(&table(30), &SummaryRequest::default(), &ReportConfig::default())
            .unwrap();
        match &view.charts.top_purposes {
            ChartData::Bar { bars, .. } => assert_eq!(bars.len(), 10),
            other => panic!("expected a bar chart, got {other:?}"),
        }
        assert_eq!(view.by_purpose.len(), 12);
    }

    #[test]
    fn options_come_from_whole_table() {
        let request = SummaryRequest::new(FilterSpec::default().with_state("ZZ"));
        let view = build_summary(&table(3), &request, &ReportConfig::default()).unwrap();
        assert_eq!(view.kpis.total_applications, 0);
        assert_eq!(view.options.states, vec!["TX"]);
        assert_eq!(view.options.months, vec!["2021-06"]);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: SummaryRequest =
            serde_json::from_str(r#"{"measure":"total_funded","filter":{"grade":"B"}}"#).unwrap();
        assert_eq!(request.measure, Measure::TotalFunded);
        assert_eq!(request.filter.grade.as_deref(), Some("B"));
    }
}
