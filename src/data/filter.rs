//! Filter Module
//! The filter specification handed in by the presentation layer and its
//! translation into a polars row predicate.

use super::record::{columns, Month};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Constraints narrowing which loans enter an aggregate.
///
/// Values arrive as raw strings from filter controls. `None` and empty
/// strings both mean "not set". The default value matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub state: Option<String>,
    pub grade: Option<String>,
    pub purpose: Option<String>,
    pub from_month: Option<String>,
    pub to_month: Option<String>,
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl FilterSpec {
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_months(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from_month = from.map(str::to_string);
        self.to_month = to.map(str::to_string);
        self
    }

    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        set(&self.state).is_none()
            && set(&self.grade).is_none()
            && set(&self.purpose).is_none()
            && set(&self.from_month).is_none()
            && set(&self.to_month).is_none()
    }

    /// Month bounds, or `Err` when a bound cannot match anything.
    fn month_range(&self) -> Result<(Option<Month>, Option<Month>), String> {
        let parse = |raw: Option<&str>| -> Result<Option<Month>, String> {
            raw.map(|m| m.parse::<Month>().map_err(|e| e.to_string()))
                .transpose()
        };
        let from = parse(set(&self.from_month))?;
        let to = parse(set(&self.to_month))?;
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(format!("month range {f}..{t} is inverted"));
            }
        }
        Ok((from, to))
    }

    /// Build the row predicate for this filter.
    ///
    /// Unparseable or inverted month bounds yield a predicate matching no
    /// rows rather than an error.
    pub fn predicate(&self) -> Expr {
        let mut predicate = lit(true);

        if let Some(state) = set(&self.state) {
            predicate = predicate.and(col(columns::ADDRESS_STATE).eq(lit(state.to_uppercase())));
        }
        if let Some(grade) = set(&self.grade) {
            predicate = predicate.and(col(columns::GRADE).eq(lit(grade.to_string())));
        }
        if let Some(purpose) = set(&self.purpose) {
            predicate = predicate.and(col(columns::PURPOSE).eq(lit(purpose.to_string())));
        }

        match self.month_range() {
            Ok((from, to)) => {
                if let Some(from) = from {
                    predicate =
                        predicate.and(col(columns::ISSUE_MONTH).gt_eq(lit(from.to_string())));
                }
                if let Some(to) = to {
                    predicate =
                        predicate.and(col(columns::ISSUE_MONTH).lt_eq(lit(to.to_string())));
                }
            }
            Err(reason) => {
                log::debug!("filter degraded to no rows: {reason}");
                predicate = lit(false);
            }
        }

        predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_empty() {
        assert!(FilterSpec::default().is_empty());
        let cleared = FilterSpec {
            state: Some("  ".into()),
            ..FilterSpec::default()
        };
        assert!(cleared.is_empty());
        assert!(!FilterSpec::default().with_grade("B").is_empty());
    }

    #[test]
    fn month_range_validation() {
        let ok = FilterSpec::default().with_months(Some("2021-01"), None);
        assert_eq!(
            ok.month_range().unwrap(),
            (Some(Month::new(2021, 1).unwrap()), None)
        );

        let inverted = FilterSpec::default().with_months(Some("2021-06"), Some("2021-01"));
        assert!(inverted.month_range().is_err());

        let garbage = FilterSpec::default().with_months(Some("June"), None);
        assert!(garbage.month_range().is_err());
    }

    #[test]
    fn filter_round_trips_through_json_with_missing_fields() {
        let spec: FilterSpec = serde_json::from_str(r#"{"state":"CA"}"#).unwrap();
        assert_eq!(spec, FilterSpec::default().with_state("CA"));
    }
}
