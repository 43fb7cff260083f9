// Date filter: restrict dataset rows by year, month and weekday

use crate::data::Dataset;
use crate::dates::DateFormat;
use crate::error::{EngineError, EngineResult};
use chrono::{Datelike, NaiveDateTime};
use std::fmt;
use tracing::{info, warn};

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Map a weekday name to Monday=0 … Sunday=6, ignoring case
pub fn weekday_index(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    WEEKDAYS.iter().position(|d| *d == name).map(|i| i as u32)
}

/// Row selection by date parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCriteria {
    None,
    Year { year: i32 },
    YearMonth { year: i32, month: u32 },
    YearWeekday { year: i32, weekday: String },
    YearMonthWeekday { year: i32, month: u32, weekday: String },
}

impl FilterCriteria {
    /// Build criteria from optional parts; month and weekday need a year
    pub fn from_parts(
        year: Option<i32>,
        month: Option<u32>,
        weekday: Option<String>,
    ) -> EngineResult<Self> {
        match (year, month, weekday) {
            (None, None, None) => Ok(FilterCriteria::None),
            (Some(year), None, None) => Ok(FilterCriteria::Year { year }),
            (Some(year), Some(month), None) => Ok(FilterCriteria::YearMonth { year, month }),
            (Some(year), None, Some(weekday)) => Ok(FilterCriteria::YearWeekday { year, weekday }),
            (Some(year), Some(month), Some(weekday)) => Ok(FilterCriteria::YearMonthWeekday {
                year,
                month,
                weekday,
            }),
            (None, _, _) => Err(EngineError::InvalidFilterSelection(
                "a month or weekday filter requires a year".to_string(),
            )),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FilterCriteria::None)
    }

    fn month(&self) -> Option<u32> {
        match self {
            FilterCriteria::YearMonth { month, .. } | FilterCriteria::YearMonthWeekday { month, .. } => {
                Some(*month)
            }
            _ => None,
        }
    }

    fn weekday(&self) -> Option<&str> {
        match self {
            FilterCriteria::YearWeekday { weekday, .. }
            | FilterCriteria::YearMonthWeekday { weekday, .. } => Some(weekday),
            _ => None,
        }
    }

    /// Selections that can never match: unknown weekday names and months
    /// outside 1-12.
    pub fn invalid_selections(&self) -> Vec<EngineError> {
        let mut problems = Vec::new();
        if let Some(month) = self.month() {
            if !(1..=12).contains(&month) {
                problems.push(EngineError::InvalidFilterSelection(format!(
                    "month {} is outside 1-12",
                    month
                )));
            }
        }
        if let Some(weekday) = self.weekday() {
            if weekday_index(weekday).is_none() {
                problems.push(EngineError::InvalidFilterSelection(format!(
                    "unknown weekday '{}'",
                    weekday
                )));
            }
        }
        problems
    }

    /// Whether a parsed date satisfies the criteria
    pub fn matches(&self, date: &NaiveDateTime) -> bool {
        let year_ok = |year: &i32| date.year() == *year;
        let weekday_ok = |name: &str| {
            weekday_index(name).map_or(false, |d| date.weekday().num_days_from_monday() == d)
        };
        match self {
            FilterCriteria::None => true,
            FilterCriteria::Year { year } => year_ok(year),
            FilterCriteria::YearMonth { year, month } => year_ok(year) && date.month() == *month,
            FilterCriteria::YearWeekday { year, weekday } => year_ok(year) && weekday_ok(weekday),
            FilterCriteria::YearMonthWeekday {
                year,
                month,
                weekday,
            } => year_ok(year) && date.month() == *month && weekday_ok(weekday),
        }
    }
}

impl fmt::Display for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterCriteria::None => write!(f, "none"),
            FilterCriteria::Year { year } => write!(f, "year={}", year),
            FilterCriteria::YearMonth { year, month } => write!(f, "year={}, month={}", year, month),
            FilterCriteria::YearWeekday { year, weekday } => {
                write!(f, "year={}, weekday={}", year, weekday)
            }
            FilterCriteria::YearMonthWeekday {
                year,
                month,
                weekday,
            } => write!(f, "year={}, month={}, weekday={}", year, month, weekday),
        }
    }
}

/// Row mask for `criteria` over one date column; unparseable cells never match
pub fn build_mask(
    data: &Dataset,
    date_column: &str,
    format: &DateFormat,
    criteria: &FilterCriteria,
) -> EngineResult<Vec<bool>> {
    let index = data
        .column_index(date_column)
        .ok_or_else(|| EngineError::ColumnNotFound(date_column.to_string()))?;

    if criteria.is_none() {
        return Ok(vec![true; data.row_count()]);
    }

    Ok(data
        .column(index)
        .map(|cell| {
            format
                .parse_lenient(cell)
                .map_or(false, |date| criteria.matches(&date))
        })
        .collect())
}

/// A filtered view together with the mask that produced it
#[derive(Debug, Clone)]
pub struct FilteredView {
    pub data: Dataset,
    pub mask: Vec<bool>,
    /// Recoverable conditions met while filtering
    pub warnings: Vec<EngineError>,
}

impl FilteredView {
    pub fn matched(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }
}

/// Filter rows by date. Invalid selections and an empty result are reported
/// as warnings; the (possibly empty) view is always returned.
pub fn filter_by_date(
    data: &Dataset,
    date_column: &str,
    format: &DateFormat,
    criteria: &FilterCriteria,
) -> EngineResult<FilteredView> {
    let mut warnings = criteria.invalid_selections();
    for problem in &warnings {
        warn!("{}", problem);
    }

    let mask = build_mask(data, date_column, format, criteria)?;
    let mut filtered = FilteredView {
        data: data.select_rows(&mask),
        mask,
        warnings,
    };
    info!(
        "Filter on '{}' ({}) kept {} of {} rows",
        date_column,
        criteria,
        filtered.matched(),
        data.row_count()
    );

    if filtered.matched() == 0 {
        warn!("{}", EngineError::EmptyFilterResult);
        filtered.warnings.push(EngineError::EmptyFilterResult);
    }

    Ok(filtered)
}
