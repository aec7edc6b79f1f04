// Month labels and month arithmetic.
//
// Task allocations are recorded per `YYYY-MM` month. Everything that needs to
// turn those labels into dates (Gantt windows, durations, chart axes) goes
// through this module.
use crate::error::{ReportError, Result};
use crate::types::{Month, TaskActivity};
use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

static MONTH_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("month label pattern compiles"));

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Month> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Month { year, month })
    }

    /// Strict `YYYY-MM` parser; `2025-6` and `2025-13` are both rejected.
    pub fn parse(label: &str) -> Result<Month> {
        let caps = MONTH_LABEL
            .captures(label.trim())
            .ok_or_else(|| ReportError::parse("month", label))?;
        let year: i32 = caps[1].parse().map_err(|_| ReportError::parse("month", label))?;
        let month: u32 = caps[2].parse().map_err(|_| ReportError::parse("month", label))?;
        Month::new(year, month).ok_or_else(|| ReportError::parse("month", label))
    }

    pub fn of(date: NaiveDate) -> Month {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // constructors only admit valid months
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        if self.month == 12 {
            return NaiveDate::from_ymd_opt(self.year, 12, 31).unwrap_or_default();
        }
        self.succ().first_day() - Duration::days(1)
    }

    pub fn succ(&self) -> Month {
        if self.month == 12 {
            Month {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Month {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    fn index(&self) -> i32 {
        self.year * 12 + self.month as i32
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Month::parse(&label).map_err(serde::de::Error::custom)
    }
}

/// First day of the month named by a `YYYY-MM` label.
pub fn parse_month(label: &str) -> Result<NaiveDate> {
    Month::parse(label).map(|m| m.first_day())
}

/// Whole months between the two dates' months; days are ignored.
pub fn month_span(start: NaiveDate, end: NaiveDate) -> i32 {
    Month::of(end).index() - Month::of(start).index()
}

/// Reporting duration, counting both boundary months.
pub fn duration_months(start: NaiveDate, end: NaiveDate) -> i32 {
    month_span(start, end) + 1
}

/// Inclusive list of months from `start` to `end`; empty when reversed.
pub fn months_between(start: Month, end: Month) -> Vec<Month> {
    let mut months = Vec::new();
    let mut current = start;
    while current <= end {
        months.push(current);
        current = current.succ();
    }
    months
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Span covered by a task's monthly allocations: the first day of the
/// earliest month to the last day of the latest. `None` for tasks without
/// allocations, which callers leave off any timeline.
pub fn resolve_task_window(activities: &[TaskActivity]) -> Option<TaskWindow> {
    let first = activities.iter().map(|a| a.month).min()?;
    let last = activities.iter().map(|a| a.month).max()?;
    Some(TaskWindow {
        start: first.first_day(),
        end: last.last_day(),
    })
}
