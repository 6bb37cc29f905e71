use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::aggregate::{self, CrossTab};
use crate::models::{Attribute, FunnelCounts, SignupRecord};

const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];

/// Timestamp of an export cell; bare dates land on midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|datetime| datetime.naive_local())
        })
}

/// `YYYY-MM` key of an application timestamp, or `None` when unparsable.
pub fn month_key(raw: &str) -> Option<String> {
    let date = parse_timestamp(raw)?;
    Some(format!("{:04}-{:02}", date.year(), date.month()))
}

/// Distinct observed months in ascending order. Months with no sign-ups are absent.
pub fn months(records: &[SignupRecord]) -> Vec<String> {
    let mut months: Vec<String> = records
        .iter()
        .filter_map(|record| record.applied_month.clone())
        .collect();
    months.sort();
    months.dedup();
    months
}

#[derive(Debug, Clone)]
pub struct MonthSummary {
    pub month: String,
    pub counts: FunnelCounts,
}

pub fn summarize(records: &[SignupRecord]) -> (Vec<MonthSummary>, FunnelCounts) {
    let table = aggregate::conversion_by(records, Attribute::Month);
    let rows = table
        .rows
        .into_iter()
        .map(|row| MonthSummary {
            month: row.category,
            counts: row.counts,
        })
        .collect();
    (rows, table.total)
}

/// Month × attribute tables over every observed month, including months in
/// which the attribute was never filled in.
#[derive(Debug, Clone)]
pub struct MonthlyCross {
    pub months: Vec<String>,
    pub cross: CrossTab,
}

impl MonthlyCross {
    pub fn build(records: &[SignupRecord], attribute: Attribute) -> Self {
        Self {
            months: months(records),
            cross: aggregate::cross_tab(records, Attribute::Month, attribute),
        }
    }

    fn row(&self, month: &str) -> Option<usize> {
        self.cross.row_index(month)
    }

    pub fn submitted(&self, month: &str) -> Vec<usize> {
        match self.row(month) {
            Some(i) => self.cross.submitted[i].clone(),
            None => vec![0; self.cross.col_keys.len()],
        }
    }

    pub fn closed(&self, month: &str) -> Vec<usize> {
        match self.row(month) {
            Some(i) => self.cross.closed[i].clone(),
            None => vec![0; self.cross.col_keys.len()],
        }
    }

    pub fn rates(&self, month: &str) -> Vec<Option<f64>> {
        match self.row(month) {
            Some(i) => (0..self.cross.col_keys.len())
                .map(|j| self.cross.rate(i, j))
                .collect(),
            None => vec![None; self.cross.col_keys.len()],
        }
    }

    /// Closing rate across every category of the month; zero for an empty month.
    pub fn month_rate(&self, month: &str) -> f64 {
        self.row(month)
            .map(|i| self.cross.row_counts(i).closing_rate())
            .unwrap_or(0.0)
    }

    /// Share of each category within the month's sign-ups.
    pub fn composition(&self, month: &str) -> Vec<f64> {
        match self.row(month) {
            Some(i) => self.cross.row_shares(i),
            None => vec![0.0; self.cross.col_keys.len()],
        }
    }
}
