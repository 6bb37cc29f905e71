use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{
    percent, Attribute, ConversionRow, ConversionTable, DistributionEntry, FunnelCounts,
    SignupRecord, StaffSummary,
};

pub fn overall(records: &[SignupRecord]) -> FunnelCounts {
    let mut counts = FunnelCounts::default();
    for record in records {
        counts.add(record);
    }
    counts
}

/// Funnel counts per category; rows missing the attribute are left out.
pub fn conversion_by(records: &[SignupRecord], attribute: Attribute) -> ConversionTable {
    let mut groups: BTreeMap<&str, FunnelCounts> = BTreeMap::new();
    for record in records {
        if let Some(category) = record.value(attribute) {
            groups.entry(category).or_default().add(record);
        }
    }

    let mut total = FunnelCounts::default();
    let rows = groups
        .into_iter()
        .map(|(category, counts)| {
            total.merge(&counts);
            ConversionRow {
                category: category.to_string(),
                counts,
            }
        })
        .collect();

    ConversionTable { rows, total }
}

impl ConversionTable {
    /// Most closed deals first; ties keep the larger group ahead.
    pub fn ranked_by_closed(mut self) -> Self {
        self.rows.sort_by(|a, b| {
            b.counts
                .closed
                .cmp(&a.counts.closed)
                .then(b.counts.submitted.cmp(&a.counts.submitted))
        });
        self
    }
}

/// Value counts including the missing bucket, largest first.
pub fn distribution(records: &[SignupRecord], attribute: Attribute) -> Vec<DistributionEntry> {
    let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.value(attribute)).or_insert(0) += 1;
    }

    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(value, count)| DistributionEntry {
            value: value.map(str::to_string),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries
}

/// Value counts in value order, missing bucket last.
pub fn distribution_by_value(
    records: &[SignupRecord],
    attribute: Attribute,
) -> Vec<DistributionEntry> {
    let mut entries = distribution(records, attribute);
    entries.sort_by(|a, b| match (&a.value, &b.value) {
        (Some(a), Some(b)) => a.cmp(b),
        (a, b) => a.is_none().cmp(&b.is_none()),
    });
    entries
}

/// Two-dimensional submitted / closed counts over rows that carry both attributes.
#[derive(Debug, Clone, Default)]
pub struct CrossTab {
    pub row_keys: Vec<String>,
    pub col_keys: Vec<String>,
    pub submitted: Vec<Vec<usize>>,
    pub closed: Vec<Vec<usize>>,
}

pub fn cross_tab(records: &[SignupRecord], row: Attribute, col: Attribute) -> CrossTab {
    let pairs: Vec<(&str, &str, bool)> = records
        .iter()
        .filter_map(|record| Some((record.value(row)?, record.value(col)?, record.closed)))
        .collect();

    let row_keys: Vec<String> = pairs
        .iter()
        .map(|(r, _, _)| *r)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let col_keys: Vec<String> = pairs
        .iter()
        .map(|(_, c, _)| *c)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut submitted = vec![vec![0; col_keys.len()]; row_keys.len()];
    let mut closed = vec![vec![0; col_keys.len()]; row_keys.len()];
    for (r, c, is_closed) in pairs {
        // Keys are sorted and deduplicated, so the lookups cannot miss.
        let (Ok(i), Ok(j)) = (
            row_keys.binary_search_by(|key| key.as_str().cmp(r)),
            col_keys.binary_search_by(|key| key.as_str().cmp(c)),
        ) else {
            continue;
        };
        submitted[i][j] += 1;
        closed[i][j] += usize::from(is_closed);
    }

    CrossTab {
        row_keys,
        col_keys,
        submitted,
        closed,
    }
}

impl CrossTab {
    pub fn row_index(&self, key: &str) -> Option<usize> {
        self.row_keys
            .binary_search_by(|candidate| candidate.as_str().cmp(key))
            .ok()
    }

    pub fn row_counts(&self, i: usize) -> FunnelCounts {
        FunnelCounts {
            submitted: self.submitted[i].iter().sum(),
            executed: 0,
            closed: self.closed[i].iter().sum(),
        }
    }

    pub fn col_counts(&self, j: usize) -> FunnelCounts {
        FunnelCounts {
            submitted: self.submitted.iter().map(|row| row[j]).sum(),
            executed: 0,
            closed: self.closed.iter().map(|row| row[j]).sum(),
        }
    }

    pub fn grand_total(&self) -> FunnelCounts {
        let mut total = FunnelCounts::default();
        for i in 0..self.row_keys.len() {
            total.merge(&self.row_counts(i));
        }
        total
    }

    /// Closing rate of one cell; `None` when the cell has no sign-ups.
    pub fn rate(&self, i: usize, j: usize) -> Option<f64> {
        let n = self.submitted[i][j];
        (n > 0).then(|| percent(self.closed[i][j], n))
    }

    /// Each cell's share of its row.
    pub fn row_shares(&self, i: usize) -> Vec<f64> {
        let total = self.row_counts(i).submitted;
        self.submitted[i]
            .iter()
            .map(|count| percent(*count, total))
            .collect()
    }

    /// Indices of rows with at least `min_samples` sign-ups, largest first.
    pub fn rows_by_volume(&self, min_samples: usize) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..self.row_keys.len())
            .filter(|i| self.row_counts(*i).submitted >= min_samples)
            .collect();
        rows.sort_by(|a, b| {
            self.row_counts(*b)
                .submitted
                .cmp(&self.row_counts(*a).submitted)
        });
        rows
    }
}

/// Per-consultant funnel counts, best closing rate first, plus the overall counts.
pub fn staff_summary(records: &[SignupRecord]) -> (Vec<StaffSummary>, FunnelCounts) {
    let everyone = overall(records);
    let baseline = everyone.closing_rate();

    let mut summaries: Vec<StaffSummary> = conversion_by(records, Attribute::Staff)
        .rows
        .into_iter()
        .map(|row| StaffSummary {
            diff_points: row.counts.closing_rate() - baseline,
            staff: row.category,
            counts: row.counts,
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.counts
            .closing_rate()
            .partial_cmp(&a.counts.closing_rate())
            .unwrap_or(Ordering::Equal)
    });
    (summaries, everyone)
}
