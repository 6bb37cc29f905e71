use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Weekday};
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::classify;
use crate::config::{SessionConfig, SignupConfig};
use crate::error::ReportError;
use crate::models::{Attribute, Column, SessionRecord, SignupRecord, Slot};
use crate::monthly;

/// Sign-up rows plus the columns the export actually carried.
#[derive(Debug, Clone, Default)]
pub struct SignupTable {
    pub records: Vec<SignupRecord>,
    /// Header cells in file order.
    pub headers: Vec<String>,
    columns: BTreeSet<Column>,
}

impl SignupTable {
    pub fn new(records: Vec<SignupRecord>, columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            records,
            headers: Vec::new(),
            columns: columns.into_iter().collect(),
        }
    }

    pub fn has(&self, attribute: Attribute) -> bool {
        self.columns.contains(&attribute.source())
    }

    pub fn require(&self, attributes: &[Attribute]) -> Result<(), ReportError> {
        match attributes.iter().find(|attribute| !self.has(**attribute)) {
            Some(missing) => Err(ReportError::MissingColumn(
                missing.source().name().to_string(),
            )),
            None => Ok(()),
        }
    }
}

pub fn load_signups(path: &Path, config: &SignupConfig) -> anyhow::Result<SignupTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();

    let mut columns = BTreeMap::new();
    for column in Column::ALL {
        let matcher = config.columns.get(column);
        match headers.iter().position(|header| matcher.matches(header)) {
            Some(index) => {
                debug!(column = column.name(), index, "resolved column");
                columns.insert(column, index);
            }
            None => warn!(column = column.name(), "column not found in header"),
        }
    }
    for required in [Column::Outcome, Column::Execution] {
        if !columns.contains_key(&required) {
            return Err(ReportError::MissingColumn(required.name().to_string()).into());
        }
    }

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                debug!(row, error = %err, "skipping malformed row");
                continue;
            }
        };
        records.push(build_signup(&raw, &columns, config));
    }

    info!(
        path = %path.display(),
        records = records.len(),
        "loaded sign-up export"
    );
    let mut table = SignupTable::new(records, columns.into_keys());
    table.headers = headers.iter().map(str::to_string).collect();
    Ok(table)
}

fn cell(raw: &StringRecord, columns: &BTreeMap<Column, usize>, column: Column) -> Option<String> {
    columns
        .get(&column)
        .and_then(|index| raw.get(*index))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn build_signup(
    raw: &StringRecord,
    columns: &BTreeMap<Column, usize>,
    config: &SignupConfig,
) -> SignupRecord {
    let get = |column| cell(raw, columns, column);
    let outcome = get(Column::Outcome);
    let execution = get(Column::Execution);
    let route = classify::categorize_route(get(Column::FrontRoute).as_deref());

    SignupRecord {
        age: get(Column::Age),
        income: get(Column::Income),
        job: get(Column::Job),
        credit: get(Column::Credit),
        willingness: get(Column::Willingness)
            .map(|value| classify::shorten_willingness(&value, &config.willingness_labels)),
        route: route.to_string(),
        channel: classify::channel_category(route).to_string(),
        staff: get(Column::Staff),
        plan: get(Column::Plan),
        amount: get(Column::Amount),
        applied_month: get(Column::AppliedAt).and_then(|value| monthly::month_key(&value)),
        seminar: get(Column::SeminarDate).and_then(|value| seminar_label(&value)),
        closed: classify::has_label(outcome.as_deref(), &config.closed_labels),
        executed: classify::has_label(execution.as_deref(), &config.executed_labels),
        outcome,
    }
}

pub fn load_sessions(path: &Path, config: &SessionConfig) -> anyhow::Result<Vec<SessionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let window_start = config.window_start()?;
    let mut sessions = Vec::new();

    for (row, result) in reader.records().enumerate() {
        if row < config.header_rows {
            continue;
        }
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                debug!(row, error = %err, "skipping malformed row");
                continue;
            }
        };
        if raw.len() < config.min_columns {
            debug!(row, cells = raw.len(), "skipping short row");
            continue;
        }
        match parse_session(&raw, config) {
            Some(session) if session.date >= window_start && session.date <= config.reference_date => {
                sessions.push(session)
            }
            Some(session) => debug!(row, date = %session.date, "session outside window"),
            None => debug!(row, "skipping unparsable session row"),
        }
    }

    info!(
        path = %path.display(),
        sessions = sessions.len(),
        from = %window_start,
        to = %config.reference_date,
        "loaded session export"
    );
    Ok(sessions)
}

fn parse_session(raw: &StringRecord, config: &SessionConfig) -> Option<SessionRecord> {
    let columns = &config.columns;
    let date_cell = raw.get(columns.date)?.trim();
    let time_cell = raw.get(columns.time)?.trim();

    let weekday = weekday_in_parens(date_cell)?;
    let date = parse_session_date(date_cell)?;
    if time_cell.is_empty() {
        return None;
    }
    let slot = if time_cell.contains(config.midday_anchor.as_str()) {
        Slot::Midday
    } else {
        Slot::Evening
    };

    let count = |index: usize| {
        raw.get(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse::<u32>().ok())
    };

    Some(SessionRecord {
        date,
        weekday,
        slot,
        registrations: count(columns.registrations),
        seated: count(columns.seated),
        consultations: count(columns.consultations),
    })
}

/// Leading `YYYY/M/D` of a cell such as `2026/1/28(水)`.
fn parse_session_date(cell: &str) -> Option<NaiveDate> {
    let end = cell
        .find(|c: char| !(c.is_ascii_digit() || c == '/'))
        .unwrap_or(cell.len());
    NaiveDate::parse_from_str(&cell[..end], "%Y/%m/%d").ok()
}

fn weekday_in_parens(cell: &str) -> Option<Weekday> {
    let chars: Vec<char> = cell.chars().collect();
    chars
        .windows(3)
        .find(|w| matches!(w[0], '(' | '（') && matches!(w[2], ')' | '）'))
        .and_then(|w| weekday_from_kanji(w[1]))
}

/// `YYYY/MM/DD(曜) HH:MM` label of a seminar timestamp; sorts chronologically.
pub fn seminar_label(raw: &str) -> Option<String> {
    let at = monthly::parse_timestamp(raw)?;
    Some(format!(
        "{}({}) {}",
        at.format("%Y/%m/%d"),
        weekday_kanji(at.weekday()),
        at.format("%H:%M")
    ))
}

pub fn weekday_from_kanji(c: char) -> Option<Weekday> {
    match c {
        '月' => Some(Weekday::Mon),
        '火' => Some(Weekday::Tue),
        '水' => Some(Weekday::Wed),
        '木' => Some(Weekday::Thu),
        '金' => Some(Weekday::Fri),
        '土' => Some(Weekday::Sat),
        '日' => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_kanji(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}
