use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::models::{Column, Slot};

pub const CONFIG_ENV: &str = "FUNNEL_REPORT_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub signups: SignupConfig,
    pub sessions: SessionConfig,
}

/// Locates a header by keyword: every `include` fragment must appear and no
/// `exclude` fragment may appear once line breaks are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatcher {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl ColumnMatcher {
    pub fn keyword(keyword: &str) -> Self {
        Self {
            include: vec![keyword.to_string()],
            exclude: Vec::new(),
        }
    }

    pub fn matches(&self, header: &str) -> bool {
        let header: String = header.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        self.include.iter().all(|k| header.contains(k.as_str()))
            && !self.exclude.iter().any(|k| header.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMatchers {
    pub age: ColumnMatcher,
    pub income: ColumnMatcher,
    pub job: ColumnMatcher,
    pub credit: ColumnMatcher,
    pub willingness: ColumnMatcher,
    pub front_route: ColumnMatcher,
    pub outcome: ColumnMatcher,
    pub execution: ColumnMatcher,
    pub applied_at: ColumnMatcher,
    pub staff: ColumnMatcher,
    pub plan: ColumnMatcher,
    pub amount: ColumnMatcher,
    pub seminar_date: ColumnMatcher,
}

impl ColumnMatchers {
    pub fn get(&self, column: Column) -> &ColumnMatcher {
        match column {
            Column::Age => &self.age,
            Column::Income => &self.income,
            Column::Job => &self.job,
            Column::Credit => &self.credit,
            Column::Willingness => &self.willingness,
            Column::FrontRoute => &self.front_route,
            Column::Outcome => &self.outcome,
            Column::Execution => &self.execution,
            Column::AppliedAt => &self.applied_at,
            Column::Staff => &self.staff,
            Column::Plan => &self.plan,
            Column::Amount => &self.amount,
            Column::SeminarDate => &self.seminar_date,
        }
    }
}

impl Default for ColumnMatchers {
    fn default() -> Self {
        Self {
            age: ColumnMatcher::keyword("年齢"),
            income: ColumnMatcher::keyword("現在の年収"),
            job: ColumnMatcher::keyword("職業を教えて"),
            credit: ColumnMatcher::keyword("クレジットカード"),
            willingness: ColumnMatcher::keyword("受講してみたい"),
            front_route: ColumnMatcher {
                include: vec!["フロント".to_string(), "登録経路".to_string()],
                exclude: vec!["集計シート".to_string()],
            },
            outcome: ColumnMatcher::keyword("結果"),
            execution: ColumnMatcher::keyword("実施可否"),
            applied_at: ColumnMatcher::keyword("申込日時"),
            staff: ColumnMatcher {
                include: vec!["個別相談".to_string(), "担当者".to_string()],
                exclude: Vec::new(),
            },
            plan: ColumnMatcher::keyword("契約プラン名"),
            amount: ColumnMatcher::keyword("契約金額"),
            seminar_date: ColumnMatcher::keyword("セミナー参加日"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupConfig {
    pub path: PathBuf,
    pub columns: ColumnMatchers,
    pub closed_labels: Vec<String>,
    pub executed_labels: Vec<String>,
    pub willingness_labels: BTreeMap<String, String>,
    pub route_min_samples: usize,
    pub staff_min_samples: usize,
}

impl Default for SignupConfig {
    fn default() -> Self {
        let willingness_labels = [
            ("入会するか悩んでいる", "悩んでいる"),
            ("入会をあまり考えていない", "あまり考えてない"),
            ("入会をほぼ決めている", "ほぼ決めている"),
            ("入会を全く考えていない", "全く考えてない"),
            ("入会を前向きに検討している", "前向き検討"),
            ("入会を決めており今すぐ始めたい", "今すぐ始めたい"),
        ]
        .into_iter()
        .map(|(long, short)| (long.to_string(), short.to_string()))
        .collect();

        Self {
            path: PathBuf::from("個別申込者データ - シート3.csv"),
            columns: ColumnMatchers::default(),
            closed_labels: vec!["成約".to_string(), "GH成約（クロスセル/99万）".to_string()],
            executed_labels: vec![
                "実施済み".to_string(),
                "実施".to_string(),
                "再アポ実施済み".to_string(),
            ],
            willingness_labels,
            route_min_samples: 8,
            staff_min_samples: 10,
        }
    }
}

/// Fixed cell offsets of the session sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionColumns {
    pub date: usize,
    pub time: usize,
    pub registrations: usize,
    pub seated: usize,
    pub consultations: usize,
}

impl Default for SessionColumns {
    fn default() -> Self {
        Self {
            date: 1,
            time: 2,
            registrations: 4,
            seated: 8,
            consultations: 12,
        }
    }
}

impl SessionColumns {
    fn max_index(&self) -> usize {
        [
            self.date,
            self.time,
            self.registrations,
            self.seated,
            self.consultations,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Hand-curated series used in place of a bucket's observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOverride {
    pub registrations: Vec<u32>,
    pub seated: Vec<u32>,
    pub consultations: Vec<u32>,
}

/// One (weekday, slot) bucket of the seminar schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub weekday: Weekday,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAdjustment {
    pub weekday: Weekday,
    pub slot: Slot,
    #[serde(default)]
    pub excluded_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub replacement: Option<SeriesOverride>,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub path: PathBuf,
    pub reference_date: NaiveDate,
    pub window_days: i64,
    pub header_rows: usize,
    pub min_columns: usize,
    pub columns: SessionColumns,
    pub midday_anchor: String,
    pub adjustments: Vec<SlotAdjustment>,
    /// Buckets flagged as thinly sampled in the forecast table.
    pub sparse_slots: Vec<SlotRef>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("個別申込者データ - シート4.csv"),
            reference_date: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap_or_default(),
            window_days: 92,
            header_rows: 9,
            min_columns: 14,
            columns: SessionColumns::default(),
            midday_anchor: "12:00".to_string(),
            adjustments: vec![SlotAdjustment {
                weekday: Weekday::Wed,
                slot: Slot::Midday,
                excluded_dates: NaiveDate::from_ymd_opt(2026, 1, 28).into_iter().collect(),
                replacement: Some(SeriesOverride {
                    registrations: vec![97, 88, 93],
                    seated: vec![69, 56, 63],
                    consultations: vec![33, 21, 26],
                }),
                note: "1/28除外".to_string(),
            }],
            sparse_slots: [Weekday::Mon, Weekday::Tue, Weekday::Thu, Weekday::Fri]
                .into_iter()
                .map(|weekday| SlotRef {
                    weekday,
                    slot: Slot::Midday,
                })
                .collect(),
        }
    }
}

impl SessionConfig {
    pub fn window_start(&self) -> Result<NaiveDate, ReportError> {
        TimeDelta::try_days(self.window_days)
            .and_then(|days| self.reference_date.checked_sub_signed(days))
            .ok_or_else(|| {
                ReportError::InvalidConfig(format!(
                    "sessions.window_days ({}) reaches past the earliest representable date",
                    self.window_days
                ))
            })
    }

    pub fn is_sparse(&self, weekday: Weekday, slot: Slot) -> bool {
        self.sparse_slots
            .iter()
            .any(|sparse| sparse.weekday == weekday && sparse.slot == slot)
    }
}

impl ReportConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Flag first, then `FUNNEL_REPORT_CONFIG`, then built-in defaults.
    pub fn resolve(cli_config: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_config {
            return Self::load_from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_file(path);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.signups.closed_labels.is_empty() {
            return Err(ReportError::InvalidConfig(
                "signups.closed_labels must not be empty".to_string(),
            ));
        }
        if self.sessions.window_days <= 0 {
            return Err(ReportError::InvalidConfig(format!(
                "sessions.window_days must be positive, got {}",
                self.sessions.window_days
            )));
        }
        self.sessions.window_start()?;
        if self.sessions.columns.max_index() >= self.sessions.min_columns {
            return Err(ReportError::InvalidConfig(format!(
                "sessions.min_columns ({}) must exceed every column index",
                self.sessions.min_columns
            )));
        }
        for adjustment in &self.sessions.adjustments {
            if adjustment.excluded_dates.is_empty() && adjustment.replacement.is_none() {
                return Err(ReportError::InvalidConfig(format!(
                    "adjustment for {} {} needs excluded_dates or a replacement",
                    adjustment.weekday,
                    adjustment.slot.label()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ReportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.sessions.window_start().unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 8).unwrap()
        );
        assert!(config.sessions.is_sparse(Weekday::Tue, Slot::Midday));
        assert!(!config.sessions.is_sparse(Weekday::Tue, Slot::Evening));
        assert!(!config.sessions.is_sparse(Weekday::Wed, Slot::Midday));
    }

    #[test]
    fn matcher_ignores_line_breaks_and_honours_exclusions() {
        let route = ColumnMatchers::default().front_route;
        assert!(route.matches("フロント\n登録経路"));
        assert!(!route.matches("フロント登録経路（集計シート）"));

        let willingness = ColumnMatcher::keyword("受講してみたい");
        assert!(willingness.matches("勉強会でお話ししたスクールを\n受講してみたいですか？"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ReportConfig = toml::from_str(
            r#"
            [signups]
            route_min_samples = 3

            [sessions]
            reference_date = "2026-03-01"
            window_days = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.signups.route_min_samples, 3);
        assert_eq!(config.signups.staff_min_samples, 10);
        assert_eq!(config.signups.closed_labels.len(), 2);
        assert_eq!(config.sessions.window_days, 30);
        assert_eq!(config.sessions.header_rows, 9);
        assert_eq!(config.sessions.adjustments.len(), 1);
    }

    #[test]
    fn adjustments_parse_from_toml() {
        let config: ReportConfig = toml::from_str(
            r#"
            [[sessions.adjustments]]
            weekday = "Sat"
            slot = "evening"
            excluded_dates = ["2026-01-10"]
            note = "holiday"
            "#,
        )
        .unwrap();

        let adjustment = &config.sessions.adjustments[0];
        assert_eq!(adjustment.weekday, Weekday::Sat);
        assert_eq!(adjustment.slot, Slot::Evening);
        assert!(adjustment.replacement.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_window_that_is_not_positive() {
        let mut config = ReportConfig::default();
        config.sessions.window_days = 0;
        assert!(matches!(
            config.validate(),
            Err(ReportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_window_past_calendar_start() {
        let config: ReportConfig =
            toml::from_str("[sessions]\nwindow_days = 1000000000").unwrap();
        assert!(matches!(
            config.sessions.window_start(),
            Err(ReportError::InvalidConfig(_))
        ));
        assert!(matches!(
            config.validate(),
            Err(ReportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sparse_slots_parse_from_toml() {
        let config: ReportConfig = toml::from_str(
            r#"
            [[sessions.sparse_slots]]
            weekday = "Sun"
            slot = "evening"
            "#,
        )
        .unwrap();
        assert_eq!(config.sessions.sparse_slots.len(), 1);
        assert!(config.sessions.is_sparse(Weekday::Sun, Slot::Evening));
        assert!(!config.sessions.is_sparse(Weekday::Mon, Slot::Midday));
    }

    #[test]
    fn loads_config_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[signups]\npath = \"export.csv\"").unwrap();

        let config = ReportConfig::resolve(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.signups.path, PathBuf::from("export.csv"));
    }
}
