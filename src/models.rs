use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Source columns of the sign-up export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Age,
    Income,
    Job,
    Credit,
    Willingness,
    FrontRoute,
    Outcome,
    Execution,
    AppliedAt,
    Staff,
    Plan,
    Amount,
    SeminarDate,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Age,
        Column::Income,
        Column::Job,
        Column::Credit,
        Column::Willingness,
        Column::FrontRoute,
        Column::Outcome,
        Column::Execution,
        Column::AppliedAt,
        Column::Staff,
        Column::Plan,
        Column::Amount,
        Column::SeminarDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Age => "age",
            Column::Income => "income",
            Column::Job => "job",
            Column::Credit => "credit",
            Column::Willingness => "willingness",
            Column::FrontRoute => "front_route",
            Column::Outcome => "outcome",
            Column::Execution => "execution",
            Column::AppliedAt => "applied_at",
            Column::Staff => "staff",
            Column::Plan => "plan",
            Column::Amount => "amount",
            Column::SeminarDate => "seminar_date",
        }
    }
}

/// Categorical dimensions a report can group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Age,
    Income,
    Job,
    Credit,
    Willingness,
    Route,
    Channel,
    Staff,
    Month,
    Seminar,
    Plan,
    Amount,
    Outcome,
}

impl Attribute {
    pub fn label(self) -> &'static str {
        match self {
            Attribute::Age => "年齢",
            Attribute::Income => "年収",
            Attribute::Job => "職業",
            Attribute::Credit => "クレカ有無",
            Attribute::Willingness => "入会意欲",
            Attribute::Route => "流入経路",
            Attribute::Channel => "チャネル",
            Attribute::Staff => "担当者",
            Attribute::Month => "申込月",
            Attribute::Seminar => "セミナー日",
            Attribute::Plan => "契約プラン",
            Attribute::Amount => "契約金額",
            Attribute::Outcome => "結果",
        }
    }

    /// The export column this attribute is derived from.
    pub fn source(self) -> Column {
        match self {
            Attribute::Age => Column::Age,
            Attribute::Income => Column::Income,
            Attribute::Job => Column::Job,
            Attribute::Credit => Column::Credit,
            Attribute::Willingness => Column::Willingness,
            Attribute::Route | Attribute::Channel => Column::FrontRoute,
            Attribute::Staff => Column::Staff,
            Attribute::Month => Column::AppliedAt,
            Attribute::Seminar => Column::SeminarDate,
            Attribute::Plan => Column::Plan,
            Attribute::Amount => Column::Amount,
            Attribute::Outcome => Column::Outcome,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupRecord {
    pub age: Option<String>,
    pub income: Option<String>,
    pub job: Option<String>,
    pub credit: Option<String>,
    pub willingness: Option<String>,
    pub route: String,
    pub channel: String,
    pub staff: Option<String>,
    pub plan: Option<String>,
    pub amount: Option<String>,
    pub outcome: Option<String>,
    pub applied_month: Option<String>,
    /// `YYYY/MM/DD(曜) HH:MM` of the seminar attended before signing up.
    pub seminar: Option<String>,
    pub closed: bool,
    pub executed: bool,
}

impl SignupRecord {
    pub fn value(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::Age => self.age.as_deref(),
            Attribute::Income => self.income.as_deref(),
            Attribute::Job => self.job.as_deref(),
            Attribute::Credit => self.credit.as_deref(),
            Attribute::Willingness => self.willingness.as_deref(),
            Attribute::Route => Some(self.route.as_str()),
            Attribute::Channel => Some(self.channel.as_str()),
            Attribute::Staff => self.staff.as_deref(),
            Attribute::Month => self.applied_month.as_deref(),
            Attribute::Seminar => self.seminar.as_deref(),
            Attribute::Plan => self.plan.as_deref(),
            Attribute::Amount => self.amount.as_deref(),
            Attribute::Outcome => self.outcome.as_deref(),
        }
    }
}

/// Submitted / executed / closed tallies for one group of sign-ups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunnelCounts {
    pub submitted: usize,
    pub executed: usize,
    pub closed: usize,
}

impl FunnelCounts {
    pub fn add(&mut self, record: &SignupRecord) {
        self.submitted += 1;
        self.executed += usize::from(record.executed);
        self.closed += usize::from(record.closed);
    }

    pub fn merge(&mut self, other: &FunnelCounts) {
        self.submitted += other.submitted;
        self.executed += other.executed;
        self.closed += other.closed;
    }

    pub fn execution_rate(&self) -> f64 {
        percent(self.executed, self.submitted)
    }

    pub fn closing_rate(&self) -> f64 {
        percent(self.closed, self.submitted)
    }

    /// Closing rate against executed consultations; zero when nothing was executed.
    pub fn closing_rate_vs_executed(&self) -> f64 {
        percent(self.closed, self.executed)
    }
}

pub fn percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct ConversionRow {
    pub category: String,
    pub counts: FunnelCounts,
}

#[derive(Debug, Clone)]
pub struct ConversionTable {
    pub rows: Vec<ConversionRow>,
    pub total: FunnelCounts,
}

#[derive(Debug, Clone)]
pub struct DistributionEntry {
    pub value: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct StaffSummary {
    pub staff: String,
    pub counts: FunnelCounts,
    /// Closing rate minus the overall closing rate, in percentage points.
    pub diff_points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Midday,
    Evening,
}

impl Slot {
    pub fn label(self) -> &'static str {
        match self {
            Slot::Midday => "昼",
            Slot::Evening => "夜",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub slot: Slot,
    pub registrations: Option<u32>,
    pub seated: Option<u32>,
    pub consultations: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEstimate {
    pub mean: f64,
    pub stdev: f64,
    pub low: f64,
    pub high: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Highest,
    Medium,
    Low,
    Lowest,
}

impl Confidence {
    pub fn from_samples(samples: usize) -> Self {
        match samples {
            n if n >= 7 => Confidence::Highest,
            n if n >= 4 => Confidence::Medium,
            n if n >= 2 => Confidence::Low,
            _ => Confidence::Lowest,
        }
    }

    pub fn stars(self) -> &'static str {
        match self {
            Confidence::Highest => "★★★",
            Confidence::Medium => "★★☆",
            Confidence::Low => "★☆☆",
            Confidence::Lowest => "☆☆☆",
        }
    }
}

/// Funnel means and consultation range for one (weekday, slot) bucket.
#[derive(Debug, Clone)]
pub struct SlotEstimate {
    pub consultations: RangeEstimate,
    pub registration_mean: f64,
    pub seated_mean: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone)]
pub struct SlotForecast {
    pub weekday: Weekday,
    pub slot: Slot,
    pub raw: SlotEstimate,
    pub adjusted: Option<AdjustedEstimate>,
}

#[derive(Debug, Clone)]
pub struct AdjustedEstimate {
    pub estimate: SlotEstimate,
    pub note: String,
}
