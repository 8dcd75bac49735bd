// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The reduction applied to the raw observations of one indicator.
///
/// Every indicator declares exactly one mode; the mode of the current year
/// is also used when comparing against the prior year.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum AggregationMode {
    /// Arithmetic sum of the numeric observations.
    Sum,
    /// Arithmetic mean of the numeric observations.
    Avg,
    /// The most recently submitted numeric observation. The store contract
    /// delivers observations newest first; this mode picks the first one.
    Latest,
    /// The number of numeric observations becomes the reported value.
    Count,
    /// Narrative indicator. The observations are free text and no numeric
    /// reduction is defined: the value stays empty, the count is reported.
    Append,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Sum => "sum",
            AggregationMode::Avg => "avg",
            AggregationMode::Latest => "latest",
            AggregationMode::Count => "count",
            AggregationMode::Append => "append",
        }
    }
}

/// The direction in which an indicator target is considered met.
///
/// Most indicators are "higher is better"; minimization targets (incident
/// counts) declare `AtMost` instead of relying on an implicit convention.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TargetDirection {
    AtLeast,
    AtMost,
}

/// One performance indicator of the catalog.
#[derive(PartialEq, Debug, Clone)]
pub struct Indicator {
    /// Unique, stable identity, e.g. "7.1.1".
    pub indicator_id: String,
    /// Grouping key for the scorecard, e.g. "7.1".
    pub category_id: String,
    pub name_local: String,
    pub name_en: String,
    pub unit: String,
    /// Absent means "no target, track only".
    pub target_value: Option<f64>,
    pub target_direction: TargetDirection,
    pub aggregation: AggregationMode,
    /// Informational only, e.g. "annual" or "quarterly".
    pub frequency: String,
    pub department_id: String,
}

/// The indicator catalog: an explicit, immutable value with the indicators
/// in their declared order. Loaded once at startup and passed in; there is
/// no global registry.
#[derive(PartialEq, Debug, Clone)]
pub struct Catalog {
    indicators: Vec<Indicator>,
}

impl Catalog {
    pub fn new(indicators: Vec<Indicator>) -> Catalog {
        Catalog { indicators }
    }

    pub fn get(&self, indicator_id: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.indicator_id == indicator_id)
    }

    /// Indicators of one category, in catalog order.
    pub fn by_category(&self, category_id: &str) -> Vec<&Indicator> {
        self.indicators
            .iter()
            .filter(|i| i.category_id == category_id)
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Indicator> {
        self.indicators.iter()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// Review lifecycle of an observation. `Deleted` is terminal: the record is
/// retained in the store but invisible to default reads.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
    RevisionRequested,
    Deleted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
            EntryStatus::RevisionRequested => "revision_requested",
            EntryStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<EntryStatus> {
        match s {
            "pending" => Some(EntryStatus::Pending),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            "revision_requested" => Some(EntryStatus::RevisionRequested),
            "deleted" => Some(EntryStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Role {
    Admin,
    Reviewer,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Reviewer => "reviewer",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "reviewer" => Some(Role::Reviewer),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// The caller identity supplied by the external auth collaborator.
/// Treated as an opaque authorization input; a missing role grants nothing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub role: Option<Role>,
}

impl Caller {
    pub fn new(id: &str, role: Option<Role>) -> Caller {
        Caller {
            id: id.to_string(),
            role,
        }
    }
}

/// One raw, timestamped, attributable data point submitted against an
/// indicator for a specific year and period.
#[derive(PartialEq, Debug, Clone)]
pub struct Observation {
    /// Store-assigned. Empty until the first write.
    pub id: String,
    pub indicator_id: String,
    /// Opaque integer key (Buddhist calendar in the sample data).
    pub fiscal_year: i32,
    /// "annual", "Q1".."Q4", or a free-form label. Not an enforced enum.
    pub period: String,
    /// None means "recorded but non-numeric": excluded from numeric
    /// aggregation, still counted for presence.
    pub value: Option<f64>,
    /// Snapshot of the indicator target at submission time. May diverge
    /// from the catalog's current target.
    pub target: Option<f64>,
    pub dimension: Option<String>,
    pub dimension_value: Option<String>,
    pub unit: String,
    pub notes: String,
    pub submitted_by: String,
    /// ISO-8601 timestamp string; ordering is string ordering.
    pub submitted_at: String,
    pub status: EntryStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    /// Set only when the status is `Rejected`.
    pub rejection_reason: Option<String>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<String>,
    pub previous_status: Option<EntryStatus>,
    /// Id of a rejected observation this one supersedes. Rejection is a
    /// one-shot decision; resubmission is a new observation, never a
    /// backward status transition.
    pub resubmission_of: Option<String>,
}

// ******** Output data structures *********

/// The result of reducing one observation set: the representative value
/// (absent when no numeric observation exists) and the number of numeric
/// observations that entered the reduction.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregateOutcome {
    pub value: Option<f64>,
    pub count: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

/// Derived per-indicator summary for one reporting year. Computed fresh on
/// every render, never persisted.
#[derive(PartialEq, Debug, Clone)]
pub struct Scorecard {
    pub indicator_id: String,
    pub value: Option<f64>,
    pub target: Option<f64>,
    pub met: bool,
    pub entry_count: usize,
    pub trend: Trend,
}

/// Counts over a set of scorecards. `not_met` only counts indicators that
/// have a target and missed it; track-only indicators with data contribute
/// to `total` alone.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Rollup {
    pub total: usize,
    pub met: usize,
    pub not_met: usize,
    pub no_data: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CategoryScorecard {
    pub category_id: String,
    pub rows: Vec<Scorecard>,
    pub rollup: Rollup,
}

/// Categories in insertion order of first encounter, plus the faculty-wide
/// rollup.
#[derive(PartialEq, Debug, Clone)]
pub struct ScorecardReport {
    pub categories: Vec<CategoryScorecard>,
    pub summary: Rollup,
}

/// One row of a category overview listing.
#[derive(PartialEq, Debug, Clone)]
pub struct OverviewRow {
    pub indicator_id: String,
    pub value: Option<f64>,
    pub entry_count: usize,
}

/// One point of a year-over-year series for a single indicator.
#[derive(PartialEq, Debug, Clone)]
pub struct TrendPoint {
    pub year: i32,
    pub value: Option<f64>,
    pub target: Option<f64>,
}

/// One row of a dimension breakdown (mean of the numeric observations that
/// carry this dimension value).
#[derive(PartialEq, Debug, Clone)]
pub struct MatrixPoint {
    pub dimension_value: String,
    pub value: f64,
    pub count: usize,
}

/// The distinct filter values present in an observation set.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AvailableFilters {
    pub years: Vec<i32>,
    pub periods: Vec<String>,
    pub dimensions: Vec<String>,
}

/// Aggregates of every indicator with data for one fiscal year, in catalog
/// order. Feeds the export assembler.
#[derive(PartialEq, Debug, Clone)]
pub struct YearSummary {
    pub year: i32,
    pub values: Vec<(String, f64)>,
}

// ********* Errors **********

/// Errors surfaced by the workflow and store operations.
///
/// Nothing here is fatal to the process; every failure is scoped to the
/// single requested operation. Malformed observations are not an error:
/// they are excluded from aggregation, consistent with the "no data means
/// an empty result" philosophy.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum KpiError {
    /// The referenced observation no longer exists (e.g. a status change
    /// raced with a delete).
    NotFound { id: String },
    /// The caller's role does not permit the requested transition. Checked
    /// before the store write is attempted.
    Unauthorized { action: String },
    /// The observation is not in a state the requested transition accepts.
    InvalidTransition { from: EntryStatus, action: String },
    /// A rejection must carry a non-empty reason.
    MissingRejectionReason,
    /// The underlying store failed for network or availability reasons.
    /// Not retried here; retrying is the calling layer's decision.
    TransientIo { message: String },
}

impl Error for KpiError {}

impl Display for KpiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KpiError::NotFound { id } => write!(f, "observation {:?} does not exist", id),
            KpiError::Unauthorized { action } => {
                write!(f, "caller is not permitted to {}", action)
            }
            KpiError::InvalidTransition { from, action } => {
                write!(f, "cannot {} an observation in status {:?}", action, from)
            }
            KpiError::MissingRejectionReason => {
                write!(f, "a rejection requires a non-empty reason")
            }
            KpiError::TransientIo { message } => write!(f, "store error: {}", message),
        }
    }
}
