//! Entry store boundary.
//!
//! The contract observed against the document store is "fetch broadly,
//! filter in memory": the store offers predicate-filtered reads and
//! single-document merge writes, nothing transactional across documents.
//! Implementations are free to push the predicates down as a pure
//! optimization. Aggregates are always recomputed from fetched state,
//! never incrementally maintained.

use log::debug;

use crate::config::*;
use crate::workflow::{review_update, ReviewAction, ReviewUpdate};

/// Narrowing predicates applied after the broad fetch. Soft-deleted rows
/// are invisible unless `include_deleted` is set or `status` names them
/// explicitly.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct EntryFilter {
    pub indicator_id: Option<String>,
    pub fiscal_year: Option<i32>,
    pub period: Option<String>,
    pub status: Option<EntryStatus>,
    pub submitted_by: Option<String>,
    pub include_deleted: bool,
}

impl EntryFilter {
    pub fn for_year(fiscal_year: i32) -> EntryFilter {
        EntryFilter {
            fiscal_year: Some(fiscal_year),
            ..EntryFilter::default()
        }
    }

    pub fn for_indicator_year(indicator_id: &str, fiscal_year: i32) -> EntryFilter {
        EntryFilter {
            indicator_id: Some(indicator_id.to_string()),
            fiscal_year: Some(fiscal_year),
            ..EntryFilter::default()
        }
    }

    /// The review queue: everything still waiting for a decision.
    pub fn pending() -> EntryFilter {
        EntryFilter {
            status: Some(EntryStatus::Pending),
            ..EntryFilter::default()
        }
    }

    /// One submitter's own entries, deleted ones excluded.
    pub fn by_submitter(submitted_by: &str) -> EntryFilter {
        EntryFilter {
            submitted_by: Some(submitted_by.to_string()),
            ..EntryFilter::default()
        }
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        if let Some(id) = &self.indicator_id {
            if obs.indicator_id != *id {
                return false;
            }
        }
        if let Some(year) = self.fiscal_year {
            if obs.fiscal_year != year {
                return false;
            }
        }
        if let Some(period) = &self.period {
            if obs.period != *period {
                return false;
            }
        }
        match self.status {
            Some(status) => {
                if obs.status != status {
                    return false;
                }
            }
            None => {
                if obs.status == EntryStatus::Deleted && !self.include_deleted {
                    return false;
                }
            }
        }
        if let Some(submitter) = &self.submitted_by {
            if obs.submitted_by != *submitter {
                return false;
            }
        }
        true
    }
}

/// The operations the aggregation and review layers consume.
pub trait EntryStore {
    /// Broad fetch, then in-memory narrowing. Rows come back sorted by
    /// submission time, newest first; `Latest` aggregation relies on this
    /// ordering.
    fn fetch_observations(&self, filter: &EntryFilter) -> Result<Vec<Observation>, KpiError>;

    fn get_observation(&self, id: &str) -> Result<Observation, KpiError>;

    /// Writes a new document and returns its assigned id.
    fn write_observation(&mut self, obs: Observation) -> Result<String, KpiError>;

    /// Single-document merge write, last write wins.
    fn apply_update(&mut self, id: &str, update: &ReviewUpdate) -> Result<(), KpiError>;
}

/// In-memory document store with sequential ids. Serves the command-line
/// driver and the tests; a managed document database sits here in the
/// deployed system.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    docs: Vec<Observation>,
    next_id: u64,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl EntryStore for InMemoryStore {
    fn fetch_observations(&self, filter: &EntryFilter) -> Result<Vec<Observation>, KpiError> {
        let mut results: Vec<Observation> =
            self.docs.iter().filter(|o| filter.matches(o)).cloned().collect();
        results.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        debug!("fetch_observations: {} of {} rows match {:?}", results.len(), self.docs.len(), filter);
        Ok(results)
    }

    fn get_observation(&self, id: &str) -> Result<Observation, KpiError> {
        self.docs
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(KpiError::NotFound { id: id.to_string() })
    }

    fn write_observation(&mut self, mut obs: Observation) -> Result<String, KpiError> {
        if obs.id.is_empty() {
            self.next_id += 1;
            obs.id = format!("e-{:06}", self.next_id);
        }
        let id = obs.id.clone();
        match self.docs.iter_mut().find(|o| o.id == id) {
            // Same document id: the later write wins wholesale.
            Some(existing) => *existing = obs,
            None => self.docs.push(obs),
        }
        Ok(id)
    }

    fn apply_update(&mut self, id: &str, update: &ReviewUpdate) -> Result<(), KpiError> {
        let doc = self
            .docs
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(KpiError::NotFound { id: id.to_string() })?;
        update.apply_to(doc);
        Ok(())
    }
}

/// Role-gated status transition: read the document, check the gate, then
/// one merge write. Returns the observation as written.
pub fn set_status<S: EntryStore>(
    store: &mut S,
    id: &str,
    action: ReviewAction,
    caller: &Caller,
    now: &str,
) -> Result<Observation, KpiError> {
    let mut obs = store.get_observation(id)?;
    let update = review_update(&obs, &action, caller, now)?;
    store.apply_update(id, &update)?;
    update.apply_to(&mut obs);
    Ok(obs)
}

/// Soft delete: the record stays in the store, flagged out of every
/// default read.
pub fn soft_delete<S: EntryStore>(
    store: &mut S,
    id: &str,
    caller: &Caller,
    now: &str,
) -> Result<Observation, KpiError> {
    set_status(store, id, ReviewAction::SoftDelete, caller, now)
}

/// Page slice plus the total match count, for the review queue listing.
/// Pages are 1-based.
pub fn paginate(entries: &[Observation], page: usize, page_size: usize) -> (Vec<Observation>, usize) {
    let total = entries.len();
    if page_size == 0 {
        return (Vec::new(), total);
    }
    let start = (page.max(1) - 1) * page_size;
    let slice = entries.iter().skip(start).take(page_size).cloned().collect();
    (slice, total)
}
