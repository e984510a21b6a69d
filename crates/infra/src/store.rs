//! Report storage seam.
//!
//! The durable store is owned by the web application; the analysis path only needs to
//! read a report and apply one atomic analysis transition to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use gridwatch_core::{AnalysisUpdate, Report, ReportId};

/// Report store abstraction.
pub trait ReportStore: Send + Sync {
    /// Store a new report.
    fn insert(&self, report: Report) -> Result<ReportId, StoreError>;

    /// Get a report by ID.
    fn get(&self, id: ReportId) -> Result<Option<Report>, StoreError>;

    /// Apply an analysis transition in a single write and return the new state.
    ///
    /// Implementations must not expose a partially applied update to readers.
    fn apply_analysis(&self, id: ReportId, update: &AnalysisUpdate) -> Result<Report, StoreError>;

    /// Remove a report. Returns whether it existed.
    fn delete(&self, id: ReportId) -> Result<bool, StoreError>;
}

/// Report store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("report not found: {0}")]
    NotFound(ReportId),
    #[error("report already exists: {0}")]
    AlreadyExists(ReportId),
    #[error("storage error: {0}")]
    Storage(String),
}

impl<S> ReportStore for Arc<S>
where
    S: ReportStore + ?Sized,
{
    fn insert(&self, report: Report) -> Result<ReportId, StoreError> {
        (**self).insert(report)
    }

    fn get(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        (**self).get(id)
    }

    fn apply_analysis(&self, id: ReportId, update: &AnalysisUpdate) -> Result<Report, StoreError> {
        (**self).apply_analysis(id, update)
    }

    fn delete(&self, id: ReportId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }
}

/// In-memory report store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<ReportId, Report>>,
    analysis_writes: AtomicU64,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of analysis transitions applied so far.
    pub fn analysis_writes(&self) -> u64 {
        self.analysis_writes.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().map_err(|_| poisoned())?;
        let mut all: Vec<_> = reports.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("report map lock poisoned".to_string())
}

impl ReportStore for InMemoryReportStore {
    fn insert(&self, report: Report) -> Result<ReportId, StoreError> {
        let mut reports = self.reports.write().map_err(|_| poisoned())?;
        if reports.contains_key(&report.id) {
            return Err(StoreError::AlreadyExists(report.id));
        }
        let id = report.id;
        reports.insert(id, report);
        Ok(id)
    }

    fn get(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        let reports = self.reports.read().map_err(|_| poisoned())?;
        Ok(reports.get(&id).cloned())
    }

    fn apply_analysis(&self, id: ReportId, update: &AnalysisUpdate) -> Result<Report, StoreError> {
        let mut reports = self.reports.write().map_err(|_| poisoned())?;
        let report = reports.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        report.apply_analysis(update, Utc::now());
        self.analysis_writes.fetch_add(1, Ordering::SeqCst);
        Ok(report.clone())
    }

    fn delete(&self, id: ReportId) -> Result<bool, StoreError> {
        let mut reports = self.reports.write().map_err(|_| poisoned())?;
        Ok(reports.remove(&id).is_some())
    }
}
