//! Report submission path: store first, then hand the id to the dispatcher.

use std::sync::Arc;

use tracing::info;

use gridwatch_core::{Report, ReportId, ReportStatus};

use crate::dispatch::{AnalysisDispatcher, DispatchOutcome};
use crate::store::{ReportStore, StoreError};

/// Accepts new reports on behalf of the request path.
///
/// Only the store write can fail the submission. Analysis is scheduled after the
/// report is durable and its fate is never reported back to the submitter.
pub struct ReportIntake<S: ReportStore> {
    store: S,
    dispatcher: Arc<AnalysisDispatcher>,
}

impl<S: ReportStore> ReportIntake<S> {
    pub fn new(store: S, dispatcher: Arc<AnalysisDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub fn submit(&self, mut report: Report) -> Result<ReportId, StoreError> {
        report.status = ReportStatus::PendingAnalysis;
        let id = self.store.insert(report)?;

        let queued = self.dispatcher.schedule(id) == DispatchOutcome::Queued;
        info!(report_id = %id, analysis_queued = queued, "report submitted");
        Ok(id)
    }
}
