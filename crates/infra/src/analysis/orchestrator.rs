use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use gridwatch_ai::{classify, ClassificationDecision, DetectError, DetectionResult, DetectorAdapter};
use gridwatch_core::{AnalysisUpdate, DomainError, ReportId};

use crate::analysis::lock::ReportLocks;
use crate::analysis::slots::InferenceSlots;
use crate::media::MediaResolver;
use crate::store::{ReportStore, StoreError};

const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INFERENCE_LIMIT: usize = 2;

/// Something that can analyze one report. The dispatcher's unit of work.
pub trait ReportAnalyzer: Send + Sync + 'static {
    fn run(&self, report_id: ReportId) -> JobOutcome;
}

/// How a job ended. Informational only; nothing upstream acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Detection ran and the decision was written.
    Applied(ClassificationDecision),
    /// Detection was unavailable; the report was sent to manual review.
    Degraded { reason: String },
    /// The report has no image; nothing was written.
    SkippedNoImage,
    /// The report no longer exists; nothing was written.
    ReportMissing,
    /// The store failed; the report may still be pending.
    Failed { reason: String },
}

/// Errors produced by the individual analysis steps.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("report {0} not found")]
    ReportMissing(ReportId),

    #[error("report {0} has no image")]
    NoImage(ReportId),

    #[error("unusable image reference: {0}")]
    Image(#[from] DomainError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("detection timed out after {0:?}")]
    DetectTimeout(Duration),

    #[error("all {limit} inference slots stayed busy for {waited:?}")]
    InferenceBusy { limit: usize, waited: Duration },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AnalysisError {
    /// Errors after which the report should still be moved out of pending analysis.
    fn degrades(&self) -> bool {
        matches!(
            self,
            AnalysisError::Image(_)
                | AnalysisError::Detect(_)
                | AnalysisError::DetectTimeout(_)
                | AnalysisError::InferenceBusy { .. }
        )
    }
}

/// Runs detection for one report and records the decision on it.
///
/// Holds the shared detector by reference; the model is loaded once by the caller and
/// never reloaded here. At most `inference_limit` model calls run at once, counting
/// calls abandoned after a timeout.
pub struct AnalysisOrchestrator<S: ReportStore> {
    store: S,
    detector: Arc<DetectorAdapter>,
    media: MediaResolver,
    detect_timeout: Duration,
    inference: Arc<InferenceSlots>,
    locks: ReportLocks,
}

impl<S: ReportStore> AnalysisOrchestrator<S> {
    pub fn new(store: S, detector: Arc<DetectorAdapter>, media: MediaResolver) -> Self {
        Self {
            store,
            detector,
            media,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
            inference: InferenceSlots::new(DEFAULT_INFERENCE_LIMIT),
            locks: ReportLocks::new(),
        }
    }

    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    /// Usually the dispatcher's worker count.
    pub fn with_inference_limit(mut self, limit: usize) -> Self {
        self.inference = InferenceSlots::new(limit);
        self
    }

    pub fn inference_slots(&self) -> &InferenceSlots {
        &self.inference
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Analyze one report. Never panics on expected failures and never returns an error;
    /// every failure is mapped to a [`JobOutcome`] and logged.
    pub fn analyze(&self, report_id: ReportId) -> JobOutcome {
        let _guard = self.locks.acquire(report_id);

        let update = match self.decide(report_id) {
            Ok(decision) => Ok(decision),
            Err(e) if e.degrades() => {
                warn!(report_id = %report_id, error = %e, "detection unavailable; flagging for manual review");
                Err(e.to_string())
            }
            Err(e) => return self.drop_job(report_id, e),
        };

        let written = match &update {
            Ok(decision) => decision.clone().into_update(),
            Err(_) => AnalysisUpdate::ManualReview,
        };

        if let Err(e) = self.store.apply_analysis(report_id, &written) {
            return self.drop_job(report_id, e.into());
        }

        match update {
            Ok(decision) => {
                info!(
                    report_id = %report_id,
                    classification = %decision.classification,
                    suggestion = %decision.suggestion,
                    "report analyzed"
                );
                JobOutcome::Applied(decision)
            }
            Err(reason) => JobOutcome::Degraded { reason },
        }
    }

    /// Load, resolve, detect, classify.
    fn decide(&self, report_id: ReportId) -> Result<ClassificationDecision, AnalysisError> {
        let report = self
            .store
            .get(report_id)?
            .ok_or(AnalysisError::ReportMissing(report_id))?;
        let image = report.image.ok_or(AnalysisError::NoImage(report_id))?;
        let path = self.media.resolve(&image)?;

        let labels = self.detect_bounded(path)?;
        Ok(classify(&labels))
    }

    /// Run the detector on a helper thread so a hung inference cannot hold the worker
    /// past `detect_timeout`. Waiting for a free inference slot counts against the same
    /// deadline. An abandoned inference keeps its slot until the model call returns.
    fn detect_bounded(&self, path: PathBuf) -> Result<DetectionResult, AnalysisError> {
        if !self.detector.is_available() {
            return Ok(self.detector.detect(&path)?);
        }

        let started = Instant::now();
        let deadline = started + self.detect_timeout;
        let slot = self
            .inference
            .acquire_until(deadline)
            .ok_or_else(|| AnalysisError::InferenceBusy {
                limit: self.inference.limit(),
                waited: started.elapsed(),
            })?;

        let detector = self.detector.clone();
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("gridwatch-detect".to_string())
            .spawn(move || {
                let result = detector.detect(&path);
                drop(slot);
                let _ = tx.send(result);
            })
            .map_err(|e| DetectError::inference(format!("cannot start inference thread: {e}")))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => Err(AnalysisError::DetectTimeout(self.detect_timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DetectError::inference("inference thread panicked").into())
            }
        }
    }

    fn drop_job(&self, report_id: ReportId, e: AnalysisError) -> JobOutcome {
        match e {
            AnalysisError::ReportMissing(_) | AnalysisError::Store(StoreError::NotFound(_)) => {
                warn!(report_id = %report_id, "report vanished before analysis; dropping job");
                JobOutcome::ReportMissing
            }
            AnalysisError::NoImage(_) => {
                debug!(report_id = %report_id, "report has no image; nothing to analyze");
                JobOutcome::SkippedNoImage
            }
            other => {
                error!(report_id = %report_id, error = %other, "analysis job failed");
                JobOutcome::Failed {
                    reason: other.to_string(),
                }
            }
        }
    }
}

impl<S: ReportStore + 'static> ReportAnalyzer for AnalysisOrchestrator<S> {
    fn run(&self, report_id: ReportId) -> JobOutcome {
        self.analyze(report_id)
    }
}
