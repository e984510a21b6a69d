//! Background analysis of submitted reports.
//!
//! Failures are resolved here, at the job boundary: every error ends as either a
//! degraded report update or a logged no-op. Nothing propagates to the submitter.

pub mod lock;
pub mod orchestrator;
pub mod slots;

pub use lock::{ReportGuard, ReportLocks};
pub use orchestrator::{AnalysisError, AnalysisOrchestrator, JobOutcome, ReportAnalyzer};
pub use slots::{InferenceSlot, InferenceSlots};
