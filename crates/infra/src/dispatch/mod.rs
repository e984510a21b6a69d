//! Fire-and-forget scheduling of report analysis onto a bounded worker pool.
//!
//! ## Design
//!
//! - Bounded queue, fixed worker count: caps queued jobs and memory
//! - Concurrent model invocations are capped separately by the orchestrator's inference
//!   slots, so detections abandoned after a timeout still count against the limit
//! - `schedule` never blocks; a full queue drops the job (logged, counted)
//! - No ordering between jobs, no retry
//! - Panics inside a job are contained at the job boundary

pub mod pool;

pub use pool::{AnalysisDispatcher, DispatchOutcome, DispatcherConfig, DispatcherStats};
