//! Infrastructure layer: report storage seam, background analysis, configuration.

pub mod analysis;
pub mod config;
pub mod dispatch;
pub mod intake;
pub mod media;
pub mod store;

pub use analysis::{
    AnalysisError, AnalysisOrchestrator, InferenceSlots, JobOutcome, ReportAnalyzer, ReportLocks,
};
pub use config::{ConfigError, TriageConfig};
pub use dispatch::{AnalysisDispatcher, DispatchOutcome, DispatcherConfig, DispatcherStats};
pub use intake::ReportIntake;
pub use media::MediaResolver;
pub use store::{InMemoryReportStore, ReportStore, StoreError};
