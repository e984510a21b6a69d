//! `gridwatch-core`: report domain building blocks.
//!
//! This crate contains **pure domain** types shared by the detector, the rule engine
//! and the background analysis path (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod report;

pub use error::{DomainError, DomainResult};
pub use id::{ReportId, UploadId};
pub use report::{AnalysisUpdate, ImageRef, Report, ReportStatus, MANUAL_REVIEW_REQUIRED};
