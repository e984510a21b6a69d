//! The citizen report record, as far as the analysis path sees it.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{ReportId, UploadId};

/// Classification written when detection could not run for a report.
pub const MANUAL_REVIEW_REQUIRED: &str = "Manual Review Required";

/// Lifecycle status of a report.
///
/// Analysis only ever drives `PendingAnalysis -> Received`; the remaining states belong
/// to the dispatch/technician workflow and are carried so records round-trip intact.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "Pending Analysis")]
    PendingAnalysis,
    Received,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::PendingAnalysis => "Pending Analysis",
            ReportStatus::Received => "Received",
            ReportStatus::Assigned => "Assigned",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
            ReportStatus::Closed => "Closed",
        }
    }
}

impl core::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Analysis" => Ok(ReportStatus::PendingAnalysis),
            "Received" => Ok(ReportStatus::Received),
            "Assigned" => Ok(ReportStatus::Assigned),
            "In Progress" => Ok(ReportStatus::InProgress),
            "Resolved" => Ok(ReportStatus::Resolved),
            "Closed" => Ok(ReportStatus::Closed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Reference to a report image owned by the storage backend.
///
/// Either a path relative to the media root, an absolute path, or a `file://` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> DomainResult<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(DomainError::invalid_image_ref("image reference is empty"));
        }
        Ok(Self(reference))
    }

    /// Storage layout for citizen uploads: `reports/{upload_id}/citizen/{filename}`.
    pub fn citizen_upload(upload_id: UploadId, filename: &str) -> DomainResult<Self> {
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(DomainError::invalid_image_ref(format!(
                "upload filename must be a bare file name, got {filename:?}"
            )));
        }
        Ok(Self(format!("reports/{upload_id}/citizen/{filename}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single write the analysis path performs on a report.
///
/// Applied as one transition so readers never see a classification without the
/// matching suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisUpdate {
    /// Detection ran and the rule engine produced a decision.
    Classified {
        classification: String,
        suggestion: String,
    },
    /// Detection was unavailable; flag the report for a human.
    ManualReview,
}

/// A citizen-submitted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub upload_id: UploadId,
    pub description: String,
    pub image: Option<ImageRef>,
    pub status: ReportStatus,
    pub ai_classification: Option<String>,
    pub ai_suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// A freshly submitted report awaiting analysis.
    pub fn submitted(description: impl Into<String>, image: Option<ImageRef>) -> Self {
        let now = Utc::now();
        Self {
            id: ReportId::new(),
            upload_id: UploadId::new(),
            description: description.into(),
            image,
            status: ReportStatus::PendingAnalysis,
            ai_classification: None,
            ai_suggestion: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ReportId) -> Self {
        self.id = id;
        self
    }

    /// Apply an analysis outcome. The status always lands on `Received`.
    pub fn apply_analysis(&mut self, update: &AnalysisUpdate, at: DateTime<Utc>) {
        match update {
            AnalysisUpdate::Classified {
                classification,
                suggestion,
            } => {
                self.ai_classification = Some(classification.clone());
                self.ai_suggestion = Some(suggestion.clone());
            }
            AnalysisUpdate::ManualReview => {
                self.ai_classification = Some(MANUAL_REVIEW_REQUIRED.to_string());
            }
        }
        self.status = ReportStatus::Received;
        self.updated_at = at;
    }
}
