use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One class observed by a backend, with the best score it reached on the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Set of labels that survived the confidence threshold.
///
/// Scores are dropped on purpose: classification only looks at class presence.
/// Backed by an ordered set so iteration never depends on insertion or hash order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionResult(BTreeSet<String>);

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn contains_any(&self, labels: &[&str]) -> bool {
        labels.iter().any(|l| self.contains(l))
    }

    /// Lexicographically smallest label.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DetectionResult {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_labels(iter)
    }
}

/// Why a model could not be brought up at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found: {0}")]
    NotFound(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Why a `detect` call produced no labels.
///
/// Both variants are handled the same way downstream (the report is sent to manual
/// review); they are kept apart because only one of them is permanent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectError {
    /// The model never loaded. Permanent for the life of the process.
    #[error("detector unavailable: {0}")]
    ModelUnavailable(String),

    /// Inference failed for this one image.
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

impl DetectError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceFailed(msg.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, DetectError::ModelUnavailable(_))
    }
}
