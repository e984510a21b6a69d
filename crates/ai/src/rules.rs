//! Label -> decision rule engine.
//!
//! Category and suggestion are resolved by two independent precedence chains over the
//! same label set. The function is total: every input, including the empty set, maps to
//! exactly one decision.

use serde::{Deserialize, Serialize};

use gridwatch_core::AnalysisUpdate;

use crate::labels::{
    BROKEN_POLE, DAMAGED_TRANSFORMER, ELECTRIC_POLE, FALLEN_LINE, FIRE, LEANING_POLE, SPARKS,
    TRANSFORMER, VEGETATION_OVERGROWTH,
};
use crate::result::DetectionResult;

/// Category used when nothing was detected.
pub const UNCLASSIFIED: &str = "Unclassified";

const EMERGENCY_LABELS: [&str; 4] = [SPARKS, FIRE, FALLEN_LINE, BROKEN_POLE];
const URGENT_LABELS: [&str; 2] = [LEANING_POLE, DAMAGED_TRANSFORMER];

/// Recommended maintenance action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Suggestion {
    EmergencyDispatch,
    SpecializedCrew,
    TreeTrimming,
    RoutineInspection,
    ManualReview,
}

impl Suggestion {
    pub const ALL: [Suggestion; 5] = [
        Suggestion::EmergencyDispatch,
        Suggestion::SpecializedCrew,
        Suggestion::TreeTrimming,
        Suggestion::RoutineInspection,
        Suggestion::ManualReview,
    ];

    pub fn text(&self) -> &'static str {
        match self {
            Suggestion::EmergencyDispatch => {
                "Dispatch emergency crew immediately. Potential public safety hazard."
            }
            Suggestion::SpecializedCrew => {
                "Assign a specialized crew for inspection within 24 hours."
            }
            Suggestion::TreeTrimming => "Assign to a tree-trimming crew for routine maintenance.",
            Suggestion::RoutineInspection => "Schedule for routine inspection.",
            Suggestion::ManualReview => "Requires manual review by an admin.",
        }
    }
}

impl core::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.text())
    }
}

impl From<Suggestion> for String {
    fn from(value: Suggestion) -> Self {
        value.text().to_string()
    }
}

impl TryFrom<String> for Suggestion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Suggestion::ALL
            .into_iter()
            .find(|s| s.text() == value)
            .ok_or_else(|| format!("unknown suggestion text: {value}"))
    }
}

/// What the rule engine decided for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDecision {
    pub classification: String,
    pub suggestion: Suggestion,
}

impl ClassificationDecision {
    /// The report transition that records this decision.
    pub fn into_update(self) -> AnalysisUpdate {
        AnalysisUpdate::Classified {
            classification: self.classification,
            suggestion: self.suggestion.text().to_string(),
        }
    }
}

/// Map detected labels to a category and a suggested action.
pub fn classify(labels: &DetectionResult) -> ClassificationDecision {
    // Invariant: empty set short-circuits both chains.
    let Some(fallback) = labels.first() else {
        return ClassificationDecision {
            classification: UNCLASSIFIED.to_string(),
            suggestion: Suggestion::ManualReview,
        };
    };

    ClassificationDecision {
        classification: category(labels, fallback).to_string(),
        suggestion: suggestion(labels),
    }
}

fn suggestion(labels: &DetectionResult) -> Suggestion {
    if labels.contains_any(&EMERGENCY_LABELS) {
        Suggestion::EmergencyDispatch
    } else if labels.contains_any(&URGENT_LABELS) {
        Suggestion::SpecializedCrew
    } else if labels.contains(VEGETATION_OVERGROWTH) {
        Suggestion::TreeTrimming
    } else {
        Suggestion::RoutineInspection
    }
}

fn category<'a>(labels: &DetectionResult, fallback: &'a str) -> &'a str {
    if labels.contains(TRANSFORMER) {
        TRANSFORMER
    } else if labels.contains(ELECTRIC_POLE) {
        ELECTRIC_POLE
    } else {
        fallback
    }
}
