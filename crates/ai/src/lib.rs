//! `gridwatch-ai`
//!
//! **Responsibility:** turn an infrastructure photo into a maintenance decision.
//!
//! - `detector`: the load-once detector adapter and the `ObjectDetector` seam.
//! - `yolo`: YOLOv8 ONNX backend (tract).
//! - `rules`: the pure label -> decision rule engine.
//!
//! This crate does not touch report storage; callers (infra) own that.

pub mod detector;
pub mod labels;
pub mod result;
pub mod rules;
pub mod yolo;

pub use detector::{DetectorAdapter, ObjectDetector, DEFAULT_CONFIDENCE_THRESHOLD};
pub use result::{DetectError, Detection, DetectionResult, ModelLoadError};
pub use rules::{classify, ClassificationDecision, Suggestion, UNCLASSIFIED};
pub use yolo::{YoloConfig, YoloOnnxDetector};
