//! Detector adapter: one model per process, loaded once, shared by reference.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::result::{DetectError, Detection, DetectionResult, ModelLoadError};

/// Confidence a detection must exceed to count.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// An inference backend.
///
/// Implementations must be safe to call from several workers at once; `infer` must not
/// mutate shared model state. Returned scores are raw; thresholding is the adapter's job.
pub trait ObjectDetector: Send + Sync + 'static {
    /// Short name for logs (model file, backend kind).
    fn name(&self) -> &str;

    /// Run inference on one image file.
    fn infer(&self, image: &Path) -> Result<Vec<Detection>, DetectError>;
}

#[derive(Clone)]
enum ModelState {
    Ready(Arc<dyn ObjectDetector>),
    Unavailable { reason: String },
}

/// Load-once, fail-permanent wrapper around an [`ObjectDetector`].
///
/// If loading fails, every later `detect` reports [`DetectError::ModelUnavailable`]
/// without touching the image. Per-image failures never change the state.
#[derive(Clone)]
pub struct DetectorAdapter {
    state: ModelState,
    threshold: f32,
}

impl core::fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match &self.state {
            ModelState::Ready(d) => format!("ready({})", d.name()),
            ModelState::Unavailable { reason } => format!("unavailable({reason})"),
        };
        f.debug_struct("DetectorAdapter")
            .field("state", &state)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl DetectorAdapter {
    /// Run `loader` once. A failure is logged and remembered; it is not retried.
    pub fn load<D, F>(loader: F) -> Self
    where
        D: ObjectDetector,
        F: FnOnce() -> Result<D, ModelLoadError>,
    {
        match loader() {
            Ok(detector) => {
                info!(model = detector.name(), "detection model loaded");
                Self::from_detector(detector)
            }
            Err(e) => {
                error!(error = %e, "detection model failed to load; analysis will degrade to manual review");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn from_detector(detector: impl ObjectDetector) -> Self {
        Self {
            state: ModelState::Ready(Arc::new(detector)),
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Only thresholds strictly between 0 and 1 are accepted; anything else (NaN
    /// included) is logged and the current threshold is kept.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        if threshold > 0.0 && threshold < 1.0 {
            self.threshold = threshold;
        } else {
            warn!(threshold, kept = self.threshold, "ignoring out-of-range confidence threshold");
        }
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    /// Labels whose score is strictly above the threshold.
    pub fn detect(&self, image: &Path) -> Result<DetectionResult, DetectError> {
        let detector = match &self.state {
            ModelState::Ready(d) => d,
            ModelState::Unavailable { reason } => {
                return Err(DetectError::ModelUnavailable(reason.clone()));
            }
        };

        let detections = detector.infer(image)?;
        let labels: DetectionResult = detections
            .into_iter()
            .filter(|d| d.score > self.threshold)
            .map(|d| d.label)
            .collect();

        debug!(
            model = detector.name(),
            image = %image.display(),
            labels = ?labels,
            "detection finished"
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        detections: Vec<Detection>,
        calls: Arc<AtomicUsize>,
    }

    impl ObjectDetector for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn infer(&self, image: &Path) -> Result<Vec<Detection>, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if image.ends_with("corrupt.jpg") {
                return Err(DetectError::inference("cannot decode image"));
            }
            Ok(self.detections.clone())
        }
    }

    fn canned(detections: Vec<Detection>) -> (Canned, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Canned {
                detections,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[test]
    fn threshold_filters_before_aggregation() {
        let (detector, _) = canned(vec![
            Detection::new("Fire", 0.91),
            Detection::new("Sparks", 0.40),
            Detection::new("Electric Pole", 0.39),
            Detection::new("Fire", 0.55),
        ]);
        let adapter = DetectorAdapter::from_detector(detector);

        let labels = adapter.detect(Path::new("pole.jpg")).unwrap();
        assert_eq!(labels, DetectionResult::from_labels(["Fire"]));
    }

    #[test]
    fn nothing_above_threshold_is_empty_not_error() {
        let (detector, _) = canned(vec![Detection::new("Transformer", 0.1)]);
        let adapter = DetectorAdapter::from_detector(detector);
        assert!(adapter.detect(Path::new("x.jpg")).unwrap().is_empty());
    }

    #[test]
    fn failed_load_is_permanent_and_skips_inference() {
        let attempts = AtomicUsize::new(0);
        let adapter = DetectorAdapter::load(|| -> Result<Canned, ModelLoadError> {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ModelLoadError::NotFound("best.onnx".to_string()))
        });

        assert!(!adapter.is_available());
        for _ in 0..3 {
            let err = adapter.detect(Path::new("pole.jpg")).unwrap_err();
            assert!(err.is_permanent());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_image_failure_does_not_poison_later_calls() {
        let (detector, calls) = canned(vec![Detection::new("Electric Pole", 0.8)]);
        let adapter = DetectorAdapter::load(move || Ok(detector));

        let err = adapter.detect(Path::new("uploads/corrupt.jpg")).unwrap_err();
        assert!(!err.is_permanent());

        let labels = adapter.detect(Path::new("uploads/ok.jpg")).unwrap();
        assert!(labels.contains("Electric Pole"));
        assert!(adapter.is_available());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn custom_threshold_applies() {
        let (detector, _) = canned(vec![Detection::new("Leaning Pole", 0.6)]);
        let adapter = DetectorAdapter::from_detector(detector).with_threshold(0.7);
        assert!(adapter.detect(Path::new("a.jpg")).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_threshold_is_ignored() {
        for bad in [f32::NAN, 0.0, 1.0, 1.5, -0.2] {
            let (detector, _) = canned(vec![Detection::new("Fire", 0.5)]);
            let adapter = DetectorAdapter::from_detector(detector).with_threshold(bad);
            assert_eq!(adapter.threshold(), DEFAULT_CONFIDENCE_THRESHOLD);
            assert!(adapter.detect(Path::new("a.jpg")).unwrap().contains("Fire"));
        }
    }
}
