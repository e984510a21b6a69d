//! YOLOv8 detection backend running an exported ONNX model through tract.
//!
//! Output layout is `[1, 4 + classes, boxes]`: four box coordinates followed by one
//! score row per class. Each box is attributed to its best-scoring class; the backend
//! reports, per class, the best score any box attributed to it reached. Box geometry and
//! NMS are skipped: NMS only removes overlapping boxes of the same class, so it never
//! changes which classes are present.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detector::ObjectDetector;
use crate::labels::default_labels;
use crate::result::{DetectError, Detection, ModelLoadError};

type OnnxPlan = TypedRunnableModel<TypedModel>;

const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);
const BOX_ROWS: usize = 4;

#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    /// Class names in model output order.
    pub labels: Vec<String>,
    /// Square input side the model was exported with.
    pub input_size: u32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/best.onnx"),
            labels: default_labels(),
            input_size: 640,
        }
    }
}

pub struct YoloOnnxDetector {
    plan: OnnxPlan,
    labels: Vec<String>,
    input_size: u32,
    name: String,
}

impl YoloOnnxDetector {
    /// Load and optimize the model. Slow; call once at startup.
    pub fn load(config: YoloConfig) -> Result<Self, ModelLoadError> {
        let path = &config.model_path;
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path.display().to_string()));
        }
        if config.labels.is_empty() {
            return Err(ModelLoadError::Invalid("no class labels configured".to_string()));
        }
        if config.input_size == 0 {
            return Err(ModelLoadError::Invalid("input size must be positive".to_string()));
        }

        let side = config.input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, side, side]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| ModelLoadError::Invalid(format!("{}: {e:#}", path.display())))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            plan,
            labels: config.labels,
            input_size: config.input_size,
            name,
        })
    }

    fn run(&self, image: &Path) -> anyhow::Result<Vec<Detection>> {
        let rgb = image::open(image)
            .with_context(|| format!("cannot decode image {}", image.display()))?
            .to_rgb8();
        let input = to_input_tensor(&letterbox(&rgb, self.input_size)?);

        let outputs = self.plan.run(tvec!(input.into()))?;
        let output = outputs.first().context("model produced no outputs")?;
        let scores = output
            .to_array_view::<f32>()?
            .into_dimensionality::<tract_ndarray::Ix3>()?;

        best_score_per_class(scores, &self.labels)
    }
}

impl ObjectDetector for YoloOnnxDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, image: &Path) -> Result<Vec<Detection>, DetectError> {
        self.run(image).map_err(|e| DetectError::inference(format!("{e:#}")))
    }
}

/// Resize keeping aspect ratio and pad to a `size` x `size` square, centered.
fn letterbox(rgb: &RgbImage, size: u32) -> anyhow::Result<RgbImage> {
    let (w, h) = rgb.dimensions();
    if w == 0 || h == 0 {
        bail!("image has no pixels");
    }

    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(rgb, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, LETTERBOX_FILL);
    imageops::overlay(
        &mut canvas,
        &resized,
        i64::from((size - new_w) / 2),
        i64::from((size - new_h) / 2),
    );
    Ok(canvas)
}

/// NCHW float tensor scaled to [0, 1].
fn to_input_tensor(canvas: &RgbImage) -> Tensor {
    let (w, h) = canvas.dimensions();
    tract_ndarray::Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
    .into()
}

fn best_score_per_class(
    scores: tract_ndarray::ArrayView3<f32>,
    labels: &[String],
) -> anyhow::Result<Vec<Detection>> {
    let (_, rows, boxes) = scores.dim();
    if rows != BOX_ROWS + labels.len() {
        bail!(
            "model emits {} class rows but {} labels are configured",
            rows.saturating_sub(BOX_ROWS),
            labels.len()
        );
    }

    let mut best: Vec<Option<f32>> = vec![None; labels.len()];
    for b in 0..boxes {
        let mut top_class = 0;
        let mut top_score = f32::MIN;
        for c in 0..labels.len() {
            let score = scores[[0, BOX_ROWS + c, b]];
            if score > top_score {
                top_class = c;
                top_score = score;
            }
        }
        let slot = &mut best[top_class];
        if slot.is_none_or(|s| top_score > s) {
            *slot = Some(top_score);
        }
    }

    Ok(best
        .into_iter()
        .zip(labels)
        .filter_map(|(score, label)| score.map(|s| Detection::new(label.clone(), s)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn letterbox_preserves_aspect_and_pads() {
        let wide = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
        let boxed = letterbox(&wide, 64).unwrap();

        assert_eq!(boxed.dimensions(), (64, 64));
        // 200x100 -> 64x32, centered vertically with 16 rows of padding each side.
        assert_eq!(*boxed.get_pixel(32, 2), LETTERBOX_FILL);
        assert_eq!(*boxed.get_pixel(32, 61), LETTERBOX_FILL);
        assert_eq!(*boxed.get_pixel(32, 32), Rgb([255, 0, 0]));
    }

    #[test]
    fn input_tensor_is_nchw_and_normalized() {
        let canvas = RgbImage::from_pixel(8, 8, Rgb([255, 0, 51]));
        let tensor = to_input_tensor(&canvas);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);

        let view = tensor
            .to_array_view::<f32>()
            .unwrap()
            .into_dimensionality::<tract_ndarray::Ix4>()
            .unwrap();
        assert_eq!(view[[0, 0, 3, 3]], 1.0);
        assert_eq!(view[[0, 1, 3, 3]], 0.0);
        assert!((view[[0, 2, 3, 3]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn boxes_are_attributed_to_their_best_class() {
        // 3 classes, 3 boxes. Rows 0..4 are box geometry.
        let names = labels(&["Fire", "Transformer", "Electric Pole"]);
        let mut out = tract_ndarray::Array3::<f32>::zeros((1, 7, 3));
        // box 0: Fire 0.9, Transformer 0.5
        out[[0, 4, 0]] = 0.9;
        out[[0, 5, 0]] = 0.5;
        // box 1: Transformer 0.6
        out[[0, 5, 1]] = 0.6;
        // box 2: Fire 0.3
        out[[0, 4, 2]] = 0.3;

        let detections = best_score_per_class(out.view(), &names).unwrap();
        assert_eq!(
            detections,
            vec![Detection::new("Fire", 0.9), Detection::new("Transformer", 0.6)]
        );
    }

    #[test]
    fn label_count_mismatch_is_an_error() {
        let out = tract_ndarray::Array3::<f32>::zeros((1, 6, 2));
        let err = best_score_per_class(out.view(), &labels(&["Fire"])).unwrap_err();
        assert!(err.to_string().contains("2 class rows"));
    }

    #[test]
    fn missing_model_file_is_not_found() {
        let config = YoloConfig {
            model_path: PathBuf::from("/definitely/missing/best.onnx"),
            ..YoloConfig::default()
        };
        assert!(matches!(
            YoloOnnxDetector::load(config),
            Err(ModelLoadError::NotFound(_))
        ));
    }

    #[test]
    fn garbage_model_file_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a model").unwrap();

        let config = YoloConfig {
            model_path: file.path().to_path_buf(),
            ..YoloConfig::default()
        };
        assert!(matches!(
            YoloOnnxDetector::load(config),
            Err(ModelLoadError::Invalid(_))
        ));
    }
}
