//! Detector class vocabulary.
//!
//! These must match the class names the model was trained with. Retraining with new
//! classes means updating this list and the rule engine together.

pub const SPARKS: &str = "Sparks";
pub const FIRE: &str = "Fire";
pub const FALLEN_LINE: &str = "Fallen Line";
pub const BROKEN_POLE: &str = "Broken Pole";
pub const LEANING_POLE: &str = "Leaning Pole";
pub const DAMAGED_TRANSFORMER: &str = "Damaged Transformer";
pub const VEGETATION_OVERGROWTH: &str = "Vegetation Overgrowth";
pub const TRANSFORMER: &str = "Transformer";
pub const ELECTRIC_POLE: &str = "Electric Pole";

/// Full vocabulary in model class-index order.
pub const VOCABULARY: [&str; 9] = [
    SPARKS,
    FIRE,
    FALLEN_LINE,
    BROKEN_POLE,
    LEANING_POLE,
    DAMAGED_TRANSFORMER,
    VEGETATION_OVERGROWTH,
    TRANSFORMER,
    ELECTRIC_POLE,
];

/// Owned copy of [`VOCABULARY`], for configs that carry their own label list.
pub fn default_labels() -> Vec<String> {
    VOCABULARY.iter().map(|l| l.to_string()).collect()
}
