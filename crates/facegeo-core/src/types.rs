use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Five-level jaw contour derived from the mean gonial angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JawShape {
    VeryAngular,
    Angular,
    Moderate,
    Soft,
    VerySoft,
}

impl JawShape {
    pub fn is_angular(self) -> bool {
        matches!(self, JawShape::VeryAngular | JawShape::Angular)
    }

    pub fn is_soft(self) -> bool {
        matches!(self, JawShape::Soft | JawShape::VerySoft)
    }
}

/// Scale-invariant facial proportions extracted from one landmark set.
///
/// Width ratios are relative to the cheekbone width. The uniformity and
/// taper indices are expressed in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub height_width_ratio: f64,
    pub forehead_cheekbone_ratio: f64,
    pub temple_cheekbone_ratio: f64,
    pub jaw_cheekbone_ratio: f64,
    pub chin_cheekbone_ratio: f64,
    /// Mean of the left and right gonial angles, in degrees.
    pub gonial_angle: f64,
    pub jaw_shape: JawShape,
    /// Standard deviation of the per-level width ratios, × 100.
    pub width_uniformity: f64,
    /// Narrowing from cheekbones to chin, in percent of cheekbone width.
    pub taper_index: f64,
    pub eye_span_ratio: f64,
    pub mouth_width_ratio: f64,
    /// Glabella-to-chin length over face height.
    pub nose_length_ratio: f64,
}

impl Metrics {
    /// Higher for sharper jaw corners.
    pub fn angularity_index(&self) -> f64 {
        (150.0 - self.gonial_angle).max(0.0)
    }

    /// 100 for a face as tall as it is wide.
    pub fn circularity_index(&self) -> f64 {
        (100.0 - (self.height_width_ratio - 1.0).abs() * 100.0).max(0.0)
    }
}

/// Face-shape categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaceShape {
    Oval,
    Round,
    Square,
    Rectangular,
    Oblong,
    Heart,
    InvertedTriangle,
    Triangle,
    Diamond,
}

impl FaceShape {
    /// Every category, in tie-break order.
    pub const ALL: [FaceShape; 9] = [
        FaceShape::Oval,
        FaceShape::Round,
        FaceShape::Square,
        FaceShape::Rectangular,
        FaceShape::Oblong,
        FaceShape::Heart,
        FaceShape::InvertedTriangle,
        FaceShape::Triangle,
        FaceShape::Diamond,
    ];

    /// Stable label, also used as the cached shape string.
    pub fn label(self) -> &'static str {
        match self {
            FaceShape::Oval => "OVAL",
            FaceShape::Round => "ROUND",
            FaceShape::Square => "SQUARE",
            FaceShape::Rectangular => "RECTANGULAR",
            FaceShape::Oblong => "OBLONG",
            FaceShape::Heart => "HEART",
            FaceShape::InvertedTriangle => "INVERTED_TRIANGLE",
            FaceShape::Triangle => "TRIANGLE",
            FaceShape::Diamond => "DIAMOND",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FaceShape::Oval => "Balanced proportions with soft contours; the classic reference shape.",
            FaceShape::Round => "Similar height and width, full cheeks and no defined angles.",
            FaceShape::Square => "Strong angular jaw with forehead, cheekbones and jaw of similar width.",
            FaceShape::Rectangular => "Square features on a longer face; angular jaw and high height-to-width.",
            FaceShape::Oblong => "Long face with fairly even widths and a rounded jaw line.",
            FaceShape::Heart => "Wide forehead tapering gradually to a pointed chin.",
            FaceShape::InvertedTriangle => "Forehead wider than the cheekbones with a narrow, sharp jaw.",
            FaceShape::Triangle => "Jaw wider than the forehead; the face broadens towards the bottom.",
            FaceShape::Diamond => "Prominent cheekbones with forehead and jaw clearly narrower.",
        }
    }
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown face shape: {0}")]
pub struct ParseFaceShapeError(pub String);

impl FromStr for FaceShape {
    type Err = ParseFaceShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        FaceShape::ALL
            .into_iter()
            .find(|shape| shape.label() == wanted)
            .ok_or_else(|| ParseFaceShapeError(s.to_string()))
    }
}

/// Net score of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeScore {
    pub shape: FaceShape,
    pub score: i32,
}

/// A rule that contributed points to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHit {
    pub shape: FaceShape,
    pub rule: &'static str,
    pub points: i32,
}

/// Outcome of shape classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeClassification {
    pub primary: FaceShape,
    /// Percent, within [20, 95].
    pub confidence: u8,
    pub secondary: FaceShape,
    /// Percent, within [10, 90].
    pub secondary_confidence: u8,
    /// All nine categories, best first.
    pub scores: Vec<ShapeScore>,
    pub rules: Vec<RuleHit>,
}

impl ShapeClassification {
    pub fn score_of(&self, shape: FaceShape) -> i32 {
        self.scores
            .iter()
            .find(|s| s.shape == shape)
            .map(|s| s.score)
            .unwrap_or(0)
    }
}

/// Composite beauty score and the sub-scores that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeautyScore {
    /// Rounded to one decimal, within the display range.
    pub composite: f64,
    pub symmetry: f64,
    pub golden_ratio: f64,
    pub jaw_structure: f64,
    pub thirds_balance: f64,
    pub bonus_applied: bool,
}

/// Everything the engine produces for one face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceAnalysis {
    pub metrics: Metrics,
    pub shape: ShapeClassification,
    pub beauty: BeautyScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_shape_label_roundtrip() {
        for shape in FaceShape::ALL {
            assert_eq!(shape.label().parse::<FaceShape>(), Ok(shape));
        }
    }

    #[test]
    fn test_face_shape_parse_is_lenient() {
        assert_eq!("inverted-triangle".parse(), Ok(FaceShape::InvertedTriangle));
        assert_eq!(" oval ".parse(), Ok(FaceShape::Oval));
        assert!("egg".parse::<FaceShape>().is_err());
    }

    #[test]
    fn test_jaw_shape_groups() {
        assert!(JawShape::VeryAngular.is_angular());
        assert!(!JawShape::Moderate.is_angular());
        assert!(!JawShape::Moderate.is_soft());
        assert!(JawShape::VerySoft.is_soft());
    }

    fn metrics(height_width_ratio: f64, gonial_angle: f64) -> Metrics {
        Metrics {
            height_width_ratio,
            forehead_cheekbone_ratio: 0.9,
            temple_cheekbone_ratio: 0.95,
            jaw_cheekbone_ratio: 0.8,
            chin_cheekbone_ratio: 0.45,
            gonial_angle,
            jaw_shape: JawShape::Moderate,
            width_uniformity: 5.0,
            taper_index: 55.0,
            eye_span_ratio: 0.7,
            mouth_width_ratio: 0.4,
            nose_length_ratio: 0.6,
        }
    }

    #[test]
    fn test_angularity_index() {
        assert!((metrics(1.4, 120.0).angularity_index() - 30.0).abs() < 1e-9);
        assert_eq!(metrics(1.4, 150.0).angularity_index(), 0.0);
        assert_eq!(metrics(1.4, 160.0).angularity_index(), 0.0);
    }

    #[test]
    fn test_circularity_index() {
        assert_eq!(metrics(1.0, 135.0).circularity_index(), 100.0);
        assert!((metrics(1.4, 135.0).circularity_index() - 60.0).abs() < 1e-9);
        assert!((metrics(0.8, 135.0).circularity_index() - 80.0).abs() < 1e-9);
        assert_eq!(metrics(2.5, 135.0).circularity_index(), 0.0);
    }

    #[test]
    fn test_jaw_shape_serialized_label() {
        let json = serde_json::to_value(JawShape::VeryAngular).unwrap();
        assert_eq!(json, "VERY_ANGULAR");
    }
}
