//! Landmark geometry: distances, gonial angles and the derived [`Metrics`].
//!
//! Extraction is total. A missing point or a zero-length reference segment
//! yields a neutral value for the affected metric instead of NaN.

use crate::landmarks::{topology as lm, LandmarkSet, Point};
use crate::types::{JawShape, Metrics};

/// Gonial angle assumed when a vertex or arm is missing or degenerate.
pub const NEUTRAL_GONIAL_ANGLE: f64 = 135.0;

/// Upper bounds (exclusive) of the first four jaw buckets, in degrees.
pub const JAW_ANGLE_BREAKPOINTS: [f64; 4] = [110.0, 125.0, 138.0, 150.0];

const NEUTRAL_HEIGHT_WIDTH: f64 = 1.40;
const NEUTRAL_FOREHEAD: f64 = 0.90;
const NEUTRAL_TEMPLE: f64 = 0.95;
const NEUTRAL_JAW: f64 = 0.80;
const NEUTRAL_CHIN: f64 = 0.45;
const NEUTRAL_EYE_SPAN: f64 = 0.70;
const NEUTRAL_MOUTH: f64 = 0.40;
const NEUTRAL_NOSE: f64 = 0.60;

/// Reference segments at or below this length are treated as degenerate.
const MIN_SEGMENT: f64 = 1e-9;
const MAX_RATIO: f64 = 10.0;
/// Metrics are rounded to six decimals so that rescaled inputs agree exactly.
const QUANTUM: f64 = 1e6;

/// Compute the metrics for one landmark set.
pub fn extract(landmarks: &LandmarkSet) -> Metrics {
    let pt = |i: usize| landmarks.get(i);
    let dist = |a: usize, b: usize| Some(pt(a)?.distance(&pt(b)?));

    let height = dist(lm::CROWN, lm::CHIN);
    let cheekbones = dist(lm::CHEEKBONE_LEFT, lm::CHEEKBONE_RIGHT);

    let height_width_ratio = ratio(height, cheekbones, NEUTRAL_HEIGHT_WIDTH);
    let forehead = ratio(dist(lm::FOREHEAD_LEFT, lm::FOREHEAD_RIGHT), cheekbones, NEUTRAL_FOREHEAD);
    let temple = ratio(dist(lm::TEMPLE_LEFT, lm::TEMPLE_RIGHT), cheekbones, NEUTRAL_TEMPLE);
    let jaw = ratio(dist(lm::JAW_ANGLE_LEFT, lm::JAW_ANGLE_RIGHT), cheekbones, NEUTRAL_JAW);
    let chin = ratio(dist(lm::JAW_LEFT, lm::JAW_RIGHT), cheekbones, NEUTRAL_CHIN);
    let eye_span = ratio(dist(lm::EYE_OUTER_LEFT, lm::EYE_OUTER_RIGHT), cheekbones, NEUTRAL_EYE_SPAN);
    let mouth = ratio(dist(lm::MOUTH_LEFT, lm::MOUTH_RIGHT), cheekbones, NEUTRAL_MOUTH);
    let nose = ratio(dist(lm::GLABELLA, lm::CHIN), height, NEUTRAL_NOSE);

    let left = vertex_angle(pt(lm::CHEEKBONE_LEFT), pt(lm::JAW_ANGLE_LEFT), pt(lm::CHIN));
    let right = vertex_angle(pt(lm::CHEEKBONE_RIGHT), pt(lm::JAW_ANGLE_RIGHT), pt(lm::CHIN));
    let gonial_angle = quantize((left + right) / 2.0);

    let widths = [forehead, temple, 1.0, jaw];
    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    let variance = widths.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / widths.len() as f64;
    let width_uniformity = quantize(variance.sqrt() * 100.0);

    let taper_index = quantize(((1.0 - chin) * 100.0).max(0.0));

    let metrics = Metrics {
        height_width_ratio,
        forehead_cheekbone_ratio: forehead,
        temple_cheekbone_ratio: temple,
        jaw_cheekbone_ratio: jaw,
        chin_cheekbone_ratio: chin,
        gonial_angle,
        jaw_shape: jaw_shape_for(gonial_angle),
        width_uniformity,
        taper_index,
        eye_span_ratio: eye_span,
        mouth_width_ratio: mouth,
        nose_length_ratio: nose,
    };

    tracing::trace!(?metrics, "extracted face metrics");
    metrics
}

/// Bucket a gonial angle into the five-level jaw contour.
pub fn jaw_shape_for(angle: f64) -> JawShape {
    let [very_angular, angular, moderate, soft] = JAW_ANGLE_BREAKPOINTS;
    if angle < very_angular {
        JawShape::VeryAngular
    } else if angle < angular {
        JawShape::Angular
    } else if angle < moderate {
        JawShape::Moderate
    } else if angle < soft {
        JawShape::Soft
    } else {
        JawShape::VerySoft
    }
}

/// Angle at `vertex` between the arms towards `a` and `b`, in degrees.
pub fn vertex_angle(a: Option<Point>, vertex: Option<Point>, b: Option<Point>) -> f64 {
    let (Some(a), Some(v), Some(b)) = (a, vertex, b) else {
        return NEUTRAL_GONIAL_ANGLE;
    };

    let (v1x, v1y) = (a.x - v.x, a.y - v.y);
    let (v2x, v2y) = (b.x - v.x, b.y - v.y);
    let m1 = (v1x * v1x + v1y * v1y).sqrt();
    let m2 = (v2x * v2x + v2y * v2y).sqrt();
    if m1 <= MIN_SEGMENT || m2 <= MIN_SEGMENT {
        return NEUTRAL_GONIAL_ANGLE;
    }

    let cos = ((v1x * v2x + v1y * v2y) / (m1 * m2)).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    if angle.is_finite() { angle } else { NEUTRAL_GONIAL_ANGLE }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>, neutral: f64) -> f64 {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > MIN_SEGMENT && n.is_finite() && d.is_finite() => {
            quantize((n / d).clamp(0.0, MAX_RATIO))
        }
        _ => neutral,
    }
}

fn quantize(value: f64) -> f64 {
    (value * QUANTUM).round() / QUANTUM
}
