//! Deterministic beauty score from four geometric sub-scores.
//!
//! The weights, display range and bonus are calibration constants. The
//! same landmarks always produce the same score.

use crate::landmarks::{topology as lm, LandmarkSet};
use crate::types::{BeautyScore, JawShape, Metrics};

pub const GOLDEN_RATIO: f64 = 1.618;

const SYMMETRY_WEIGHT: f64 = 0.30;
const GOLDEN_WEIGHT: f64 = 0.30;
const JAW_WEIGHT: f64 = 0.25;
const THIRDS_WEIGHT: f64 = 0.15;

const SYMMETRY_SLOPE: f64 = 25.0;
const GOLDEN_SLOPE: f64 = 4.0;
const THIRDS_TARGET: f64 = 0.8;
const THIRDS_SLOPE: f64 = 5.0;
/// Assumed when no bilateral pair can be measured.
const NEUTRAL_ASYMMETRY: f64 = 0.08;

/// Lowest composite ever reported.
pub const DISPLAY_FLOOR: f64 = 7.2;
/// Highest composite ever reported.
pub const DISPLAY_CEILING: f64 = 9.9;
const HIGH_TIER_BONUS: f64 = 0.3;
const HIGH_TIER: f64 = 8.5;

const SUB_SCORE_MAX: f64 = 10.0;

/// Score one face. Never fails; missing landmarks degrade the symmetry
/// term to a neutral value.
pub fn score(landmarks: &LandmarkSet, metrics: &Metrics) -> BeautyScore {
    let symmetry = sub_score(SUB_SCORE_MAX - asymmetry(landmarks) * SYMMETRY_SLOPE);
    let golden_ratio =
        sub_score(SUB_SCORE_MAX - (metrics.height_width_ratio - GOLDEN_RATIO).abs() * GOLDEN_SLOPE);
    let jaw_structure = jaw_base_score(metrics.jaw_shape);
    let thirds_balance = sub_score(
        SUB_SCORE_MAX - (metrics.forehead_cheekbone_ratio - THIRDS_TARGET).abs() * THIRDS_SLOPE,
    );

    let weighted = symmetry * SYMMETRY_WEIGHT
        + golden_ratio * GOLDEN_WEIGHT
        + jaw_structure * JAW_WEIGHT
        + thirds_balance * THIRDS_WEIGHT;

    let bonus_applied = symmetry > HIGH_TIER && jaw_structure > HIGH_TIER;
    let raw = if bonus_applied { weighted + HIGH_TIER_BONUS } else { weighted };
    let composite = (raw.clamp(DISPLAY_FLOOR, DISPLAY_CEILING) * 10.0).round() / 10.0;

    tracing::debug!(
        composite,
        symmetry,
        golden_ratio,
        jaw_structure,
        thirds_balance,
        bonus_applied,
        "beauty score"
    );

    BeautyScore {
        composite,
        symmetry,
        golden_ratio,
        jaw_structure,
        thirds_balance,
        bonus_applied,
    }
}

/// Base score for each jaw contour; sharper jaws score higher.
pub fn jaw_base_score(jaw: JawShape) -> f64 {
    match jaw {
        JawShape::VeryAngular => 9.5,
        JawShape::Angular => 9.0,
        JawShape::Moderate => 8.0,
        JawShape::Soft => 7.0,
        JawShape::VerySoft => 6.0,
    }
}

/// Mean normalized left/right difference of glabella distances over the
/// cheekbone and jaw-angle pairs.
fn asymmetry(landmarks: &LandmarkSet) -> f64 {
    let Some(center) = landmarks.get(lm::GLABELLA) else {
        return NEUTRAL_ASYMMETRY;
    };

    let pairs = [
        (lm::CHEEKBONE_LEFT, lm::CHEEKBONE_RIGHT),
        (lm::JAW_ANGLE_LEFT, lm::JAW_ANGLE_RIGHT),
    ];
    let measured: Vec<f64> = pairs
        .iter()
        .filter_map(|&(l, r)| {
            let left = center.distance(&landmarks.get(l)?);
            let right = center.distance(&landmarks.get(r)?);
            let average = (left + right) / 2.0;
            (average > f64::EPSILON).then(|| (left - right).abs() / average)
        })
        .collect();

    if measured.is_empty() {
        return NEUTRAL_ASYMMETRY;
    }
    measured.iter().sum::<f64>() / measured.len() as f64
}

/// Clamp to [0, 10] and keep four decimals.
fn sub_score(value: f64) -> f64 {
    let clamped = if value.is_finite() { value.clamp(0.0, SUB_SCORE_MAX) } else { 0.0 };
    (clamped * 1e4).round() / 1e4
}
