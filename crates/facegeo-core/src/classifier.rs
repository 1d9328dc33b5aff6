//! Face-shape classification.
//!
//! Each category has its own rule set: signed point contributions gated by
//! predicates over [`Metrics`]. Many predicates feed several categories at
//! once, and the explicit penalties for a competing category's signature
//! are what separate close candidates. The best net score wins.

use crate::types::{FaceShape, Metrics, RuleHit, ShapeClassification, ShapeScore};

/// Normalizer for confidence: the positive points a strong match collects.
pub const MAX_SCORE: f64 = 120.0;

const PRIMARY_CONFIDENCE: (f64, f64) = (20.0, 95.0);
const SECONDARY_CONFIDENCE: (f64, f64) = (10.0, 90.0);

// Height / cheekbone width.
const ELONGATED_HW: f64 = 1.55;
const VERY_ELONGATED_HW: f64 = 1.85;
const COMPACT_HW_MAX: f64 = 1.45;
const ROUND_HW: (f64, f64) = (1.00, 1.30);
const OVAL_HW: (f64, f64) = (1.30, 1.60);

// Jaw / cheekbone width.
const WIDE_JAW_MIN: f64 = 0.835;
const NEAR_CHEEK_JAW_MIN: f64 = 0.82;
const JAW_BONUS_BASE: f64 = 0.80;
const JAW_BONUS_SCALE: f64 = 150.0;
const NARROW_JAW_MAX: f64 = 0.78;
const OVAL_JAW: (f64, f64) = (0.75, WIDE_JAW_MIN);
const TRIANGLE_JAW_MIN: f64 = 0.90;

// Forehead / cheekbone width.
const NARROW_FOREHEAD_MAX: f64 = 0.80;
const WIDE_FOREHEAD_MIN: f64 = 0.95;
const BROAD_FOREHEAD_MIN: f64 = 1.02;
const HEART_FOREHEAD_OVER_JAW: f64 = 0.15;
const INVERTED_FOREHEAD_OVER_JAW: f64 = 0.25;
const TRIANGLE_JAW_OVER_FOREHEAD: f64 = 0.08;
const TRIANGLE_STRONG_JAW_OVER_FOREHEAD: f64 = 0.15;
/// A forehead at most this much narrower than the jaw still frames a box.
const BOX_FOREHEAD_SLACK: f64 = 0.05;

// Diamond tiers: both forehead and jaw below the cheekbones.
const DIAMOND_TIGHT_MAX: f64 = 0.80;
const DIAMOND_LOOSE_MAX: f64 = 0.86;
const DIAMOND_LOOSE_MIN_SPREAD: f64 = 8.0;
const DIAMOND_HEART_FOREHEAD_MIN: f64 = 0.90;

// Percent indices.
const POINTED_CHIN_TAPER: f64 = 62.0;
const UNIFORM_MAX: f64 = 8.0;
const FAIRLY_UNIFORM_MAX: f64 = 12.0;

/// Boolean features shared by the category rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signals {
    /// Jaw contour is angular or very angular.
    pub sharp_angle: bool,
    /// Jaw at least as wide as the wide-jaw threshold.
    pub wide_jaw: bool,
    /// Either angular signal fired.
    pub angular: bool,
    pub moderate_angle: bool,
    /// Jaw contour is soft or very soft.
    pub soft: bool,
    pub jaw_near_cheekbones: bool,
    pub narrow_jaw: bool,
    pub narrow_forehead: bool,
    pub wide_forehead: bool,
    pub broad_forehead: bool,
    pub pointed_chin: bool,
    pub elongated: bool,
    pub very_elongated: bool,
    pub compact: bool,
    pub uniform: bool,
    pub fairly_uniform: bool,
}

impl Signals {
    pub fn from_metrics(m: &Metrics) -> Self {
        let sharp_angle = m.jaw_shape.is_angular();
        let wide_jaw = m.jaw_cheekbone_ratio >= WIDE_JAW_MIN;
        let soft = m.jaw_shape.is_soft();
        Self {
            sharp_angle,
            wide_jaw,
            angular: sharp_angle || wide_jaw,
            moderate_angle: !sharp_angle && !soft,
            soft,
            jaw_near_cheekbones: m.jaw_cheekbone_ratio >= NEAR_CHEEK_JAW_MIN,
            narrow_jaw: m.jaw_cheekbone_ratio < NARROW_JAW_MAX,
            narrow_forehead: m.forehead_cheekbone_ratio < NARROW_FOREHEAD_MAX,
            wide_forehead: m.forehead_cheekbone_ratio >= WIDE_FOREHEAD_MIN,
            broad_forehead: m.forehead_cheekbone_ratio > BROAD_FOREHEAD_MIN,
            pointed_chin: m.taper_index > POINTED_CHIN_TAPER,
            elongated: m.height_width_ratio > ELONGATED_HW,
            very_elongated: m.height_width_ratio > VERY_ELONGATED_HW,
            compact: m.height_width_ratio <= COMPACT_HW_MAX,
            uniform: m.width_uniformity < UNIFORM_MAX,
            fairly_uniform: m.width_uniformity < FAIRLY_UNIFORM_MAX,
        }
    }
}

/// Running score of one category plus the rules that fired.
struct Tally {
    shape: FaceShape,
    total: i32,
    hits: Vec<RuleHit>,
}

impl Tally {
    fn new(shape: FaceShape) -> Self {
        Self { shape, total: 0, hits: Vec::new() }
    }

    fn add(&mut self, when: bool, rule: &'static str, points: i32) {
        if when && points != 0 {
            self.total += points;
            self.hits.push(RuleHit { shape: self.shape, rule, points });
        }
    }
}

fn within(value: f64, (lo, hi): (f64, f64)) -> bool {
    (lo..=hi).contains(&value)
}

fn square(m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(s.angular, "angular jaw", 40);
    if s.jaw_near_cheekbones {
        let bonus = ((m.jaw_cheekbone_ratio - JAW_BONUS_BASE) * JAW_BONUS_SCALE).round() as i32;
        t.add(true, "jaw close to cheekbone width", bonus);
    }
    t.add(s.compact, "compact proportions", 20);
    t.add(s.fairly_uniform, "even widths", 15);
    t.add(
        s.angular && s.jaw_near_cheekbones && s.compact && s.fairly_uniform,
        "angular, wide and compact",
        30,
    );
    t.add(
        s.moderate_angle
            && s.wide_jaw
            && !s.very_elongated
            && m.forehead_cheekbone_ratio >= m.jaw_cheekbone_ratio - BOX_FOREHEAD_SLACK,
        "wide jaw framed by forehead",
        35,
    );
    t.add(
        m.jaw_cheekbone_ratio > m.forehead_cheekbone_ratio + TRIANGLE_JAW_OVER_FOREHEAD,
        "jaw dominates forehead",
        -40,
    );
    t.add(s.elongated && s.sharp_angle, "long face with sharp jaw", -30);
    t.add(s.very_elongated, "very long face", -30);
}

fn rectangular(_m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(s.elongated, "elongated", 30);
    t.add(s.elongated && s.sharp_angle, "elongated with sharp jaw", 35);
    t.add(s.elongated && s.jaw_near_cheekbones, "elongated with wide jaw", 25);
    t.add(s.compact, "compact proportions", -40);
    t.add(
        s.moderate_angle && s.wide_jaw && !s.very_elongated,
        "moderate jaw angle reads square",
        -20,
    );
}

fn oblong(_m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(s.elongated, "elongated", 30);
    t.add(s.very_elongated, "very elongated", 25);
    t.add(s.elongated && !s.angular, "elongated with rounded jaw", 25);
    t.add(s.elongated && s.uniform, "elongated with even widths", 15);
    t.add(s.angular, "angular jaw", -25);
    t.add(s.compact, "compact proportions", -40);
}

fn round(m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(within(m.height_width_ratio, ROUND_HW), "circular proportions", 35);
    t.add(s.soft, "soft jaw", 40);
    t.add(s.uniform, "very even widths", 20);
    t.add(s.angular, "angular jaw", -50);
    t.add(s.elongated, "elongated", -40);
}

fn oval(m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(within(m.height_width_ratio, OVAL_HW), "balanced proportions", 35);
    t.add(
        m.jaw_cheekbone_ratio >= OVAL_JAW.0 && m.jaw_cheekbone_ratio < OVAL_JAW.1,
        "moderate jaw width",
        25,
    );
    t.add(s.moderate_angle, "moderate jaw angle", 25);
    t.add(
        m.forehead_cheekbone_ratio > m.jaw_cheekbone_ratio,
        "forehead wider than jaw",
        10,
    );
    t.add(s.sharp_angle, "sharp jaw angle", -30);
    t.add(s.wide_jaw, "wide jaw", -20);
    t.add(s.soft && m.height_width_ratio < 1.2, "soft and short", -20);
    t.add(s.elongated, "elongated", -25);
}

fn heart(m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(s.wide_forehead, "wide forehead", 35);
    t.add(
        m.forehead_cheekbone_ratio > m.jaw_cheekbone_ratio + HEART_FOREHEAD_OVER_JAW,
        "forehead well above jaw",
        30,
    );
    t.add(s.pointed_chin, "pointed chin", 30);
    t.add(s.narrow_jaw, "narrow jaw", 20);
    t.add(s.jaw_near_cheekbones, "jaw close to cheekbone width", -40);
    t.add(s.sharp_angle, "sharp jaw angle", -15);
    t.add(s.broad_forehead, "forehead wider than cheekbones", -10);
}

fn inverted_triangle(m: &Metrics, s: &Signals, t: &mut Tally) {
    t.add(s.broad_forehead, "forehead wider than cheekbones", 40);
    t.add(
        m.forehead_cheekbone_ratio > m.jaw_cheekbone_ratio + INVERTED_FOREHEAD_OVER_JAW,
        "forehead far above jaw",
        30,
    );
    t.add(s.narrow_jaw, "narrow jaw", 20);
    t.add(s.pointed_chin, "pointed chin", 20);
    t.add(s.sharp_angle, "sharp jaw angle", 10);
    t.add(s.jaw_near_cheekbones, "jaw close to cheekbone width", -40);
    t.add(s.soft, "soft jaw", -10);
    t.add(s.elongated, "elongated", -10);
}

fn triangle(m: &Metrics, s: &Signals, t: &mut Tally) {
    let jaw_over_forehead = m.jaw_cheekbone_ratio - m.forehead_cheekbone_ratio;
    t.add(jaw_over_forehead > TRIANGLE_JAW_OVER_FOREHEAD, "jaw wider than forehead", 45);
    t.add(m.jaw_cheekbone_ratio >= TRIANGLE_JAW_MIN, "broad jaw", 25);
    t.add(s.narrow_forehead, "narrow forehead", 20);
    t.add(
        jaw_over_forehead > TRIANGLE_STRONG_JAW_OVER_FOREHEAD,
        "strongly bottom-heavy",
        20,
    );
    t.add(s.elongated, "elongated", -25);
    t.add(s.pointed_chin, "pointed chin", -30);
    t.add(jaw_over_forehead <= 0.0, "forehead at least as wide as jaw", -30);
}

fn diamond(m: &Metrics, s: &Signals, t: &mut Tally) {
    let fh = m.forehead_cheekbone_ratio;
    let jaw = m.jaw_cheekbone_ratio;
    if fh < DIAMOND_TIGHT_MAX && jaw < DIAMOND_TIGHT_MAX {
        t.add(true, "forehead and jaw well below cheekbones", 70);
    } else if fh < DIAMOND_LOOSE_MAX
        && jaw < DIAMOND_LOOSE_MAX
        && m.width_uniformity >= DIAMOND_LOOSE_MIN_SPREAD
    {
        t.add(true, "forehead and jaw below cheekbones", 40);
    } else {
        t.add(true, "cheekbones not dominant", -40);
    }
    t.add(s.angular, "angular jaw", -25);
    t.add(
        s.moderate_angle
            && !s.angular
            && s.pointed_chin
            && s.narrow_jaw
            && fh >= DIAMOND_HEART_FOREHEAD_MIN,
        "tapering heart pattern",
        -30,
    );
    t.add(s.wide_forehead, "wide forehead", -30);
}

fn tally(shape: FaceShape, m: &Metrics, s: &Signals) -> Tally {
    let mut t = Tally::new(shape);
    let rules: fn(&Metrics, &Signals, &mut Tally) = match shape {
        FaceShape::Oval => oval,
        FaceShape::Round => round,
        FaceShape::Square => square,
        FaceShape::Rectangular => rectangular,
        FaceShape::Oblong => oblong,
        FaceShape::Heart => heart,
        FaceShape::InvertedTriangle => inverted_triangle,
        FaceShape::Triangle => triangle,
        FaceShape::Diamond => diamond,
    };
    rules(m, s, &mut t);
    t
}

/// Net score of a single category.
pub fn score(shape: FaceShape, metrics: &Metrics) -> i32 {
    tally(shape, metrics, &Signals::from_metrics(metrics)).total
}

/// Classify metrics into the best and runner-up face shapes.
///
/// Never fails: when every category is penalized the least negative one
/// is still returned, at the confidence floor.
pub fn classify(metrics: &Metrics) -> ShapeClassification {
    let signals = Signals::from_metrics(metrics);
    let mut scores = Vec::with_capacity(FaceShape::ALL.len());
    let mut rules = Vec::new();

    for shape in FaceShape::ALL {
        let t = tally(shape, metrics, &signals);
        scores.push(ShapeScore { shape, score: t.total });
        rules.extend(t.hits);
    }

    // Stable: ties keep FaceShape::ALL order.
    scores.sort_by(|a, b| b.score.cmp(&a.score));

    let best = scores[0];
    let runner_up = scores[1];

    for hit in &rules {
        tracing::debug!(shape = %hit.shape, rule = hit.rule, points = hit.points, "shape rule");
    }
    tracing::debug!(
        primary = %best.shape,
        primary_score = best.score,
        secondary = %runner_up.shape,
        secondary_score = runner_up.score,
        "face shape classified"
    );

    ShapeClassification {
        primary: best.shape,
        confidence: confidence(best.score, PRIMARY_CONFIDENCE),
        secondary: runner_up.shape,
        secondary_confidence: confidence(runner_up.score, SECONDARY_CONFIDENCE),
        scores,
        rules,
    }
}

fn confidence(score: i32, (floor, ceiling): (f64, f64)) -> u8 {
    (score as f64 / MAX_SCORE * 100.0).clamp(floor, ceiling).round() as u8
}
