//! Fingerprint records and approximate face matching.
//!
//! A fingerprint is a re-identification aid, not a credential: two faces
//! match when their weighted proportion difference is small enough.

use facegeo_core::Metrics;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current persisted format. Unencrypted caches were "1.0".
pub const FORMAT_VERSION: &str = "2.0";

/// Providers whose analyses are never cached (they can be recomputed locally).
const LOCAL_PROVIDERS: [&str; 2] = ["LOCAL", "LOCAL_FALLBACK"];

const EYE_WEIGHT: f64 = 1.5;
const FACIAL_INDEX_WEIGHT: f64 = 1.5;
const JAW_WEIGHT: f64 = 1.2;
const NOSE_WEIGHT: f64 = 1.0;
const MOUTH_WEIGHT: f64 = 1.0;
const CHEEK_WEIGHT: f64 = 1.0;

/// Compact, pose-tolerant summary of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub eye: f64,
    pub nose: f64,
    pub mouth: f64,
    pub facial_index: f64,
    pub jaw: f64,
    pub cheek: f64,
}

impl FeatureVector {
    const WEIGHTS: [f64; 6] = [
        EYE_WEIGHT,
        NOSE_WEIGHT,
        MOUTH_WEIGHT,
        FACIAL_INDEX_WEIGHT,
        JAW_WEIGHT,
        CHEEK_WEIGHT,
    ];

    pub fn from_metrics(m: &Metrics) -> Self {
        Self {
            eye: m.eye_span_ratio,
            nose: m.nose_length_ratio,
            mouth: m.mouth_width_ratio,
            facial_index: m.height_width_ratio,
            jaw: m.jaw_cheekbone_ratio,
            cheek: m.temple_cheekbone_ratio,
        }
    }

    fn values(&self) -> [f64; 6] {
        [self.eye, self.nose, self.mouth, self.facial_index, self.jaw, self.cheek]
    }

    /// `100 × (1 − weighted mean absolute difference)`, clamped to [0, 100].
    pub fn similarity(&self, other: &FeatureVector) -> f64 {
        let total_weight: f64 = Self::WEIGHTS.iter().sum();
        let weighted_diff: f64 = self
            .values()
            .iter()
            .zip(other.values())
            .zip(Self::WEIGHTS)
            .map(|((a, b), w)| (a - b).abs() * w)
            .sum();
        let similarity = (1.0 - weighted_diff / total_weight) * 100.0;
        if similarity.is_finite() { similarity.clamp(0.0, 100.0) } else { 0.0 }
    }
}

/// Similarity in percent between two faces' metrics.
pub fn similarity(a: &Metrics, b: &Metrics) -> f64 {
    FeatureVector::from_metrics(a).similarity(&FeatureVector::from_metrics(b))
}

/// Identifier derived from the features rounded to three decimals.
pub fn fingerprint_id(metrics: &Metrics) -> String {
    let key = FeatureVector::from_metrics(metrics)
        .values()
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect::<Vec<_>>()
        .join("-");
    Sha256::digest(key.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Last external analysis remembered for a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAnalysis {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beauty_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl CachedAnalysis {
    /// Local fallback analyses are not worth remembering.
    pub fn is_cacheable(&self) -> bool {
        !LOCAL_PROVIDERS.contains(&self.provider.as_str())
    }
}

/// One remembered face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceFingerprint {
    pub id: String,
    pub metrics: Metrics,
    /// Shape label agreed on the first visit.
    pub face_shape: String,
    /// Last seen, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub analysis_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis: Option<CachedAnalysis>,
}

/// The persisted collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceCache {
    pub version: String,
    #[serde(default)]
    pub fingerprints: Vec<FaceFingerprint>,
}

impl Default for FaceCache {
    fn default() -> Self {
        Self { version: FORMAT_VERSION.to_string(), fingerprints: Vec::new() }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use facegeo_core::JawShape;

    /// Metrics whose six fingerprint features all move together with `level`.
    pub(crate) fn metrics(level: f64) -> Metrics {
        Metrics {
            height_width_ratio: 1.2 + level,
            forehead_cheekbone_ratio: 0.9,
            temple_cheekbone_ratio: 0.9 + level,
            jaw_cheekbone_ratio: 0.8 + level,
            chin_cheekbone_ratio: 0.45,
            gonial_angle: 130.0,
            jaw_shape: JawShape::Moderate,
            width_uniformity: 5.0,
            taper_index: 55.0,
            eye_span_ratio: 0.6 + level,
            mouth_width_ratio: 0.4 + level,
            nose_length_ratio: 0.5 + level,
        }
    }

    #[test]
    fn test_identical_metrics_fully_similar() {
        assert_eq!(similarity(&metrics(0.0), &metrics(0.0)), 100.0);
    }

    #[test]
    fn test_uniform_shift_reduces_similarity_linearly() {
        let s = similarity(&metrics(0.0), &metrics(0.1));
        assert!((s - 90.0).abs() < 1e-9, "similarity = {s}");
        let s = similarity(&metrics(0.0), &metrics(0.25));
        assert!((s - 75.0).abs() < 1e-9, "similarity = {s}");
    }

    #[test]
    fn test_weights_favor_eye_and_height() {
        let base = metrics(0.0);
        let mut eye = base.clone();
        eye.eye_span_ratio += 0.1;
        let mut mouth = base.clone();
        mouth.mouth_width_ratio += 0.1;
        assert!(similarity(&base, &eye) < similarity(&base, &mouth));
    }

    #[test]
    fn test_similarity_clamped_at_zero() {
        assert_eq!(similarity(&metrics(0.0), &metrics(5.0)), 0.0);
    }

    #[test]
    fn test_fingerprint_id_ignores_tiny_noise() {
        let a = metrics(0.0);
        let mut b = a.clone();
        b.eye_span_ratio += 1e-5;
        assert_eq!(fingerprint_id(&a), fingerprint_id(&b));
        assert_ne!(fingerprint_id(&a), fingerprint_id(&metrics(0.2)));
        assert_eq!(fingerprint_id(&a).len(), 16);
    }

    #[test]
    fn test_local_analysis_not_cacheable() {
        let local = CachedAnalysis { provider: "LOCAL_FALLBACK".into(), beauty_score: None, notes: vec![] };
        let remote = CachedAnalysis { provider: "VISION".into(), beauty_score: Some(8.4), notes: vec![] };
        assert!(!local.is_cacheable());
        assert!(remote.is_cacheable());
    }

    #[test]
    fn test_persisted_layout_field_names() {
        let fp = FaceFingerprint {
            id: "abc".into(),
            metrics: metrics(0.0),
            face_shape: "OVAL".into(),
            timestamp: 1,
            analysis_count: 2,
            last_analysis: None,
        };
        let json = serde_json::to_value(FaceCache { version: FORMAT_VERSION.into(), fingerprints: vec![fp] })
            .unwrap();
        let entry = &json["fingerprints"][0];
        assert_eq!(json["version"], "2.0");
        assert_eq!(entry["faceShape"], "OVAL");
        assert_eq!(entry["analysisCount"], 2);
        assert!(entry["metrics"]["heightWidthRatio"].is_number());
        assert!(entry.get("lastAnalysis").is_none());
    }
}
