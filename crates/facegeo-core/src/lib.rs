//! facegeo-core — Facial geometry engine.
//!
//! Turns face-mesh landmarks into scale-invariant proportions, a face-shape
//! classification and a deterministic beauty score. All stages are pure
//! functions and safe to call from any number of threads.

pub mod analysis;
pub mod beauty;
pub mod classifier;
pub mod geometry;
pub mod landmarks;
pub mod types;

pub use analysis::{analyze, AnalysisError, FaceEngine, LandmarkDetector};
pub use landmarks::{LandmarkSet, Point};
pub use types::{
    BeautyScore, FaceAnalysis, FaceShape, JawShape, Metrics, ParseFaceShapeError, RuleHit,
    ShapeClassification, ShapeScore,
};
