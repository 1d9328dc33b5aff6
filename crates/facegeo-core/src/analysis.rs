//! Caller-facing entry points: analyze a landmark set, or run a detector
//! handle first and analyze the face it returns.

use crate::landmarks::LandmarkSet;
use crate::types::FaceAnalysis;
use crate::{beauty, classifier, geometry};
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no face detected; provide a photo with a clearly visible face")]
    NoFaceDetected,
    #[error("landmark detector failed: {0}")]
    Detector(String),
}

/// Extract metrics, classify the shape and score the face.
///
/// Only an empty landmark set is an error; degenerate geometry still
/// produces a (low-confidence) result.
pub fn analyze(landmarks: &LandmarkSet) -> Result<FaceAnalysis, AnalysisError> {
    if landmarks.is_empty() {
        return Err(AnalysisError::NoFaceDetected);
    }

    let metrics = geometry::extract(landmarks);
    let shape = classifier::classify(&metrics);
    let beauty = beauty::score(landmarks, &metrics);

    tracing::info!(
        shape = %shape.primary,
        confidence = shape.confidence,
        score = beauty.composite,
        "face analyzed"
    );

    Ok(FaceAnalysis { metrics, shape, beauty })
}

/// Source of landmark sets, e.g. a face-mesh model.
///
/// Implementations are loaded once by the caller and handed to a
/// [`FaceEngine`], which owns them from then on.
pub trait LandmarkDetector {
    type Input: ?Sized;
    type Error: Display;

    /// Detect faces in `input`, most prominent first.
    fn detect(&mut self, input: &Self::Input) -> Result<Vec<LandmarkSet>, Self::Error>;
}

/// Owns a landmark detector and runs the full pipeline on its output.
pub struct FaceEngine<D> {
    detector: D,
}

impl<D: LandmarkDetector> FaceEngine<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    /// Detect, then analyze the first face.
    pub fn analyze(&mut self, input: &D::Input) -> Result<FaceAnalysis, AnalysisError> {
        let faces = self
            .detector
            .detect(input)
            .map_err(|e| AnalysisError::Detector(e.to_string()))?;
        tracing::debug!(faces = faces.len(), "landmark detection finished");

        let face = faces
            .into_iter()
            .find(|f| !f.is_empty())
            .ok_or(AnalysisError::NoFaceDetected)?;
        analyze(&face)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}
