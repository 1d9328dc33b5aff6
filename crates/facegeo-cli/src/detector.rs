//! Landmark detector over pre-computed face-mesh output.
//!
//! Accepts either one face (an array of `{x, y[, z]}` points), an array of
//! faces, or `{"faces": [...]}` as written by common face-mesh exporters.

use facegeo_core::landmarks::topology::MESH_SIZE;
use facegeo_core::{LandmarkDetector, LandmarkSet};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkDocument {
    Single(LandmarkSet),
    Many(Vec<LandmarkSet>),
    Wrapped { faces: Vec<LandmarkSet> },
}

/// Reads landmark sets from JSON text.
#[derive(Debug, Default)]
pub struct JsonLandmarks;

impl LandmarkDetector for JsonLandmarks {
    type Input = str;
    type Error = serde_json::Error;

    fn detect(&mut self, input: &str) -> Result<Vec<LandmarkSet>, Self::Error> {
        let faces = match serde_json::from_str(input)? {
            LandmarkDocument::Single(face) if face.is_empty() => Vec::new(),
            LandmarkDocument::Single(face) => vec![face],
            LandmarkDocument::Many(faces) | LandmarkDocument::Wrapped { faces } => faces,
        };
        for (index, face) in faces.iter().enumerate() {
            if !face.is_empty() && !face.is_full_mesh() {
                tracing::warn!(
                    face = index,
                    points = face.len(),
                    expected = MESH_SIZE,
                    "partial face mesh; missing landmarks fall back to neutral proportions"
                );
            }
        }
        Ok(faces)
    }
}
