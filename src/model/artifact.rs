//! Persisted output of one training run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::ModelError;
use super::train::TrainedModel;
use crate::pipeline::catalog::ModelVariant;
use crate::pipeline::features::{FeatureMatrix, FeatureSchema};
use crate::pipeline::partition::Split;

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 2;

/// Everything evaluation needs from a trained variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub variant: ModelVariant,
    /// Seed the split and search ran with.
    pub seed: u64,
    pub test_fraction: f64,
    pub split: Split,
    pub schema: FeatureSchema,
    /// Source columns the schema was fitted on.
    pub feature_columns: Vec<String>,
    pub x_train: FeatureMatrix,
    pub y_train: Vec<bool>,
    pub x_test: FeatureMatrix,
    pub y_test: Vec<bool>,
    pub model: TrainedModel,
    /// RFC 3339 creation time.
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    variant: ModelVariant,
    n_features: usize,
    artifact: ModelArtifact,
}

impl ModelArtifact {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::SerializeModel`] | bincode encoding failed |
    /// | [`ModelError::WriteModel`] | file write failed |
    #[instrument(
        skip(self),
        fields(path = %path.as_ref().display(), variant = self.variant.name())
    )]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            variant: self.variant,
            n_features: self.x_train.n_features(),
            artifact: self.clone(),
        };

        let bytes =
            bincode::serialize(&envelope).map_err(|source| ModelError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| ModelError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(size_bytes = bytes.len(), "Model artifact saved");
        Ok(())
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadModel`] | file read failed |
    /// | [`ModelError::DeserializeModel`] | bincode decoding failed |
    /// | [`ModelError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ModelError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;

        // The version field leads the envelope, so it decodes even when the
        // rest of the layout has changed.
        let version: u32 =
            bincode::deserialize(&bytes).map_err(|source| ModelError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;
        if version != FORMAT_VERSION {
            return Err(ModelError::IncompatibleModelVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let envelope: ArtifactEnvelope =
            bincode::deserialize(&bytes).map_err(|source| ModelError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            variant = envelope.variant.name(),
            n_features = envelope.n_features,
            "Model artifact loaded"
        );
        Ok(envelope.artifact)
    }
}
