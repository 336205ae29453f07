//! Analysis thresholds and the dataset manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expression::ExpressionPaths;

pub const DEFAULT_MIN_TPM: f64 = 10.0;
pub const DEFAULT_MIN_PERCENT_EXPRESSED: f64 = 50.0;
pub const DEFAULT_MIN_FOLD_CHANGE: f64 = 10.0;
pub const DEFAULT_EXPRESSED_CUTOFF: f64 = 0.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minimum TPM must be a number >= 0 (got {0})")]
    InvalidTpmCutoff(f64),

    #[error("minimum percent expressed must be a number between 0 and 100 (got {0})")]
    InvalidPercentCutoff(f64),

    #[error("minimum fold change must be a number >= 1 (got {0})")]
    InvalidFoldChangeCutoff(f64),

    #[error("expressed cutoff must be a number >= 0 (got {0})")]
    InvalidExpressedCutoff(f64),

    #[error("I/O error while reading manifest '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest '{path}': {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Cut-offs used by the dominance and fold-change analyses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum average expression for an isoform to be a dominance candidate.
    pub min_tpm: f64,
    /// Minimum percent (0..=100) of cluster cells expressing the isoform.
    pub min_percent_expressed: f64,
    pub min_fold_change: f64,
    /// A cell expresses an isoform when its value is strictly above this.
    pub expressed_cutoff: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_tpm: DEFAULT_MIN_TPM,
            min_percent_expressed: DEFAULT_MIN_PERCENT_EXPRESSED,
            min_fold_change: DEFAULT_MIN_FOLD_CHANGE,
            expressed_cutoff: DEFAULT_EXPRESSED_CUTOFF,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_tpm.is_finite() || self.min_tpm < 0.0 {
            return Err(ConfigError::InvalidTpmCutoff(self.min_tpm));
        }
        if !(0.0..=100.0).contains(&self.min_percent_expressed) {
            return Err(ConfigError::InvalidPercentCutoff(self.min_percent_expressed));
        }
        if !self.min_fold_change.is_finite() || self.min_fold_change < 1.0 {
            return Err(ConfigError::InvalidFoldChangeCutoff(self.min_fold_change));
        }
        if !self.expressed_cutoff.is_finite() || self.expressed_cutoff < 0.0 {
            return Err(ConfigError::InvalidExpressedCutoff(self.expressed_cutoff));
        }
        Ok(())
    }
}

/// JSON document naming the files of one dataset.
///
/// ```json
/// { "gtf": "genes.gtf", "matrix": "matrix.tsv", "isoform_ids": "isoforms.txt",
///   "cell_labels": "labels.txt", "tsne": "tsne.tsv" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub gtf: PathBuf,
    pub matrix: PathBuf,
    pub isoform_ids: PathBuf,
    pub cell_labels: PathBuf,
    #[serde(default, rename = "tsne", skip_serializing_if = "Option::is_none")]
    pub coords: Option<PathBuf>,
}

impl Manifest {
    /// Read a manifest; relative paths are resolved against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::IoPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&text).map_err(|e| ConfigError::Manifest {
                path: path.display().to_string(),
                source: e,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(manifest.resolved_against(base))
    }

    pub fn resolved_against(self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        Self {
            gtf: resolve(self.gtf),
            matrix: resolve(self.matrix),
            isoform_ids: resolve(self.isoform_ids),
            cell_labels: resolve(self.cell_labels),
            coords: self.coords.map(resolve),
        }
    }

    pub fn expression_paths(&self) -> ExpressionPaths {
        ExpressionPaths {
            matrix: self.matrix.clone(),
            isoform_ids: self.isoform_ids.clone(),
            cell_labels: self.cell_labels.clone(),
            coords: self.coords.clone(),
        }
    }
}
