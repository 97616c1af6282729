//! Per-blob pruning and serialization configuration

use serde::{Deserialize, Serialize};

/// Stage of the pruning pipeline a blob participates in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PruneStage {
    /// Pruning is enforced by a mask: sparse blobs carry a mask buffer that
    /// `update()` multiplies into the value after each step.
    #[default]
    Masked,
    /// The weights are already compressed: no mask is allocated or applied,
    /// and loading a message marked sparse skips its dense part entirely.
    Compressed,
}

/// Configuration carried by each blob
///
/// ```
/// use numblob::{BlobConfig, PruneStage};
///
/// let config = BlobConfig::default()
///     .with_prune_stage(PruneStage::Compressed)
///     .with_emit_dense_with_csr(false);
/// assert!(!config.masks_active(true));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Pruning stage
    pub prune_stage: PruneStage,
    /// When serializing a sparse blob, also emit the dense value and mask
    /// alongside the CSR arrays.
    pub emit_dense_with_csr: bool,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            prune_stage: PruneStage::Masked,
            emit_dense_with_csr: true,
        }
    }
}

impl BlobConfig {
    /// Set the pruning stage
    pub fn with_prune_stage(mut self, stage: PruneStage) -> Self {
        self.prune_stage = stage;
        self
    }

    /// Set whether sparse serialization also emits dense value and mask
    pub fn with_emit_dense_with_csr(mut self, emit: bool) -> Self {
        self.emit_dense_with_csr = emit;
        self
    }

    /// Whether a blob with this configuration keeps and applies a mask.
    pub fn masks_active(&self, sparse: bool) -> bool {
        sparse && self.prune_stage == PruneStage::Masked
    }
}
