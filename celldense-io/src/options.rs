//! Settings shared by every loader.

use celldense_core::{CellDenseError, Result};
use celldense_matrix::{DimensionSelection, StoragePolicy, Transform};

/// How a file is turned into a dense matrix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoadOptions {
    /// Element type selection for the dense matrix.
    pub storage: StoragePolicy,
    /// Transform applied to every stored value.
    pub transform: Transform,
    /// Counts-per-million normalize each sample before the transform.
    pub normalize_cpm: bool,
    /// Which dimensions (genes) to keep; `None` keeps all of them.
    pub dimension_mask: Option<Vec<bool>>,
    /// Load per-sample and per-dimension annotations, sample embeddings and
    /// sample-by-sample graphs.
    pub load_metadata: bool,
    /// Load additional expression matrices stored next to the main one
    /// (AnnData `layers`).
    pub load_layers: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            storage: StoragePolicy::default(),
            transform: Transform::None,
            normalize_cpm: false,
            dimension_mask: None,
            load_metadata: true,
            load_layers: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: StoragePolicy) -> Self {
        self.storage = storage;
        self
    }

    /// Storage policy from its integer code (`-3..=5`).
    pub fn with_storage_code(self, code: i32) -> Self {
        self.with_storage(StoragePolicy::from_code(code))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_normalization(mut self, normalize_cpm: bool) -> Self {
        self.normalize_cpm = normalize_cpm;
        self
    }

    pub fn with_dimension_mask(mut self, mask: Vec<bool>) -> Self {
        self.dimension_mask = Some(mask);
        self
    }

    pub fn with_metadata(mut self, load_metadata: bool) -> Self {
        self.load_metadata = load_metadata;
        self
    }

    pub fn with_layers(mut self, load_layers: bool) -> Self {
        self.load_layers = load_layers;
        self
    }

    /// The dimension selection for a file with `dimension_count` dimensions.
    pub fn selection(&self, dimension_count: usize) -> Result<Option<DimensionSelection>> {
        match &self.dimension_mask {
            None => Ok(None),
            Some(mask) if mask.len() != dimension_count => Err(CellDenseError::ShapeMismatch {
                what: "dimension mask",
                expected: dimension_count,
                actual: mask.len(),
            }),
            Some(mask) => Ok(Some(DimensionSelection::from_mask(mask))),
        }
    }
}
