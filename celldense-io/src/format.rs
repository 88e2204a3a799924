//! File format detection and dispatch.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use celldense_core::{CellDenseError, Result};

/// The single-cell container formats that can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Format {
    /// 10X Genomics HDF5 count matrix.
    TenX,
    /// AnnData.
    H5ad,
    /// TOME exon/intron counts.
    Tome,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::TenX, Format::H5ad, Format::Tome];

    /// Guess the format from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "h5ad" => Some(Format::H5ad),
            "tome" => Some(Format::Tome),
            "h5" | "hdf5" => Some(Format::TenX),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::TenX => "10x",
            Format::H5ad => "h5ad",
            Format::Tome => "tome",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = CellDenseError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| CellDenseError::InvalidInput(format!("unknown format: {s}")))
    }
}

#[cfg(feature = "h5")]
mod dispatch {
    use std::path::Path;

    use tracing::debug;

    use celldense_core::{CellDenseError, NoProgress, ProgressSink, Result};

    use super::Format;
    use crate::dataset::LoadedDataset;
    use crate::options::LoadOptions;
    use crate::{h5ad, tenx, tome};

    impl Format {
        /// Like [`Format::from_path`], but an `.h5` file with an AnnData
        /// layout is reported as [`Format::H5ad`].
        pub fn detect(path: impl AsRef<Path>) -> Option<Self> {
            let path = path.as_ref();
            match Format::from_path(path)? {
                Format::TenX if h5ad::is_h5ad(path) => Some(Format::H5ad),
                format => Some(format),
            }
        }

        pub fn read(
            &self,
            path: impl AsRef<Path>,
            options: &LoadOptions,
            progress: &dyn ProgressSink,
        ) -> Result<LoadedDataset> {
            match self {
                Format::TenX => tenx::read_10x(path, options, progress),
                Format::H5ad => h5ad::read_h5ad(path, options, progress),
                Format::Tome => tome::read_tome(path, options, progress),
            }
        }
    }

    /// Detect the format of `path` and load it.
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<LoadedDataset> {
        load_with_progress(path, options, &NoProgress)
    }

    pub fn load_with_progress(
        path: impl AsRef<Path>,
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<LoadedDataset> {
        let path = path.as_ref();
        let format = Format::detect(path).ok_or_else(|| {
            CellDenseError::InvalidInput(format!("cannot tell the format of {}", path.display()))
        })?;
        debug!(path = %path.display(), %format, "detected format");
        format.read(path, options, progress)
    }
}

#[cfg(feature = "h5")]
pub use dispatch::{load, load_with_progress};
