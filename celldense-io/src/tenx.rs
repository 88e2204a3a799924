//! 10X Genomics HDF5 count matrices.
//!
//! The first group of the file holds the matrix as a compressed sparse
//! triple whose major axis is the barcodes (samples): `indptr`, `indices`
//! (gene indices) and either `data` or `data16` (bfloat16 bit patterns).
//! Gene names come from `gene_names`, `genes` or `features/name`. An
//! optional `meta` subgroup holds one group per sample annotation with its
//! labels in `l`.

use std::path::Path;

use hdf5::Group;
use tracing::{debug, info};

use celldense_core::{CellDenseError, ProgressSink, Result};
use celldense_matrix::{ingest_sparse_with_policy, Layout, SourceArray, SparseSource, StoragePlan};

use crate::dataset::LoadedDataset;
use crate::h5util::{h5err, open_file, read_indices, read_source_array, read_strings, read_strings_from_any, subgroup_names};
use crate::metadata::Annotation;
use crate::options::LoadOptions;

const GENE_NAME_DATASETS: [&str; 3] = ["gene_names", "genes", "features/name"];

/// Read a 10X HDF5 file into a dense samples × genes matrix.
pub fn read_10x(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let file = open_file(path)?;
    let group_name = subgroup_names(&file)?
        .into_iter()
        .next()
        .ok_or_else(|| CellDenseError::Parse(format!("{}: no matrix group", path.display())))?;
    let group = file.group(&group_name).map_err(h5err)?;

    let barcodes = read_strings(&group.dataset("barcodes").map_err(h5err)?)?;
    let genes = read_strings_from_any(&group, &GENE_NAME_DATASETS)?;
    let offsets = read_indices(&group, "indptr")?;
    let indices = read_indices(&group, "indices")?;
    let values = read_values(&group)?;
    debug!(
        group = %group_name,
        samples = barcodes.len(),
        genes = genes.len(),
        nnz = values.len(),
        "read 10x sparse arrays"
    );

    let selection = options.selection(genes.len())?;
    let source = SparseSource {
        values: &values,
        minor: &indices,
        offsets: &offsets,
        layout: Layout::RowMajor,
        rows: barcodes.len(),
        columns: genes.len(),
    };
    let plan = StoragePlan {
        policy: options.storage,
        transform: options.transform,
        normalize: options.normalize_cpm,
        selection: selection.as_ref(),
        progress,
    };
    let matrix = ingest_sparse_with_policy(&source, &plan)?;
    let genes = match &selection {
        Some(s) => s.filter(&genes),
        None => genes,
    };

    let mut dataset = LoadedDataset::new(matrix, genes, barcodes)?;
    if options.load_metadata && group.link_exists("meta") {
        let meta = group.group("meta").map_err(h5err)?;
        for label in subgroup_names(&meta)? {
            let labels = meta
                .group(&label)
                .and_then(|g| g.dataset("l"))
                .map_err(h5err)
                .and_then(|ds| read_strings(&ds));
            match labels {
                Ok(labels) => dataset.attach_sample_annotation(Annotation::from_labels(label, &labels)),
                Err(e) => debug!(annotation = %label, error = %e, "unreadable 10x annotation"),
            }
        }
    }

    info!(
        path = %path.display(),
        samples = dataset.n_samples(),
        dimensions = dataset.n_dimensions(),
        storage = %dataset.matrix().element_type(),
        "loaded 10x matrix"
    );
    Ok(dataset)
}

fn read_values(group: &Group) -> Result<SourceArray> {
    if group.link_exists("data") {
        return read_source_array(&group.dataset("data").map_err(h5err)?);
    }
    let bits: Vec<u16> = group
        .dataset("data16")
        .and_then(|ds| ds.read_raw())
        .map_err(h5err)?;
    Ok(SourceArray::from_bf16_bits(&bits))
}
