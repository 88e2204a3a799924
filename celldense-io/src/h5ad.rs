//! AnnData `.h5ad` files.
//!
//! `X` is either a dense 2-D dataset or a sparse group (`data`, `indices`,
//! `indptr`) whose `encoding-type` (or legacy `h5sparse_format`) attribute
//! says whether it is CSR or CSC. Sample names come from the `obs` index and
//! dimension names from the `var` index. Remaining `obs` columns become
//! sample annotations and `var` columns dimension annotations. Files written
//! by older AnnData versions store `obs` and `var` as compound datasets
//! instead, with the names in the `index` field.
//!
//! Matrices in `obsm` become sample embeddings, sparse or dense matrices in
//! `obsp` become sample-by-sample layers, and with
//! [`LoadOptions::load_layers`] the entries of `layers` are ingested with the
//! same plan and dimension selection as `X`.

use std::path::Path;

use hdf5::{Dataset, File, Group};
use tracing::{debug, info, warn};

use celldense_core::{CellDenseError, NoProgress, ProgressSink, Result};
use celldense_matrix::{
    ingest_dense_with_policy, ingest_sparse_with_policy, DenseMatrix, DenseSource,
    DimensionSelection, Layout, SourceArray, SparseSource, StoragePlan, Transform,
};

use crate::dataset::{Layer, LoadedDataset};
use crate::h5util::{
    compound_fields, h5err, is_string_dataset, open_file, read_attr_string, read_compound_field,
    read_indices, read_source_array, read_strings, FieldValues,
};
use crate::metadata::{Annotation, Embedding};
use crate::options::LoadOptions;

const CATEGORIES_GROUP: &str = "__categories";
const COMPOUND_INDEX_FIELDS: [&str; 2] = ["index", "_index"];

/// Read an `.h5ad` file into a dense obs × var matrix.
pub fn read_h5ad(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let file = open_file(path)?;

    let obs_names = read_index(&file, "obs")?;
    let var_names = read_index(&file, "var")?;
    let x = StoredMatrix::read(&file, "X", obs_names.len(), var_names.len())?;
    let (rows, columns) = x.shape();
    let selection = options.selection(columns)?;
    debug!(rows, columns, sparse = x.is_sparse(), "reading X");
    let matrix = x.ingest(&plan(options, selection.as_ref(), progress))?;
    drop(x);

    let var_names = match &selection {
        Some(s) if var_names.len() == s.source_count() => s.filter(&var_names),
        _ => var_names,
    };
    let mut dataset = LoadedDataset::new(matrix, var_names, obs_names)?;

    if options.load_metadata {
        for annotation in read_columns(&file, "obs")? {
            dataset.attach_sample_annotation(annotation);
        }
        for annotation in read_columns(&file, "var")? {
            let annotation = match &selection {
                Some(s) if annotation.len() == s.source_count() => annotation.select(s),
                _ => annotation,
            };
            dataset.attach_dimension_annotation(annotation);
        }
        for embedding in read_embeddings(&file)? {
            dataset.attach_sample_embedding(embedding);
        }
        let graph_plan = StoragePlan {
            policy: options.storage,
            transform: Transform::None,
            normalize: false,
            selection: None,
            progress: &NoProgress,
        };
        for layer in read_matrix_group(&file, "obsp", (rows, rows), &graph_plan)? {
            dataset.attach_layer(layer);
        }
    }
    if options.load_layers {
        let layer_plan = plan(options, selection.as_ref(), &NoProgress);
        for layer in read_matrix_group(&file, "layers", (rows, columns), &layer_plan)? {
            dataset.attach_layer(layer);
        }
    }

    info!(
        path = %path.display(),
        samples = dataset.n_samples(),
        dimensions = dataset.n_dimensions(),
        storage = %dataset.matrix().element_type(),
        layers = dataset.layers().len(),
        "loaded h5ad matrix"
    );
    Ok(dataset)
}

fn plan<'a>(
    options: &LoadOptions,
    selection: Option<&'a DimensionSelection>,
    progress: &'a dyn ProgressSink,
) -> StoragePlan<'a> {
    StoragePlan {
        policy: options.storage,
        transform: options.transform,
        normalize: options.normalize_cpm,
        selection,
        progress,
    }
}

/// A matrix as stored in the file, before ingestion.
enum StoredMatrix {
    Dense {
        values: SourceArray,
        rows: usize,
        columns: usize,
    },
    Sparse {
        values: SourceArray,
        indices: Vec<i64>,
        offsets: Vec<i64>,
        layout: Layout,
        rows: usize,
        columns: usize,
    },
}

impl StoredMatrix {
    /// Read member `name` of `parent`, a 2-D dataset or a sparse group.
    /// `row_count` and `column_count` (0 when unknown) stand in for a
    /// sparse shape the file does not record.
    fn read(parent: &Group, name: &str, row_count: usize, column_count: usize) -> Result<Self> {
        if let Ok(ds) = parent.dataset(name) {
            let shape = ds.shape();
            let &[rows, columns] = shape.as_slice() else {
                return Err(CellDenseError::Parse(format!(
                    "dense matrix {name} must be 2-D, found shape {shape:?}"
                )));
            };
            let values = read_source_array(&ds)?;
            return Ok(Self::Dense { values, rows, columns });
        }

        let group = parent.group(name).map_err(h5err)?;
        let layout = sparse_layout(&group);
        let values = read_source_array(&group.dataset("data").map_err(h5err)?)?;
        let indices = read_indices(&group, "indices")?;
        let offsets = read_indices(&group, "indptr")?;
        let (rows, columns) = match sparse_shape(&group)? {
            Some(shape) => shape,
            None => inferred_shape(layout, &indices, &offsets, row_count, column_count),
        };
        Ok(Self::Sparse {
            values,
            indices,
            offsets,
            layout,
            rows,
            columns,
        })
    }

    fn shape(&self) -> (usize, usize) {
        match *self {
            Self::Dense { rows, columns, .. } | Self::Sparse { rows, columns, .. } => (rows, columns),
        }
    }

    fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse { .. })
    }

    fn ingest(&self, plan: &StoragePlan<'_>) -> Result<DenseMatrix> {
        match self {
            Self::Dense { values, rows, columns } => ingest_dense_with_policy(
                &DenseSource {
                    values,
                    rows: *rows,
                    columns: *columns,
                },
                plan,
            ),
            Self::Sparse {
                values,
                indices,
                offsets,
                layout,
                rows,
                columns,
            } => ingest_sparse_with_policy(
                &SparseSource {
                    values,
                    minor: indices.as_slice(),
                    offsets: offsets.as_slice(),
                    layout: *layout,
                    rows: *rows,
                    columns: *columns,
                },
                plan,
            ),
        }
    }
}

/// Every matrix in group `name` whose shape is `shape`, ingested with `plan`.
/// Entries of another shape or that cannot be read are skipped.
fn read_matrix_group(
    file: &File,
    name: &str,
    shape: (usize, usize),
    plan: &StoragePlan<'_>,
) -> Result<Vec<Layer>> {
    let Ok(group) = file.group(name) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for member in group.member_names().map_err(h5err)? {
        let stored = match StoredMatrix::read(&group, &member, shape.0, shape.1) {
            Ok(stored) => stored,
            Err(e) => {
                debug!(group = name, member = %member, error = %e, "unreadable matrix");
                continue;
            }
        };
        if stored.shape() != shape {
            warn!(
                group = name,
                member = %member,
                found = ?stored.shape(),
                expected = ?shape,
                "skipping matrix with a mismatched shape"
            );
            continue;
        }
        let matrix = stored.ingest(plan)?;
        out.push(Layer {
            name: format!("{name}/{member}"),
            matrix,
        });
    }
    Ok(out)
}

fn sparse_layout(group: &Group) -> Layout {
    let encoding = read_attr_string(group, "encoding-type")
        .or_else(|| read_attr_string(group, "h5sparse_format"))
        .unwrap_or_default();
    if encoding.starts_with("csc") {
        Layout::ColumnMajor
    } else {
        Layout::RowMajor
    }
}

fn sparse_shape(group: &Group) -> Result<Option<(usize, usize)>> {
    let Some(attr) = ["shape", "h5sparse_shape"]
        .into_iter()
        .find_map(|name| group.attr(name).ok())
    else {
        return Ok(None);
    };
    let shape = attr.read_raw::<i64>().map_err(h5err)?;
    match *shape.as_slice() {
        [rows, columns] if rows >= 0 && columns >= 0 => Ok(Some((rows as usize, columns as usize))),
        _ => Err(CellDenseError::Parse(format!("invalid sparse shape {shape:?}"))),
    }
}

/// Without a shape attribute the major extent comes from `indptr` and the
/// minor extent from the known count along that axis, or from the largest
/// index.
fn inferred_shape(
    layout: Layout,
    indices: &[i64],
    offsets: &[i64],
    row_count: usize,
    column_count: usize,
) -> (usize, usize) {
    let major = offsets.len().saturating_sub(1);
    let from_indices = || {
        indices
            .iter()
            .copied()
            .max()
            .map_or(0, |m| usize::try_from(m).map_or(0, |m| m + 1))
    };
    match layout {
        Layout::RowMajor if column_count > 0 => (major, column_count),
        Layout::RowMajor => (major, from_indices()),
        Layout::ColumnMajor if row_count > 0 => (row_count, major),
        Layout::ColumnMajor => (from_indices(), major),
    }
}

/// Index names of an `obs` / `var` dataframe: the dataset named by the
/// `_index` attribute, then `_index`, then `index`. A compound dataframe
/// uses its `index` (or `_index`) field. Empty if none exists.
fn read_index(file: &File, frame: &str) -> Result<Vec<String>> {
    if let Ok(ds) = file.dataset(frame) {
        return read_compound_index(&ds);
    }
    let Ok(group) = file.group(frame) else {
        return Ok(Vec::new());
    };
    let candidates = [index_name(&group), Some("_index".to_string()), Some("index".to_string())];
    for name in candidates.into_iter().flatten() {
        if let Ok(ds) = group.dataset(&name) {
            return read_strings(&ds);
        }
    }
    Ok(Vec::new())
}

fn index_name(group: &Group) -> Option<String> {
    read_attr_string(group, "_index")
}

fn read_compound_index(ds: &Dataset) -> Result<Vec<String>> {
    let Some(fields) = compound_fields(ds) else {
        return Ok(Vec::new());
    };
    for index in COMPOUND_INDEX_FIELDS {
        let Some((name, ty)) = fields.iter().find(|(name, _)| name == index) else {
            continue;
        };
        return Ok(match read_compound_field(ds, name, ty)? {
            Some(FieldValues::Strings(names)) => names,
            Some(FieldValues::Numbers(values)) => values.iter().map(|v| v.to_string()).collect(),
            None => Vec::new(),
        });
    }
    Ok(Vec::new())
}

/// Every readable column of a dataframe except its index.
fn read_columns(file: &File, frame: &str) -> Result<Vec<Annotation>> {
    if let Ok(ds) = file.dataset(frame) {
        return Ok(read_compound_columns(&ds, frame));
    }
    let Ok(group) = file.group(frame) else {
        return Ok(Vec::new());
    };
    let index = index_name(&group);
    let categories = group.group(CATEGORIES_GROUP).ok();
    let mut out = Vec::new();
    for name in group.member_names().map_err(h5err)? {
        let is_index = name == "_index" || name == "index" || Some(&name) == index.as_ref();
        if is_index || name == CATEGORIES_GROUP {
            continue;
        }
        match read_column(&group, &name, categories.as_ref()) {
            Ok(Some(annotation)) => out.push(annotation),
            Ok(None) => debug!(frame, column = %name, "skipping unsupported column"),
            Err(e) => debug!(frame, column = %name, error = %e, "unreadable column"),
        }
    }
    Ok(out)
}

/// Text fields are classified like labels, numeric fields kept as numbers.
fn read_compound_columns(ds: &Dataset, frame: &str) -> Vec<Annotation> {
    let Some(fields) = compound_fields(ds) else {
        debug!(frame, "dataframe dataset is not compound");
        return Vec::new();
    };
    let mut out = Vec::new();
    for (name, ty) in &fields {
        if COMPOUND_INDEX_FIELDS.contains(&name.as_str()) {
            continue;
        }
        match read_compound_field(ds, name, ty) {
            Ok(Some(FieldValues::Strings(labels))) => out.push(Annotation::from_labels(name.as_str(), &labels)),
            Ok(Some(FieldValues::Numbers(values))) => out.push(Annotation::numeric(name.as_str(), values)),
            Ok(None) => debug!(frame, column = %name, "skipping unsupported field"),
            Err(e) => debug!(frame, column = %name, error = %e, "unreadable field"),
        }
    }
    out
}

fn read_column(group: &Group, name: &str, categories: Option<&Group>) -> Result<Option<Annotation>> {
    if let Ok(coded) = group.group(name) {
        if !(coded.link_exists("categories") && coded.link_exists("codes")) {
            return Ok(None);
        }
        let labels = read_labels(&coded.dataset("categories").map_err(h5err)?)?;
        let codes = read_indices(&coded, "codes")?;
        return Annotation::from_codes(name, &codes, &labels).map(Some);
    }

    let ds = group.dataset(name).map_err(h5err)?;
    if is_string_dataset(&ds) {
        return Ok(Some(Annotation::from_labels(name, &read_strings(&ds)?)));
    }
    let legacy_categories = categories
        .filter(|c| ds.attr("categories").is_ok() && c.link_exists(name))
        .map(|c| c.dataset(name))
        .transpose()
        .map_err(h5err)?;
    if let Some(cats) = legacy_categories {
        let labels = read_labels(&cats)?;
        let codes = ds.read_raw::<i64>().map_err(h5err)?;
        return Annotation::from_codes(name, &codes, &labels).map(Some);
    }
    match ds.read_raw::<f64>() {
        Ok(values) => Ok(Some(Annotation::numeric(name, values))),
        Err(_) => Ok(None),
    }
}

/// Category labels, which may be stored as numbers.
fn read_labels(ds: &Dataset) -> Result<Vec<String>> {
    if is_string_dataset(ds) {
        return read_strings(ds);
    }
    Ok(ds
        .read_raw::<f64>()
        .map_err(h5err)?
        .into_iter()
        .map(|v| v.to_string())
        .collect())
}

/// Numeric 1-D or 2-D datasets under `obsm`, one row per sample.
fn read_embeddings(file: &File) -> Result<Vec<Embedding>> {
    let Ok(group) = file.group("obsm") else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for name in group.member_names().map_err(h5err)? {
        match read_embedding(&group, &name) {
            Ok(Some(embedding)) => out.push(embedding),
            Ok(None) => debug!(embedding = %name, "skipping obsm entry that is not a matrix"),
            Err(e) => debug!(embedding = %name, error = %e, "unreadable obsm entry"),
        }
    }
    Ok(out)
}

fn read_embedding(group: &Group, name: &str) -> Result<Option<Embedding>> {
    let Ok(ds) = group.dataset(name) else {
        return Ok(None);
    };
    let components = match *ds.shape().as_slice() {
        [_] => 1,
        [_, components] => components,
        _ => return Ok(None),
    };
    let values = ds.read_raw::<f64>().map_err(h5err)?;
    Embedding::new(name, components, values).map(Some)
}

/// Whether `path` looks like an AnnData file: an `X` member next to `obs`
/// or `var`.
pub fn is_h5ad(path: impl AsRef<Path>) -> bool {
    File::open(path.as_ref()).is_ok_and(|f| {
        f.link_exists("X") && (f.link_exists("obs") || f.link_exists("var"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use celldense_core::NoProgress;
    use celldense_matrix::{ElementType, StoragePolicy, Transform};
    use hdf5::types::{FixedAscii, VarLenUnicode};
    use hdf5::H5Type;
    use ndarray::{arr1, arr2, Array1};
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn vlu(s: &str) -> VarLenUnicode {
        VarLenUnicode::from_str(s).unwrap()
    }

    macro_rules! write_attr_str {
        ($loc:expr, $key:expr, $val:expr) => {{
            $loc.new_attr::<VarLenUnicode>()
                .create($key)
                .and_then(|attr| attr.write_scalar(&vlu($val)))
                .unwrap()
        }};
    }

    fn temp_path() -> (NamedTempFile, std::path::PathBuf) {
        let f = NamedTempFile::new().unwrap();
        let p = f.path().with_extension("h5ad");
        (f, p)
    }

    fn strings(items: &[&str]) -> Array1<VarLenUnicode> {
        items.iter().map(|s| vlu(s)).collect()
    }

    fn write_frames(file: &File) {
        let obs = file.create_group("obs").unwrap();
        write_attr_str!(obs, "_index", "cell_id");
        obs.new_dataset_builder()
            .with_data(&strings(&["c1", "c2"]))
            .create("cell_id")
            .unwrap();
        obs.new_dataset_builder()
            .with_data(&arr1(&[1500.0f64, 320.0]))
            .create("n_counts")
            .unwrap();
        let leiden = obs.create_group("leiden").unwrap();
        leiden
            .new_dataset_builder()
            .with_data(&strings(&["T", "NK"]))
            .create("categories")
            .unwrap();
        leiden
            .new_dataset_builder()
            .with_data(&arr1(&[1i8, -1]))
            .create("codes")
            .unwrap();

        let var = file.create_group("var").unwrap();
        var.new_dataset_builder()
            .with_data(&strings(&["g1", "g2", "g3"]))
            .create("_index")
            .unwrap();
        let feature_types = var
            .new_dataset_builder()
            .with_data(&arr1(&[0i32, 1, 0]))
            .create("feature_types")
            .unwrap();
        write_attr_str!(feature_types, "categories", "__categories/feature_types");
        var.create_group(CATEGORIES_GROUP)
            .unwrap()
            .new_dataset_builder()
            .with_data(&strings(&["Gene", "Peak"]))
            .create("feature_types")
            .unwrap();
        var.new_dataset_builder()
            .with_data(&arr1(&[0.5f64, 0.25, 0.125]))
            .create("dispersion")
            .unwrap();
    }

    fn write_csr(parent: &Group, name: &str, data: &[f32], indices: &[i32], indptr: &[i32], shape: Option<[i64; 2]>) {
        let g = parent.create_group(name).unwrap();
        g.new_dataset_builder().with_data(&arr1(data)).create("data").unwrap();
        g.new_dataset_builder().with_data(&arr1(indices)).create("indices").unwrap();
        g.new_dataset_builder().with_data(&arr1(indptr)).create("indptr").unwrap();
        write_attr_str!(g, "encoding-type", "csr_matrix");
        if let Some(shape) = shape {
            g.new_attr_builder().with_data(&arr1(&shape)).create("shape").unwrap();
        }
    }

    /// X = [1 2 0]
    ///     [0 3 4]
    fn write_sparse(path: &Path, csc: bool, with_shape: bool) {
        let file = File::create(path).unwrap();
        let shape = with_shape.then_some([2i64, 3]);
        if csc {
            let x = file.create_group("X").unwrap();
            x.new_dataset_builder().with_data(&arr1(&[1.0f32, 2.0, 3.0, 4.0])).create("data").unwrap();
            x.new_dataset_builder().with_data(&arr1(&[0i32, 0, 1, 1])).create("indices").unwrap();
            x.new_dataset_builder().with_data(&arr1(&[0i32, 1, 3, 4])).create("indptr").unwrap();
            write_attr_str!(x, "encoding-type", "csc_matrix");
            if let Some(shape) = shape {
                x.new_attr_builder().with_data(&arr1(&shape)).create("shape").unwrap();
            }
        } else {
            write_csr(&file, "X", &[1.0, 2.0, 3.0, 4.0], &[0, 1, 1, 2], &[0, 2, 4], shape);
        }
        write_frames(&file);
    }

    fn write_dense(path: &Path) {
        let file = File::create(path).unwrap();
        file.new_dataset_builder()
            .with_data(&arr2(&[[1.0f64, 2.0, 0.0], [0.0, 3.0, 4.0]]))
            .create("X")
            .unwrap();
        write_frames(&file);
    }

    fn assert_expected_matrix(ds: &LoadedDataset) {
        assert_eq!(ds.matrix().shape(), (2, 3));
        assert_eq!(ds.matrix().row_f64(0).unwrap(), vec![1.0, 2.0, 0.0]);
        assert_eq!(ds.matrix().row_f64(1).unwrap(), vec![0.0, 3.0, 4.0]);
        assert_eq!(ds.sample_names(), &["c1", "c2"]);
        assert_eq!(ds.dimension_names(), &["g1", "g2", "g3"]);
    }

    #[test]
    fn csr_x() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert_expected_matrix(&ds);
        assert_eq!(ds.matrix().element_type(), ElementType::UInt8);
    }

    #[test]
    fn csc_x_matches_csr_x() {
        let (_f, path) = temp_path();
        write_sparse(&path, true, true);
        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert_expected_matrix(&ds);
    }

    #[test]
    fn shape_is_inferred_without_attribute() {
        for csc in [false, true] {
            let (_f, path) = temp_path();
            write_sparse(&path, csc, false);
            let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
            assert_expected_matrix(&ds);
        }
    }

    #[test]
    fn dense_x() {
        let (_f, path) = temp_path();
        write_dense(&path);
        let opts = LoadOptions::default().with_storage(StoragePolicy::Original);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        assert_expected_matrix(&ds);
        assert_eq!(ds.matrix().element_type(), ElementType::Float32);
    }

    #[test]
    fn sqrt_transform_on_dense_x() {
        let (_f, path) = temp_path();
        write_dense(&path);
        let opts = LoadOptions::default()
            .with_storage(StoragePolicy::Original)
            .with_transform(Transform::Sqrt);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        assert_eq!(ds.matrix().get(1, 2), Some(2.0));
    }

    #[test]
    fn selection_filters_names_and_var_columns() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let opts = LoadOptions::default().with_dimension_mask(vec![true, false, true]);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        assert_eq!(ds.matrix().shape(), (2, 2));
        assert_eq!(ds.dimension_names(), &["g1", "g3"]);
        assert_eq!(ds.matrix().row_f64(1).unwrap(), vec![0.0, 4.0]);
        let dispersion = ds.dimension_annotation("dispersion").unwrap();
        assert_eq!(dispersion.len(), 2);
        assert_eq!(dispersion.label(1).as_deref(), Some("0.125"));
    }

    #[test]
    fn obs_columns_become_sample_annotations() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert!(ds.sample_annotation("cell_id").is_none());
        assert!(ds.sample_annotation("n_counts").unwrap().is_numeric());
        let leiden = ds.sample_annotation("leiden").unwrap();
        assert_eq!(leiden.label(0).as_deref(), Some("NK"));
        assert_eq!(leiden.label(1).as_deref(), Some(""));
        let types = ds.dimension_annotation("feature_types").unwrap();
        assert_eq!(types.label(1).as_deref(), Some("Peak"));
    }

    #[test]
    fn obsm_matrices_become_embeddings() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let file = File::open_rw(&path).unwrap();
        let obsm = file.create_group("obsm").unwrap();
        obsm.new_dataset_builder()
            .with_data(&arr2(&[[0.5f32, -1.0], [2.0, 3.5]]))
            .create("X_umap")
            .unwrap();
        obsm.new_dataset_builder()
            .with_data(&arr2(&[[1.0f64, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]))
            .create("X_wrong_rows")
            .unwrap();
        obsm.create_group("spatial_frame").unwrap();
        drop(file);

        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert_eq!(ds.sample_embeddings().len(), 1);
        let umap = ds.sample_embedding("X_umap").unwrap();
        assert_eq!(umap.components(), 2);
        assert_eq!(umap.row(1), Some(&[2.0, 3.5][..]));
        assert_eq!(umap.component(0).unwrap().label(0).as_deref(), Some("0.5"));

        let bare = read_h5ad(&path, &LoadOptions::default().with_metadata(false), &NoProgress).unwrap();
        assert!(bare.sample_embeddings().is_empty());
    }

    #[test]
    fn layers_follow_the_x_plan() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let file = File::open_rw(&path).unwrap();
        let layers = file.create_group("layers").unwrap();
        write_csr(&layers, "counts", &[10.0, 20.0, 30.0, 40.0], &[0, 1, 1, 2], &[0, 2, 4], None);
        write_csr(&layers, "narrow", &[1.0], &[0], &[0, 1, 1], Some([2, 2]));
        drop(file);

        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert!(ds.layers().is_empty());

        let opts = LoadOptions::default()
            .with_layers(true)
            .with_dimension_mask(vec![true, false, true]);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        assert_eq!(ds.layers().len(), 1);
        let counts = ds.layer("layers/counts").unwrap();
        assert_eq!(counts.shape(), (2, 2));
        assert_eq!(counts.element_type(), ElementType::UInt8);
        assert_eq!(counts.row_f64(0).unwrap(), vec![10.0, 0.0]);
        assert_eq!(counts.row_f64(1).unwrap(), vec![0.0, 40.0]);

        let opts = opts.with_storage(StoragePolicy::Original).with_transform(Transform::Sqrt);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        assert_eq!(ds.layer("layers/counts").unwrap().get(0, 0), Some(10f64.sqrt() as f32 as f64));
    }

    #[test]
    fn obsp_graphs_are_sample_by_sample_layers() {
        let (_f, path) = temp_path();
        write_sparse(&path, false, true);
        let file = File::open_rw(&path).unwrap();
        let obsp = file.create_group("obsp").unwrap();
        write_csr(&obsp, "distances", &[0.5], &[1], &[0, 1, 1], Some([2, 2]));
        drop(file);

        let opts = LoadOptions::default().with_transform(Transform::Log);
        let ds = read_h5ad(&path, &opts, &NoProgress).unwrap();
        let graph = ds.layer("obsp/distances").unwrap();
        assert_eq!(graph.shape(), (2, 2));
        assert_eq!(graph.get(0, 1), Some(0.5));
        assert_eq!(graph.get(1, 0), Some(0.0));
    }

    #[derive(H5Type, Clone)]
    #[repr(C)]
    struct ObsRecord {
        index: FixedAscii<8>,
        n_genes: i32,
        louvain: VarLenUnicode,
    }

    #[derive(H5Type, Clone)]
    #[repr(C)]
    struct VarRecord {
        index: VarLenUnicode,
        highly_variable: u8,
    }

    #[test]
    fn compound_dataframes() {
        let (_f, path) = temp_path();
        let file = File::create(&path).unwrap();
        file.new_dataset_builder()
            .with_data(&arr2(&[[1.0f64, 2.0, 0.0], [0.0, 3.0, 4.0]]))
            .create("X")
            .unwrap();
        let obs: Vec<ObsRecord> = [("c1", 1200, "T"), ("c2", 800, "B")]
            .into_iter()
            .map(|(id, n, cluster)| ObsRecord {
                index: FixedAscii::from_ascii(id).unwrap(),
                n_genes: n,
                louvain: vlu(cluster),
            })
            .collect();
        file.new_dataset_builder()
            .with_data(&Array1::from(obs))
            .create("obs")
            .unwrap();
        let var: Vec<VarRecord> = [("g1", 1), ("g2", 0), ("g3", 1)]
            .into_iter()
            .map(|(id, hv)| VarRecord { index: vlu(id), highly_variable: hv })
            .collect();
        file.new_dataset_builder()
            .with_data(&Array1::from(var))
            .create("var")
            .unwrap();
        drop(file);

        let ds = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap();
        assert_expected_matrix(&ds);
        assert!(ds.sample_annotation("index").is_none());
        let n_genes = ds.sample_annotation("n_genes").unwrap();
        assert!(n_genes.is_numeric());
        assert_eq!(n_genes.label(0).as_deref(), Some("1200"));
        let louvain = ds.sample_annotation("louvain").unwrap();
        assert!(!louvain.is_numeric());
        assert_eq!(louvain.label(1).as_deref(), Some("B"));
        let hv = ds.dimension_annotation("highly_variable").unwrap();
        assert_eq!(hv.label(1).as_deref(), Some("0"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let (_f, path) = temp_path();
        let err = read_h5ad(&path, &LoadOptions::default(), &NoProgress).unwrap_err();
        assert!(matches!(err, CellDenseError::Io(_)));
    }

    #[test]
    fn detects_anndata_layout() {
        let (_f, path) = temp_path();
        write_dense(&path);
        assert!(is_h5ad(&path));
        let (_g, other) = temp_path();
        File::create(&other).unwrap().create_group("data").unwrap();
        assert!(!is_h5ad(&other));
    }
}
