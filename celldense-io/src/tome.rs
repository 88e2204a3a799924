//! TOME transcriptomics files.
//!
//! Counts are stored twice as sparse matrices, once for exonic and once for
//! intronic reads, and the loaded matrix is their sum. Each part is a group
//! holding `dims`, `i` (minor indices), `p` (offsets) and `x` (values).
//! `data/t_exon` + `data/t_intron` are row-major over samples with `dims =
//! [genes, samples]`; `data/exon` + `data/intron` are column-major over genes
//! with `dims = [samples, genes]`. The row-major pair is used when present.
//!
//! Sample annotations live in `sample_meta/anno` as `<label>_color`
//! datasets, each paired with `<label>_label` (or `<label>`) values.

use std::path::Path;

use hdf5::{File, Group};
use tracing::{debug, info, warn};

use celldense_core::{CellDenseError, ProgressSink, Result};
use celldense_matrix::{
    apply_row_normalization_and_transform, ingest_column_major, ingest_row_major,
    narrow_dense_matrix, with_source_values, DenseMatrix, DimensionSelection, ElementType,
    IngestParams, Layout, SourceArray, SparseArrays, Transform, WriteMode,
};

use crate::dataset::LoadedDataset;
use crate::h5util::{h5err, is_string_dataset, open_file, read_indices, read_source_array, read_strings};
use crate::metadata::Annotation;
use crate::options::LoadOptions;

/// One of the exon / intron count matrices.
struct CountPart {
    layout: Layout,
    samples: usize,
    genes: usize,
    minor: Vec<i64>,
    offsets: Vec<i64>,
    values: SourceArray,
}

impl CountPart {
    fn read(data: &Group, name: &str, layout: Layout) -> Result<Self> {
        let group = data.group(name).map_err(h5err)?;
        let dims = read_indices(&group, "dims")?;
        let &[a, b] = dims.as_slice() else {
            return Err(CellDenseError::Parse(format!(
                "TOME part {name}: expected 2 dims, found {}",
                dims.len()
            )));
        };
        let (a, b) = (dim(a, name)?, dim(b, name)?);
        let (samples, genes) = match layout {
            Layout::RowMajor => (b, a),
            Layout::ColumnMajor => (a, b),
        };
        Ok(Self {
            layout,
            samples,
            genes,
            minor: read_indices(&group, "i")?,
            offsets: read_indices(&group, "p")?,
            values: read_source_array(&group.dataset("x").map_err(h5err)?)?,
        })
    }

    fn ingest_into(&self, dest: &mut DenseMatrix, params: &IngestParams<'_>) -> Result<()> {
        with_source_values!(&self.values, v => match self.layout {
            Layout::RowMajor => ingest_row_major(
                &SparseArrays::new(v, &self.minor, &self.offsets, self.samples, self.genes),
                params,
                dest,
            ),
            Layout::ColumnMajor => ingest_column_major(
                &SparseArrays::new(v, &self.minor, &self.offsets, self.genes, self.samples),
                params,
                dest,
            ),
        })
    }
}

fn dim(value: i64, part: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| CellDenseError::Parse(format!("TOME part {part}: negative dimension {value}")))
}

/// Read a TOME file into a dense samples × genes matrix of exon plus intron
/// counts.
pub fn read_tome(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let file = open_file(path)?;
    let data = file.group("data").map_err(h5err)?;

    let (exon, intron) = if data.link_exists("t_exon") && data.link_exists("t_intron") {
        ("t_exon", "t_intron")
    } else if data.link_exists("exon") && data.link_exists("intron") {
        ("exon", "intron")
    } else {
        return Err(CellDenseError::Parse(format!(
            "{}: no exon/intron count matrices",
            path.display()
        )));
    };
    let layout = if exon.starts_with("t_") {
        Layout::RowMajor
    } else {
        Layout::ColumnMajor
    };
    debug!(exon, intron, ?layout, "reading TOME count matrices");

    let exon = CountPart::read(&data, exon, layout)?;
    let intron = CountPart::read(&data, intron, layout)?;
    if (intron.samples, intron.genes) != (exon.samples, exon.genes) {
        return Err(CellDenseError::ShapeMismatch {
            what: "intron matrix",
            expected: exon.samples * exon.genes,
            actual: intron.samples * intron.genes,
        });
    }

    let selection = options.selection(exon.genes)?;
    let columns = selection
        .as_ref()
        .map_or(exon.genes, DimensionSelection::selected_count);
    let mut matrix = DenseMatrix::zeroed(ElementType::Float32, exon.samples, columns);
    let params = IngestParams::new(Transform::None)
        .remap(selection.as_ref())
        .progress(progress);
    exon.ingest_into(&mut matrix, &params)?;
    intron.ingest_into(&mut matrix, &params.mode(WriteMode::Accumulate))?;
    drop((exon, intron));

    apply_row_normalization_and_transform(&mut matrix, options.transform, options.normalize_cpm);
    let matrix = narrow_dense_matrix(matrix, options.storage);

    let genes = read_root_strings(&file, "gene_names")?;
    let genes = match &selection {
        Some(s) if genes.len() == s.source_count() => s.filter(&genes),
        _ => genes,
    };
    let samples = read_root_strings(&file, "sample_names")?;
    let mut dataset = LoadedDataset::new(matrix, genes, samples)?;

    if options.load_metadata && file.link_exists("sample_meta") {
        let meta = file.group("sample_meta").map_err(h5err)?;
        if meta.link_exists("anno") {
            let anno = meta.group("anno").map_err(h5err)?;
            for annotation in read_annotations(&anno)? {
                dataset.attach_sample_annotation(annotation);
            }
        }
    }

    info!(
        path = %path.display(),
        samples = dataset.n_samples(),
        dimensions = dataset.n_dimensions(),
        storage = %dataset.matrix().element_type(),
        "loaded TOME matrix"
    );
    Ok(dataset)
}

fn read_root_strings(file: &File, name: &str) -> Result<Vec<String>> {
    if !file.link_exists(name) {
        return Ok(Vec::new());
    }
    read_strings(&file.dataset(name).map_err(h5err)?)
}

/// Every `<label>_color` dataset names one annotation.
fn read_annotations(anno: &Group) -> Result<Vec<Annotation>> {
    let mut out = Vec::new();
    for member in anno.member_names().map_err(h5err)? {
        let Some(label) = member.strip_suffix("_color") else {
            continue;
        };
        let values_name = [format!("{label}_label"), label.to_string()]
            .into_iter()
            .find(|n| anno.link_exists(n));
        let Some(values_name) = values_name else {
            warn!(annotation = label, "TOME annotation has colours but no values");
            continue;
        };
        let ds = anno.dataset(&values_name).map_err(h5err)?;
        let annotation = if is_string_dataset(&ds) {
            Annotation::from_labels(label, &read_strings(&ds)?)
        } else {
            Annotation::numeric(label, ds.read_raw::<f64>().map_err(h5err)?)
        };
        out.push(annotation);
    }
    Ok(out)
}
