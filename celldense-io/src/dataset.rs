//! The value a loader hands to the dataset store.

use tracing::warn;

use celldense_core::{CellDenseError, Result, Summarizable};
use celldense_matrix::DenseMatrix;

use crate::metadata::{Annotation, Embedding};

/// An additional matrix over the same samples, such as an AnnData layer
/// (samples × dimensions) or a sample graph (samples × samples).
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Path of the matrix inside the file, e.g. `layers/spliced`.
    pub name: String,
    pub matrix: DenseMatrix,
}

/// A populated dense matrix with its names and annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    matrix: DenseMatrix,
    dimension_names: Vec<String>,
    sample_names: Vec<String>,
    sample_annotations: Vec<Annotation>,
    dimension_annotations: Vec<Annotation>,
    sample_embeddings: Vec<Embedding>,
    layers: Vec<Layer>,
}

impl LoadedDataset {
    /// Validates that the name lists match the matrix shape. Empty name
    /// lists are replaced by `0..n` indices.
    pub fn new(
        matrix: DenseMatrix,
        dimension_names: Vec<String>,
        sample_names: Vec<String>,
    ) -> Result<Self> {
        let (rows, columns) = matrix.shape();
        let dimension_names = names_or_indices(dimension_names, columns, "dimension names")?;
        let sample_names = names_or_indices(sample_names, rows, "sample names")?;
        Ok(Self {
            matrix,
            dimension_names,
            sample_names,
            sample_annotations: Vec::new(),
            dimension_annotations: Vec::new(),
            sample_embeddings: Vec::new(),
            layers: Vec::new(),
        })
    }

    pub fn matrix(&self) -> &DenseMatrix {
        &self.matrix
    }

    pub fn into_matrix(self) -> DenseMatrix {
        self.matrix
    }

    pub fn dimension_names(&self) -> &[String] {
        &self.dimension_names
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.rows()
    }

    pub fn n_dimensions(&self) -> usize {
        self.matrix.columns()
    }

    pub fn sample_annotations(&self) -> &[Annotation] {
        &self.sample_annotations
    }

    pub fn dimension_annotations(&self) -> &[Annotation] {
        &self.dimension_annotations
    }

    pub fn sample_annotation(&self, name: &str) -> Option<&Annotation> {
        self.sample_annotations.iter().find(|a| a.name == name)
    }

    pub fn dimension_annotation(&self, name: &str) -> Option<&Annotation> {
        self.dimension_annotations.iter().find(|a| a.name == name)
    }

    pub fn sample_embeddings(&self) -> &[Embedding] {
        &self.sample_embeddings
    }

    pub fn sample_embedding(&self, name: &str) -> Option<&Embedding> {
        self.sample_embeddings.iter().find(|e| e.name == name)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&DenseMatrix> {
        self.layers.iter().find(|l| l.name == name).map(|l| &l.matrix)
    }

    /// Attach a per-sample annotation; its length must equal the sample count.
    pub fn add_sample_annotation(&mut self, annotation: Annotation) -> Result<()> {
        check_len(&annotation, self.n_samples())?;
        self.sample_annotations.push(annotation);
        Ok(())
    }

    /// Attach a per-dimension annotation; its length must equal the
    /// dimension count.
    pub fn add_dimension_annotation(&mut self, annotation: Annotation) -> Result<()> {
        check_len(&annotation, self.n_dimensions())?;
        self.dimension_annotations.push(annotation);
        Ok(())
    }

    /// Attach an embedding with one row per sample.
    pub fn add_sample_embedding(&mut self, embedding: Embedding) -> Result<()> {
        if embedding.len() != self.n_samples() {
            return Err(CellDenseError::ShapeMismatch {
                what: "embedding",
                expected: self.n_samples(),
                actual: embedding.len(),
            });
        }
        self.sample_embeddings.push(embedding);
        Ok(())
    }

    /// Attach an additional matrix with one row per sample.
    pub fn add_layer(&mut self, layer: Layer) -> Result<()> {
        if layer.matrix.rows() != self.n_samples() {
            return Err(CellDenseError::ShapeMismatch {
                what: "layer",
                expected: self.n_samples(),
                actual: layer.matrix.rows(),
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Like [`add_sample_annotation`](Self::add_sample_annotation), but a
    /// mismatching column is logged and skipped.
    #[cfg_attr(not(feature = "h5"), allow(dead_code))]
    pub(crate) fn attach_sample_annotation(&mut self, annotation: Annotation) {
        let name = annotation.name.clone();
        if let Err(e) = self.add_sample_annotation(annotation) {
            warn!(annotation = %name, error = %e, "skipping sample annotation");
        }
    }

    #[cfg_attr(not(feature = "h5"), allow(dead_code))]
    pub(crate) fn attach_dimension_annotation(&mut self, annotation: Annotation) {
        let name = annotation.name.clone();
        if let Err(e) = self.add_dimension_annotation(annotation) {
            warn!(annotation = %name, error = %e, "skipping dimension annotation");
        }
    }

    #[cfg_attr(not(feature = "h5"), allow(dead_code))]
    pub(crate) fn attach_sample_embedding(&mut self, embedding: Embedding) {
        let name = embedding.name.clone();
        if let Err(e) = self.add_sample_embedding(embedding) {
            warn!(embedding = %name, error = %e, "skipping embedding");
        }
    }

    #[cfg_attr(not(feature = "h5"), allow(dead_code))]
    pub(crate) fn attach_layer(&mut self, layer: Layer) {
        let name = layer.name.clone();
        if let Err(e) = self.add_layer(layer) {
            warn!(layer = %name, error = %e, "skipping layer");
        }
    }
}

impl Summarizable for LoadedDataset {
    fn summary(&self) -> String {
        format!(
            "LoadedDataset: {} samples \u{00d7} {} dimensions ({}), {} annotations, {} embeddings, {} layers",
            self.n_samples(),
            self.n_dimensions(),
            self.matrix.element_type(),
            self.sample_annotations.len() + self.dimension_annotations.len(),
            self.sample_embeddings.len(),
            self.layers.len()
        )
    }
}

fn names_or_indices(names: Vec<String>, expected: usize, what: &'static str) -> Result<Vec<String>> {
    if names.is_empty() {
        return Ok((0..expected).map(|i| i.to_string()).collect());
    }
    if names.len() != expected {
        return Err(CellDenseError::ShapeMismatch {
            what,
            expected,
            actual: names.len(),
        });
    }
    Ok(names)
}

fn check_len(annotation: &Annotation, expected: usize) -> Result<()> {
    if annotation.len() != expected {
        return Err(CellDenseError::ShapeMismatch {
            what: "annotation",
            expected,
            actual: annotation.len(),
        });
    }
    Ok(())
}
