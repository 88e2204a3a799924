//! Per-sample and per-dimension annotations.

use std::collections::{BTreeMap, BTreeSet};

use celldense_core::{CellDenseError, Result};
use celldense_matrix::DimensionSelection;

/// The values of one annotation column.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnnotationValues {
    Numeric(Vec<f64>),
    /// `codes[i]` indexes `categories`.
    Categorical {
        categories: Vec<String>,
        codes: Vec<u32>,
    },
}

/// A named annotation column with one entry per sample (or per dimension).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    pub name: String,
    pub values: AnnotationValues,
}

impl Annotation {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: AnnotationValues::Numeric(values),
        }
    }

    /// Classify text labels: numeric when every label parses as a finite
    /// number, categorical otherwise. Categories are sorted.
    pub fn from_labels<S: AsRef<str>>(name: impl Into<String>, labels: &[S]) -> Self {
        let parsed: Option<Vec<f64>> = labels
            .iter()
            .map(|l| {
                l.as_ref()
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
            })
            .collect();
        match parsed {
            Some(values) if !labels.is_empty() => Self::numeric(name, values),
            _ => Self::categorical(name, labels),
        }
    }

    /// Categorical column from text labels, categories sorted.
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, labels: &[S]) -> Self {
        let categories: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let lookup: BTreeMap<&str, u32> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as u32))
            .collect();
        let codes = labels.iter().map(|l| lookup[l.as_ref()]).collect();
        Self {
            name: name.into(),
            values: AnnotationValues::Categorical { categories, codes },
        }
    }

    /// Categorical column from integer codes into `categories`. Negative
    /// codes mark missing values and map to an empty-string category.
    pub fn from_codes(
        name: impl Into<String>,
        codes: &[i64],
        categories: &[String],
    ) -> Result<Self> {
        let name = name.into();
        let mut categories = categories.to_vec();
        let mut missing: Option<u32> = None;
        let mut out = Vec::with_capacity(codes.len());
        for &code in codes {
            if code < 0 {
                let idx = *missing.get_or_insert_with(|| {
                    categories.push(String::new());
                    (categories.len() - 1) as u32
                });
                out.push(idx);
                continue;
            }
            let idx = code as usize;
            if idx >= categories.len() || Some(idx as u32) == missing {
                return Err(CellDenseError::InvalidInput(format!(
                    "annotation '{name}': code {code} has no category"
                )));
            }
            out.push(idx as u32);
        }
        Ok(Self {
            name,
            values: AnnotationValues::Categorical {
                categories,
                codes: out,
            },
        })
    }

    pub fn len(&self) -> usize {
        match &self.values {
            AnnotationValues::Numeric(v) => v.len(),
            AnnotationValues::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.values, AnnotationValues::Numeric(_))
    }

    /// Label of entry `i` (numbers are formatted).
    pub fn label(&self, i: usize) -> Option<String> {
        match &self.values {
            AnnotationValues::Numeric(v) => v.get(i).map(|x| x.to_string()),
            AnnotationValues::Categorical { categories, codes } => codes
                .get(i)
                .and_then(|&c| categories.get(c as usize))
                .cloned(),
        }
    }

    /// Entry indices per category, in category order. `None` for numeric
    /// columns. Entries whose code has no category are left out.
    pub fn groups(&self) -> Option<BTreeMap<&str, Vec<usize>>> {
        let AnnotationValues::Categorical { categories, codes } = &self.values else {
            return None;
        };
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, &c) in codes.iter().enumerate() {
            if let Some(category) = categories.get(c as usize) {
                groups.entry(category.as_str()).or_default().push(i);
            }
        }
        Some(groups)
    }

    /// New annotation holding only the selected entries.
    pub fn select(&self, selection: &DimensionSelection) -> Self {
        let values = match &self.values {
            AnnotationValues::Numeric(v) => AnnotationValues::Numeric(selection.filter(v)),
            AnnotationValues::Categorical { categories, codes } => AnnotationValues::Categorical {
                categories: categories.clone(),
                codes: selection.filter(codes),
            },
        };
        Self {
            name: self.name.clone(),
            values,
        }
    }
}

/// A per-sample matrix of `components` values per sample, such as a UMAP or
/// PCA embedding. Values are stored row-major.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Embedding {
    pub name: String,
    components: usize,
    values: Vec<f64>,
}

impl Embedding {
    pub fn new(name: impl Into<String>, components: usize, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let ragged = match components {
            0 => !values.is_empty(),
            c => values.len() % c != 0,
        };
        if ragged {
            return Err(CellDenseError::InvalidInput(format!(
                "embedding '{name}': {} values do not split into rows of {components}",
                values.len()
            )));
        }
        Ok(Self { name, components, values })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self.components {
            0 => 0,
            c => self.values.len() / c,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn row(&self, sample: usize) -> Option<&[f64]> {
        let start = sample.checked_mul(self.components)?;
        self.values.get(start..start + self.components)
    }

    /// One component across all samples, as a numeric annotation named
    /// `<name>_<component + 1>`.
    pub fn component(&self, component: usize) -> Option<Annotation> {
        if component >= self.components {
            return None;
        }
        let values = self
            .values
            .chunks_exact(self.components)
            .map(|row| row[component])
            .collect();
        Some(Annotation::numeric(
            format!("{}_{}", self.name, component + 1),
            values,
        ))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_labels() {
        let a = Annotation::from_labels("n_genes", &["12", " 4.5", "1e3"]);
        assert_eq!(a.values, AnnotationValues::Numeric(vec![12.0, 4.5, 1000.0]));
        assert!(a.is_numeric());
    }

    #[test]
    fn mixed_labels_are_categorical() {
        let a = Annotation::from_labels("cluster", &["T", "1", "B", "T"]);
        assert!(!a.is_numeric());
        assert_eq!(a.len(), 4);
        let groups = a.groups().unwrap();
        assert_eq!(groups["T"], vec![0, 3]);
        assert_eq!(groups["1"], vec![1]);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["1", "B", "T"]);
        assert_eq!(a.label(2).as_deref(), Some("B"));
    }

    #[test]
    fn non_finite_labels_are_categorical() {
        let a = Annotation::from_labels("x", &["1", "inf"]);
        assert!(!a.is_numeric());
        let empty: [&str; 0] = [];
        assert!(!Annotation::from_labels("e", &empty).is_numeric());
    }

    #[test]
    fn codes_with_missing_values() {
        let cats = vec!["A".to_string(), "B".to_string()];
        let a = Annotation::from_codes("leiden", &[1, -1, 0, -1], &cats).unwrap();
        assert_eq!(a.label(0).as_deref(), Some("B"));
        assert_eq!(a.label(1).as_deref(), Some(""));
        assert_eq!(a.groups().unwrap()[""], vec![1, 3]);
        assert!(Annotation::from_codes("bad", &[2], &cats).is_err());
    }

    #[test]
    fn hand_built_codes_out_of_range_are_skipped() {
        let a = Annotation {
            name: "cluster".into(),
            values: AnnotationValues::Categorical {
                categories: vec!["A".into()],
                codes: vec![0, 7, 0],
            },
        };
        let groups = a.groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["A"], vec![0, 2]);
        assert_eq!(a.label(1), None);
    }

    #[test]
    fn embedding_rows_and_components() {
        let e = Embedding::new("X_umap", 2, vec![0.5, 1.5, -2.0, 3.0, 4.0, 0.0]).unwrap();
        assert_eq!(e.len(), 3);
        assert_eq!(e.row(1), Some(&[-2.0, 3.0][..]));
        assert_eq!(e.row(3), None);
        let second = e.component(1).unwrap();
        assert_eq!(second.name, "X_umap_2");
        assert_eq!(second.values, AnnotationValues::Numeric(vec![1.5, 3.0, 0.0]));
        assert!(e.component(2).is_none());
        assert!(Embedding::new("bad", 2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Embedding::new("empty", 0, vec![]).unwrap().is_empty());
    }

    #[test]
    fn selection_filters_entries() {
        let a = Annotation::from_labels("kind", &["x", "y", "x"]);
        let sel = DimensionSelection::from_mask(&[false, true, true]);
        let s = a.select(&sel);
        assert_eq!(s.len(), 2);
        assert_eq!(s.label(0).as_deref(), Some("y"));
        assert_eq!(a.len(), 3);
    }
}
