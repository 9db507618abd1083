//! Loading trial datasets from `.mat` files and deriving their features.
//!
//! A dataset file holds one variable `data`: a 1×1 struct whose field `X` is
//! the observations × samples matrix and whose field `Y` is the label vector.

use std::path::{Path, PathBuf};

use ndarray::Array2;

use decoding_core::{derive_features, Label, Measure, MeasureError};

use crate::config::Condition;
use crate::matfile::{read_mat, MatError, MatFile, MatValue, NumericArray, StructArray};

const DATA_VAR: &str = "data";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("failed to read {path}: {source}")]
    Mat {
        path: PathBuf,
        #[source]
        source: MatError,
    },

    #[error("MAT-file has no variable '{0}'")]
    MissingVariable(String),

    #[error("variable '{name}' is a {found}, expected a struct")]
    NotAStruct { name: String, found: &'static str },

    #[error("struct '{name}' has dimensions {dims:?}, expected 1x1")]
    NotScalarStruct { name: String, dims: Vec<usize> },

    #[error("struct '{0}' has no field '{1}'")]
    MissingField(String, &'static str),

    #[error("field '{field}' is a {found}, expected a numeric array")]
    NotNumeric { field: &'static str, found: &'static str },

    #[error("field 'X' has dimensions {0:?}, expected a 2-D matrix")]
    NotAMatrix(Vec<usize>),

    #[error("field 'Y' has dimensions {0:?}, expected a vector")]
    NotAVector(Vec<usize>),

    #[error("label {value} at position {index} is not an integer")]
    NonIntegralLabel { index: usize, value: f64 },

    #[error("field 'X' contains a non-finite value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },

    #[error("X has {rows} rows but Y has {labels} labels")]
    RowMismatch { rows: usize, labels: usize },

    #[error("dataset has no observations")]
    Empty,

    #[error(transparent)]
    Measure(#[from] MeasureError),
}

/// Observations × samples matrix and one label per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Vec<Label>,
}

impl Dataset {
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.x.ncols()
    }

    /// Class labels in ascending order with their counts.
    pub fn class_counts(&self) -> Vec<(Label, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for &label in &self.y {
            *counts.entry(label).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }

    /// The dataset in the layout [`load_dataset`] reads.
    pub fn to_mat_file(&self) -> MatFile {
        let y: Vec<f64> = self.y.iter().map(|&l| l as f64).collect();
        let mut file = MatFile::new();
        file.push(
            DATA_VAR,
            MatValue::Struct(StructArray::scalar(vec![
                ("X".to_string(), MatValue::Numeric(NumericArray::from_array2(&self.x))),
                ("Y".to_string(), MatValue::Numeric(NumericArray::column(y))),
            ])),
        );
        file
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::MissingInput(path.to_path_buf()));
    }
    let file = read_mat(path).map_err(|source| DatasetError::Mat {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = dataset_from_mat(&file)?;
    log::info!(
        "Loaded {}: {} observations x {} samples, classes {:?}",
        path.display(),
        dataset.n_obs(),
        dataset.n_samples(),
        dataset.class_counts()
    );
    Ok(dataset)
}

pub fn dataset_from_mat(file: &MatFile) -> Result<Dataset, DatasetError> {
    let value = file
        .get(DATA_VAR)
        .ok_or_else(|| DatasetError::MissingVariable(DATA_VAR.to_string()))?;
    let data = value.as_struct().ok_or_else(|| DatasetError::NotAStruct {
        name: DATA_VAR.to_string(),
        found: value.kind(),
    })?;
    if !data.is_scalar() {
        return Err(DatasetError::NotScalarStruct {
            name: DATA_VAR.to_string(),
            dims: data.dims.clone(),
        });
    }

    let x_field = numeric_field(data, "X")?;
    let x = x_field
        .to_array2()
        .ok_or_else(|| DatasetError::NotAMatrix(x_field.dims.clone()))?;
    if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(DatasetError::NonFinite { row, col });
    }

    let y_field = numeric_field(data, "Y")?;
    if !y_field.is_vector() {
        return Err(DatasetError::NotAVector(y_field.dims.clone()));
    }
    let y = y_field
        .data
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if value.fract() != 0.0 || !value.is_finite() {
                Err(DatasetError::NonIntegralLabel { index, value })
            } else {
                Ok(value as Label)
            }
        })
        .collect::<Result<Vec<Label>, _>>()?;

    if x.nrows() != y.len() {
        return Err(DatasetError::RowMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(Dataset { x, y })
}

fn numeric_field<'a>(data: &'a StructArray, name: &'static str) -> Result<&'a NumericArray, DatasetError> {
    let value = data
        .field(0, name)
        .ok_or_else(|| DatasetError::MissingField(DATA_VAR.to_string(), name))?;
    value.as_numeric().ok_or(DatasetError::NotNumeric {
        field: name,
        found: value.kind(),
    })
}

/// Feature matrix for the classifier. Distractor-difference data already holds
/// MAD values and is used unchanged.
pub fn derive_dataset_features(
    dataset: &Dataset,
    condition: Condition,
    measure: Measure,
) -> Result<Array2<f64>, DatasetError> {
    if condition == Condition::DistractorDiff {
        log::info!("Using precomputed features ({} columns)", dataset.n_samples());
        return Ok(dataset.x.clone());
    }
    let features = derive_features(&dataset.x, measure)?;
    log::info!(
        "Derived {} feature(s) per observation with {}",
        features.ncols(),
        measure
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matfile::write_mat;
    use ndarray::array;

    fn sample() -> Dataset {
        Dataset {
            x: array![[1.0, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0], [5.0, 1.0, 5.0, 1.0]],
            y: vec![0, 1, 0],
        }
    }

    #[test]
    fn test_load_written_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("XY_hit.mat");
        let ds = sample();
        write_mat(&path, &ds.to_mat_file(), true).unwrap();
        assert_eq!(load_dataset(&path).unwrap(), ds);
        assert_eq!(ds.class_counts(), vec![(0, 2), (1, 1)]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(&dir.path().join("nope.mat")).unwrap_err();
        assert!(matches!(err, DatasetError::MissingInput(_)));
    }

    #[test]
    fn test_row_label_mismatch() {
        let mut file = sample().to_mat_file();
        file.variables[0].1 = MatValue::Struct(StructArray::scalar(vec![
            ("X".into(), MatValue::Numeric(NumericArray::from_array2(&sample().x))),
            ("Y".into(), MatValue::Numeric(NumericArray::row(vec![0.0, 1.0]))),
        ]));
        assert!(matches!(
            dataset_from_mat(&file),
            Err(DatasetError::RowMismatch { rows: 3, labels: 2 })
        ));
    }

    #[test]
    fn test_structural_errors_name_the_problem() {
        let mut file = MatFile::new();
        file.push("other", MatValue::Char("x".into()));
        assert!(matches!(dataset_from_mat(&file), Err(DatasetError::MissingVariable(_))));

        let mut file = MatFile::new();
        file.push("data", MatValue::Char("x".into()));
        assert!(matches!(dataset_from_mat(&file), Err(DatasetError::NotAStruct { .. })));

        let mut file = MatFile::new();
        file.push(
            "data",
            MatValue::Struct(StructArray::scalar(vec![(
                "X".into(),
                MatValue::Numeric(NumericArray::scalar(1.0)),
            )])),
        );
        assert!(matches!(dataset_from_mat(&file), Err(DatasetError::MissingField(_, "Y"))));
    }

    #[test]
    fn test_non_integral_label() {
        let mut file = MatFile::new();
        file.push(
            "data",
            MatValue::Struct(StructArray::scalar(vec![
                ("X".into(), MatValue::Numeric(NumericArray::new(vec![2, 1], vec![1.0, 2.0]))),
                ("Y".into(), MatValue::Numeric(NumericArray::row(vec![0.0, 0.5]))),
            ])),
        );
        assert!(matches!(
            dataset_from_mat(&file),
            Err(DatasetError::NonIntegralLabel { index: 1, .. })
        ));
    }

    #[test]
    fn test_features_per_condition() {
        let ds = sample();
        let mad = derive_dataset_features(&ds, Condition::Standard, Measure::Mad).unwrap();
        assert_eq!(mad.dim(), (3, 1));
        assert_eq!(mad[[1, 0]], 0.0);
        let all = derive_dataset_features(&ds, Condition::Alternate, Measure::Mads).unwrap();
        assert_eq!(all.dim(), (3, 3));
        let raw = derive_dataset_features(&ds, Condition::DistractorDiff, Measure::Mad).unwrap();
        assert_eq!(raw, ds.x);
    }
}
