//! Tabular data: datasets, feature/target split, dense matrices
//!
//! A [`Dataset`] wraps a single Arrow [`RecordBatch`] and keeps every column
//! it was loaded with. Numeric extraction happens on demand, column by
//! column, so the feature frame handed to a pipeline can still carry
//! columns the pipeline ignores.

mod matrix;

pub use matrix::DenseMatrix;

use crate::{Error, Result};
use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use std::collections::BTreeSet;

/// Default regression target for the fuel-efficiency dataset
pub const TARGET_COLUMN: &str = "mpg";

/// Numeric features fed to the model, in model column order
pub const NUMERIC_FEATURES: [&str; 8] =
    ["cyl", "disp", "hp", "wt", "acc", "yr", "origin", "car_type"];

/// In-memory table backed by one Arrow record batch
#[derive(Debug, Clone)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch
    #[must_use]
    pub const fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenate reader output into a single batch
    ///
    /// # Errors
    ///
    /// Returns error if the batches do not share `schema`
    pub fn from_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        let batch = arrow::compute::concat_batches(schema, batches)?;
        Ok(Self { batch })
    }

    /// Underlying record batch
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Table schema
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether a column with this name exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().column_with_name(name).is_some()
    }

    /// Read a column as `f64`, casting integer and decimal types.
    ///
    /// # Errors
    ///
    /// - [`Error::SchemaMismatch`] if the column is absent
    /// - [`Error::MalformedInput`] if any value is missing, not numeric, NaN
    ///   or infinite
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("missing column '{name}'")))?;

        let cast = arrow::compute::cast(column, &DataType::Float64).map_err(|e| {
            Error::MalformedInput(format!(
                "column '{name}' of type {} is not numeric: {e}",
                column.data_type()
            ))
        })?;

        let values = cast.as_primitive::<Float64Type>();
        if values.null_count() > 0 {
            return Err(Error::MalformedInput(format!(
                "column '{name}' has {} missing or non-numeric values",
                values.null_count()
            )));
        }

        if let Some(row) = values.values().iter().position(|v| !v.is_finite()) {
            return Err(Error::MalformedInput(format!(
                "column '{name}' has non-finite value {} at row {row}",
                values.value(row)
            )));
        }

        Ok(values.values().to_vec())
    }

    /// Copy of this dataset without the named column
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the column is absent
    pub fn drop_column(&self, name: &str) -> Result<Self> {
        let schema = self.batch.schema();
        let (drop_idx, _) = schema
            .column_with_name(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("missing column '{name}'")))?;

        let keep: Vec<usize> = (0..self.batch.num_columns())
            .filter(|&i| i != drop_idx)
            .collect();
        Ok(Self::new(self.batch.project(&keep)?))
    }

    /// Check that every listed column is present
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] naming all absent columns
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.has_column(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch(format!(
                "missing columns: {}",
                missing.join(", ")
            )))
        }
    }

    /// Gather the listed columns into a row-major matrix, in list order
    ///
    /// # Errors
    ///
    /// Propagates [`Dataset::column_f64`] errors
    pub fn select_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<DenseMatrix> {
        self.require_columns(names)?;
        let columns = names
            .iter()
            .map(|name| self.column_f64(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(DenseMatrix::from_columns(self.num_rows(), &columns))
    }
}

/// Split a dataset into the feature frame and the target vector.
///
/// The feature frame keeps every column except `target`; the target vector
/// holds the target column in row order.
///
/// # Errors
///
/// - [`Error::SchemaMismatch`] if `target` is absent
/// - [`Error::MalformedInput`] if the target has missing, non-numeric or
///   non-finite values
pub fn split_features_target(dataset: &Dataset, target: &str) -> Result<(Dataset, Vec<f64>)> {
    let y = dataset.column_f64(target)?;
    let features = dataset.drop_column(target)?;
    Ok((features, y))
}

/// Check that the training and test tables can go through the same pipeline.
///
/// Both must hold `target` and every column of `features`, and both must
/// have the same set of column names.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] naming the split and the offending columns.
pub fn require_matching_columns<S: AsRef<str>>(
    train: &Dataset,
    test: &Dataset,
    target: &str,
    features: &[S],
) -> Result<()> {
    for (split, dataset) in [("training", train), ("test", test)] {
        dataset
            .require_columns(&[target])
            .and_then(|()| dataset.require_columns(features))
            .map_err(|e| e.in_step(&format!("{split} data")))?;
    }

    let train_names: BTreeSet<String> = train.column_names().into_iter().collect();
    let test_names: BTreeSet<String> = test.column_names().into_iter().collect();
    if train_names == test_names {
        return Ok(());
    }

    let only = |a: &BTreeSet<String>, b: &BTreeSet<String>| {
        a.difference(b).cloned().collect::<Vec<_>>().join(", ")
    };
    Err(Error::SchemaMismatch(format!(
        "training and test columns differ (only in training: [{}]; only in test: [{}])",
        only(&train_names, &test_names),
        only(&test_names, &train_names)
    )))
}
