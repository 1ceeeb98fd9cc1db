//! Storage backend (Arrow CSV / Parquet)
//!
//! Input datasets arrive as directories holding a single data file. CSV is
//! the default format; files with a `.parquet` extension go through the
//! Parquet reader. Both end up as Arrow record batches inside a [`Dataset`].

use crate::data::Dataset;
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float64Array, RecordBatch};
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use std::fs::{self, File};
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows sampled when inferring CSV column types
pub const INFER_SCHEMA_MAX_RECORDS: usize = 1000;

/// Column header for ground-truth values in the predictions table
pub const ACTUAL_COLUMN: &str = "Actual";

/// Column header for model outputs in the predictions table
pub const PREDICTED_COLUMN: &str = "Predicted";

/// Return the first data file listed in `dir`.
///
/// Upstream jobs hand over a folder that is expected to hold exactly one
/// file. Hidden entries and subdirectories are skipped. When several files
/// are present the first one in listing order wins, which depends on the
/// platform; a warning is emitted in that case.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the directory cannot be read or
/// contains no data file.
pub fn select_single_file<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::ResourceNotFound(format!("cannot read directory {}: {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || entry.file_type()?.is_dir() {
            continue;
        }
        files.push(entry.path());
    }

    if files.len() > 1 {
        warn!(
            dir = %dir.display(),
            count = files.len(),
            "directory holds more than one file, using the first listed"
        );
    }

    files.into_iter().next().ok_or_else(|| {
        Error::ResourceNotFound(format!("no data file in directory {}", dir.display()))
    })
}

/// Load a dataset from a single CSV or Parquet file.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the file cannot be decoded as a table.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

    let dataset = if is_parquet {
        load_parquet(path)?
    } else {
        load_csv(path)?
    };

    debug!(
        path = %path.display(),
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Select the single file in `dir` and load it.
///
/// # Errors
///
/// Propagates errors from [`select_single_file`] and [`load_dataset`].
pub fn load_dataset_dir<P: AsRef<Path>>(dir: P) -> Result<Dataset> {
    load_dataset(select_single_file(dir)?)
}

fn load_csv(path: &Path) -> Result<Dataset> {
    use arrow::csv::ReaderBuilder;

    let mut file = File::open(path)
        .map_err(|e| Error::MalformedInput(format!("Failed to open CSV file: {e}")))?;

    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(INFER_SCHEMA_MAX_RECORDS))
        .map_err(|e| Error::MalformedInput(format!("Failed to infer CSV schema: {e}")))?;

    if schema.fields().is_empty() {
        return Err(Error::MalformedInput(format!(
            "CSV file {} has no header row",
            path.display()
        )));
    }

    file.rewind()?;
    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)
        .map_err(|e| Error::MalformedInput(format!("Failed to create CSV reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::MalformedInput(format!("Failed to read CSV rows: {e}")))?;
        batches.push(batch);
    }

    Dataset::from_batches(&schema, &batches)
}

fn load_parquet(path: &Path) -> Result<Dataset> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path)
        .map_err(|e| Error::MalformedInput(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::MalformedInput(format!("Failed to parse Parquet file: {e}")))?;
    let schema = Arc::clone(builder.schema());

    let reader = builder
        .build()
        .map_err(|e| Error::MalformedInput(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::MalformedInput(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }

    Dataset::from_batches(&schema, &batches)
}

/// Build the two-column `Actual`/`Predicted` table, one row per test example.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the two columns differ in length.
pub fn predictions_batch(actual: &[f64], predicted: &[f64]) -> Result<RecordBatch> {
    if actual.len() != predicted.len() {
        return Err(Error::InvalidInput(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }

    let schema = Schema::new(vec![
        Field::new(ACTUAL_COLUMN, DataType::Float64, false),
        Field::new(PREDICTED_COLUMN, DataType::Float64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(actual.to_vec())),
        Arc::new(Float64Array::from(predicted.to_vec())),
    ];

    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Write the predictions table as CSV (header row, no index column).
///
/// # Errors
///
/// Returns error if the file cannot be created or the batch cannot be encoded.
pub fn write_predictions<P: AsRef<Path>>(
    path: P,
    actual: &[f64],
    predicted: &[f64],
) -> Result<()> {
    use arrow::csv::WriterBuilder;

    let batch = predictions_batch(actual, predicted)?;
    let file = File::create(path.as_ref())?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CARS_CSV: &str = "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type\n\
                            18,8,307,130,3504,12,70,1,0\n\
                            15,8,350,165,3693,11.5,70,1,0\n";

    #[test]
    fn test_select_single_file_returns_only_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, CARS_CSV).unwrap();

        assert_eq!(select_single_file(dir.path()).unwrap(), path);
    }

    #[test]
    fn test_select_single_file_empty_dir() {
        let dir = TempDir::new().unwrap();

        let result = select_single_file(dir.path());
        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
    }

    #[test]
    fn test_select_single_file_missing_dir() {
        let dir = TempDir::new().unwrap();

        let result = select_single_file(dir.path().join("absent"));
        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
    }

    #[test]
    fn test_select_single_file_skips_hidden_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".lock"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, CARS_CSV).unwrap();

        assert_eq!(select_single_file(dir.path()).unwrap(), path);
    }

    #[test]
    fn test_load_csv_infers_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cars.csv");
        fs::write(&path, CARS_CSV).unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.num_columns(), 9);
        assert_eq!(dataset.column_f64("acc").unwrap(), vec![12.0, 11.5]);
    }

    #[test]
    fn test_load_empty_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        assert!(matches!(load_dataset(&path), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_load_ragged_csv_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "a,b\n1,2\n3,4,5\n").unwrap();

        assert!(matches!(load_dataset(&path), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_load_parquet_roundtrip_through_arrow_writer() {
        use parquet::arrow::ArrowWriter;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cars.parquet");
        let batch = predictions_batch(&[18.0, 15.0], &[17.5, 15.5]).unwrap();

        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.column_f64(PREDICTED_COLUMN).unwrap(), vec![17.5, 15.5]);
    }

    #[test]
    fn test_write_predictions_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.csv");

        write_predictions(&path, &[18.0, 15.0], &[17.0, 16.0]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Actual,Predicted"));
        assert_eq!(lines.count(), 2);

        let reloaded = load_dataset(&path).unwrap();
        assert_eq!(reloaded.column_f64(ACTUAL_COLUMN).unwrap(), vec![18.0, 15.0]);
        assert_eq!(reloaded.column_f64(PREDICTED_COLUMN).unwrap(), vec![17.0, 16.0]);
    }

    #[test]
    fn test_predictions_batch_length_mismatch() {
        let result = predictions_batch(&[1.0, 2.0], &[1.0]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
