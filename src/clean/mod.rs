// src/clean/mod.rs

pub mod coerce;
pub mod date_parser;

use anyhow::{Context, Result};
use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::csv::WriterBuilder;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use std::{
    collections::HashSet,
    fs::{self, File},
    path::PathBuf,
    sync::Arc,
};
use tracing::{info, warn};

use crate::table::row_keys;
use coerce::coerce_columns;

/// Canonical name of the persisted cleaned table.
pub const CLEANED_FILE_NAME: &str = "MachineLearningRatingV3_cleaned.csv";

/// Brings a raw table to canonical, typed, deduplicated form and
/// persists it under `output_dir`.
pub struct Cleaner {
    output_dir: PathBuf,
}

impl Cleaner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path the cleaned table is written to.
    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join(CLEANED_FILE_NAME)
    }

    /// Clean `batch`: diagnostics, structural drops, type coercion,
    /// persistence. The returned table is valid even when the write fails.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn clean(&self, batch: RecordBatch) -> Result<RecordBatch> {
        if batch.num_rows() == 0 || batch.num_columns() == 0 {
            warn!("table is empty; nothing to clean");
            return Ok(batch);
        }

        log_diagnostics(&batch)?;

        let batch = drop_all_missing_rows(&batch).context("dropping all-missing rows")?;
        let batch = drop_all_missing_columns(&batch).context("dropping all-missing columns")?;
        let batch = drop_duplicate_rows(&batch).context("dropping duplicate rows")?;
        let cleaned = coerce_columns(&batch).context("coercing column types")?;

        info!(
            rows = cleaned.num_rows(),
            cols = cleaned.num_columns(),
            "structural cleanup + coercion done"
        );

        match self.persist(&cleaned) {
            Ok(path) => info!(path = %path.display(), "wrote cleaned table"),
            Err(err) => warn!(%err, "failed to persist cleaned table; in-memory result is still valid"),
        }

        Ok(cleaned)
    }

    fn persist(&self, batch: &RecordBatch) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output directory {:?}", self.output_dir))?;
        let path = self.cleaned_path();
        let file = File::create(&path)
            .with_context(|| format!("creating file {}", path.display()))?;

        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer
            .write(batch)
            .with_context(|| format!("writing cleaned table to {}", path.display()))?;

        Ok(path)
    }
}

/// Operator-visibility pass; computes and logs, retains nothing.
fn log_diagnostics(batch: &RecordBatch) -> Result<()> {
    let rows = batch.num_rows();
    let cols = batch.num_columns();
    info!(rows, cols, elements = rows * cols, "shape");

    for (idx, field) in batch.schema().fields().iter().enumerate() {
        let col = batch.column(idx);
        let rendered = crate::table::render_column(batch, field.name())?;
        let missing = rendered
            .iter()
            .filter(|v| crate::table::is_missing(v.as_deref()))
            .count();
        let unique: HashSet<&String> = rendered.iter().flatten().collect();
        info!(
            column = field.name().as_str(),
            dtype = %col.data_type(),
            missing,
            unique = unique.len(),
            "column profile"
        );
    }

    let keys = row_keys(batch)?;
    let distinct: HashSet<&String> = keys.iter().collect();
    info!(duplicates = keys.len() - distinct.len(), "duplicate rows");

    Ok(())
}

/// Per-row missing flags for column `idx` (null, or blank Utf8).
fn missing_mask_for(batch: &RecordBatch, idx: usize) -> Result<Vec<bool>> {
    use crate::table::{is_missing, render_column};

    let name = batch.schema().field(idx).name().clone();
    let rendered = render_column(batch, &name)?;
    Ok(rendered
        .iter()
        .map(|v| is_missing(v.as_deref()))
        .collect())
}

fn drop_all_missing_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut keep = vec![false; batch.num_rows()];
    for idx in 0..batch.num_columns() {
        let missing = missing_mask_for(batch, idx)?;
        for (row, m) in missing.iter().enumerate() {
            if !m {
                keep[row] = true;
            }
        }
    }

    let dropped = keep.iter().filter(|&&k| !k).count();
    if dropped > 0 {
        info!(dropped, "dropping all-missing rows");
    }
    filter_record_batch(batch, &BooleanArray::from(keep)).map_err(Into::into)
}

fn drop_all_missing_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (idx, field) in batch.schema().fields().iter().enumerate() {
        let missing = missing_mask_for(batch, idx)?;
        if missing.iter().all(|&m| m) {
            info!(column = field.name().as_str(), "dropping all-missing column");
            continue;
        }
        fields.push(field.as_ref().clone());
        columns.push(batch.column(idx).clone());
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}

fn drop_duplicate_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    let keys = row_keys(batch)?;
    let mut seen = HashSet::with_capacity(keys.len());
    let keep: Vec<bool> = keys.iter().map(|k| seen.insert(k.as_str())).collect();

    let dropped = keep.iter().filter(|&&k| !k).count();
    if dropped > 0 {
        info!(dropped, "dropping duplicate rows");
    }
    filter_record_batch(batch, &BooleanArray::from(keep)).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;
    use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use tempfile::TempDir;

    fn raw_batch(columns: Vec<(&str, Vec<Option<&str>>)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|(_, values)| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let cleaner = Cleaner::new(dir.path());
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Utf8, true)]));
        let empty = RecordBatch::new_empty(schema);
        let out = cleaner.clean(empty.clone()).unwrap();
        assert_eq!(out, empty);
    }

    #[test]
    fn drops_duplicates_and_all_missing_rows() {
        // two fully-duplicate rows plus one all-missing row → count down by 3
        let batch = raw_batch(vec![
            (
                "PolicyID",
                vec![Some("1"), Some("1"), Some("1"), Some("2"), None],
            ),
            (
                "TotalPremium",
                vec![Some("10.0"), Some("10.0"), Some("10.0"), Some("20.0"), Some("")],
            ),
            (
                "TotalClaims",
                vec![Some("0.0"), Some("0.0"), Some("0.0"), Some("5.0"), None],
            ),
        ]);
        assert_eq!(batch.num_rows(), 5);

        let dir = TempDir::new().unwrap();
        let cleaned = Cleaner::new(dir.path()).clean(batch).unwrap();
        assert_eq!(cleaned.num_rows(), 2);
    }

    #[test]
    fn drops_all_missing_columns() {
        let batch = raw_batch(vec![
            ("PolicyID", vec![Some("1"), Some("2")]),
            ("Ghost", vec![Some(""), None]),
        ]);
        let dir = TempDir::new().unwrap();
        let cleaned = Cleaner::new(dir.path()).clean(batch).unwrap();
        assert_eq!(cleaned.num_columns(), 1);
        assert_eq!(cleaned.schema().field(0).name(), "PolicyID");
    }

    #[test]
    fn clean_is_idempotent() {
        let batch = raw_batch(vec![
            ("PolicyID", vec![Some("1"), Some("1"), Some("2")]),
            ("Province", vec![Some(" Gauteng "), Some(" Gauteng "), Some("Western Cape")]),
            ("TotalPremium", vec![Some("10.0"), Some("10.0"), Some("")]),
            ("TransactionMonth", vec![Some("2015-03-01"), Some("2015-03-01"), Some("bad")]),
        ]);
        let dir = TempDir::new().unwrap();
        let cleaner = Cleaner::new(dir.path());
        let once = cleaner.clean(batch).unwrap();
        let twice = cleaner.clean(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn persists_a_reloadable_csv() {
        let batch = raw_batch(vec![
            ("PolicyID", vec![Some("1"), Some("2")]),
            ("Province", vec![Some("Gauteng"), Some("Western Cape")]),
            ("TotalPremium", vec![Some("10.5"), Some("20.25")]),
        ]);
        let dir = TempDir::new().unwrap();
        let cleaner = Cleaner::new(dir.path());
        let cleaned = cleaner.clean(batch).unwrap();

        let reloaded = loader::load_cleaned(cleaner.cleaned_path()).unwrap();
        assert_eq!(reloaded.num_rows(), cleaned.num_rows());
        assert_eq!(
            reloaded.schema().field(2).data_type(),
            &DataType::Float64
        );
    }

    #[test]
    fn write_failure_still_returns_the_table() {
        let dir = TempDir::new().unwrap();
        // a file where the output directory should be blocks create_dir_all
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let batch = raw_batch(vec![("PolicyID", vec![Some("1")])]);
        let cleaned = Cleaner::new(blocker.join("out")).clean(batch).unwrap();
        assert_eq!(cleaned.num_rows(), 1);
    }

    #[test]
    fn coerced_output_is_typed() {
        let batch = raw_batch(vec![
            ("PolicyID", vec![Some("1")]),
            ("TotalClaims", vec![Some("12.5")]),
            ("IsVATRegistered", vec![Some("True")]),
        ]);
        let dir = TempDir::new().unwrap();
        let cleaned = Cleaner::new(dir.path()).clean(batch).unwrap();
        let schema = cleaned.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(schema.field(2).data_type(), &DataType::Boolean);
        let claims = cleaned
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(claims.value(0), 12.5);
    }
}
