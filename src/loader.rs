// src/loader.rs

use arrow::csv::{reader::Format, ReaderBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info};

use crate::schema::unmapped_columns;
use crate::table::clean_str;

/// Loading failures callers are expected to match on.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file {path} does not exist")]
    FileNotFound { path: String },
    #[error("file {path} has no header row")]
    EmptyFile { path: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Load the raw pipe-delimited rating file.
///
/// Every column is read as nullable Utf8; typing is the Cleaner's job.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<RecordBatch, LoadError> {
    let path = path.as_ref();
    ensure_file(path)?;

    let headers = read_headers(path, b'|')?;
    let fields: Vec<Field> = headers
        .iter()
        .map(|n| Field::new(n, DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let unmapped = unmapped_columns(&headers);
    if !unmapped.is_empty() {
        debug!(?unmapped, "header columns outside the rating schema");
    }

    let reader = BufReader::new(File::open(path)?);
    let csv = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(b'|')
        .build(reader)?;

    let batches = csv.collect::<Result<Vec<_>, _>>()?;
    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        arrow::compute::concat_batches(&schema, &batches)?
    };

    log_head(&batch);
    info!(rows = batch.num_rows(), cols = batch.num_columns(), "loaded raw table");
    Ok(batch)
}

/// Load the canonical cleaned file (comma-delimited, typed).
///
/// Column types are inferred; the cleaned file is written typed, so
/// inference reproduces the persisted schema.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_cleaned(path: impl AsRef<Path>) -> Result<RecordBatch, LoadError> {
    let path = path.as_ref();
    ensure_file(path)?;

    // ensure a header exists before handing the file to the inferrer
    read_headers(path, b',')?;

    let format = Format::default().with_header(true).with_delimiter(b',');
    let mut probe = File::open(path)?;
    let (schema, _) = format.infer_schema(&mut probe, None)?;
    let schema = Arc::new(schema);

    let reader = BufReader::new(File::open(path)?);
    let csv = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(b',')
        .build(reader)?;

    let batches = csv.collect::<Result<Vec<_>, _>>()?;
    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        arrow::compute::concat_batches(&schema, &batches)?
    };

    log_head(&batch);
    info!(rows = batch.num_rows(), cols = batch.num_columns(), "loaded cleaned table");
    Ok(batch)
}

fn ensure_file(path: &Path) -> Result<(), LoadError> {
    if !path.is_file() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn read_headers(path: &Path, delimiter: u8) -> Result<Vec<String>, LoadError> {
    let mut first_line = String::new();
    let mut reader = BufReader::new(File::open(path)?);
    let bytes = reader.read_line(&mut first_line)?;
    if bytes == 0 || first_line.trim().is_empty() {
        return Err(LoadError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    Ok(first_line
        .trim_end_matches(['\r', '\n'])
        .split(delimiter as char)
        .map(clean_str)
        .collect())
}

fn log_head(batch: &RecordBatch) {
    let head = batch.slice(0, batch.num_rows().min(5));
    match pretty_format_batches(&[head]) {
        Ok(table) => debug!("head:\n{table}"),
        Err(err) => debug!(%err, "could not format head preview"),
    }
}
