// src/clean/coerce.rs

use anyhow::{anyhow, bail, Result};
use arrow::array::{
    Array, ArrayRef, BooleanBuilder, Date32Builder, Float64Array, Float64Builder, Int64Array,
    Int64Builder, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tracing::warn;

use super::date_parser;
use crate::schema::{column_kind, ColumnKind, RATING_COLUMNS};
use crate::table::clean_str;

/// Rewrite every mapped column to its declared type.
///
/// Dates are lenient (unparseable → null); Integer/Float/Boolean are
/// strict (a non-missing unconvertible value fails the run). Columns
/// already carrying their target type pass through untouched, so the
/// pass is idempotent. Unmapped columns are left as-is.
pub fn coerce_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    for (name, _) in RATING_COLUMNS {
        if batch.schema().column_with_name(name).is_none() {
            warn!(column = name, "mapped column absent from table; skipping");
        }
    }

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (idx, field) in batch.schema().fields().iter().enumerate() {
        let col = batch.column(idx);
        let (field, col) = match column_kind(field.name()) {
            Some(kind) => coerce_column(field.name(), col, kind)?,
            None => (field.as_ref().clone(), col.clone()),
        };
        fields.push(field);
        columns.push(col);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}

fn coerce_column(name: &str, col: &ArrayRef, kind: ColumnKind) -> Result<(Field, ArrayRef)> {
    let target = kind.arrow_type();
    let field = Field::new(name, target.clone(), true);

    // already typed: pass through so a second clean is a no-op
    if col.data_type() == &target && !matches!(kind, ColumnKind::Categorical) {
        return Ok((field, col.clone()));
    }

    let array: ArrayRef = match kind {
        ColumnKind::Integer => match col.data_type() {
            DataType::Utf8 => {
                let sarr = as_strings(name, col)?;
                let mut b = Int64Builder::with_capacity(sarr.len());
                for (row, opt) in sarr.iter().enumerate() {
                    b.append_option(parse_int(name, row, opt)?);
                }
                Arc::new(b.finish())
            }
            other => bail!("column {name}: cannot coerce {other} to Integer"),
        },
        ColumnKind::Float => match col.data_type() {
            DataType::Utf8 => {
                let sarr = as_strings(name, col)?;
                let mut b = Float64Builder::with_capacity(sarr.len());
                for (row, opt) in sarr.iter().enumerate() {
                    b.append_option(parse_float(name, row, opt)?);
                }
                Arc::new(b.finish())
            }
            // widen integral columns rather than reparse
            DataType::Int64 => {
                let iarr = col
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| anyhow!("column {name}: expected Int64Array"))?;
                let widened: Float64Array = iarr.iter().map(|v| v.map(|x| x as f64)).collect();
                Arc::new(widened)
            }
            other => bail!("column {name}: cannot coerce {other} to Float"),
        },
        ColumnKind::Boolean => match col.data_type() {
            DataType::Utf8 => {
                let sarr = as_strings(name, col)?;
                let mut b = BooleanBuilder::with_capacity(sarr.len());
                for (row, opt) in sarr.iter().enumerate() {
                    b.append_option(parse_bool(name, row, opt)?);
                }
                Arc::new(b.finish())
            }
            other => bail!("column {name}: cannot coerce {other} to Boolean"),
        },
        ColumnKind::Date => match col.data_type() {
            DataType::Utf8 => {
                let sarr = as_strings(name, col)?;
                let mut b = Date32Builder::with_capacity(sarr.len());
                for opt in sarr.iter() {
                    // lenient: unparseable calendar text becomes null
                    b.append_option(opt.and_then(|s| date_parser::parse_date32(&clean_str(s))));
                }
                Arc::new(b.finish())
            }
            other => bail!("column {name}: cannot coerce {other} to Date"),
        },
        ColumnKind::Categorical => match col.data_type() {
            DataType::Utf8 => {
                let sarr = as_strings(name, col)?;
                let mut b = StringBuilder::new();
                for opt in sarr.iter() {
                    match opt {
                        Some(s) => b.append_value(clean_str(s)),
                        None => b.append_null(),
                    }
                }
                Arc::new(b.finish())
            }
            other => bail!("column {name}: cannot coerce {other} to Categorical"),
        },
        // free text stays as loaded, whatever the reader produced
        ColumnKind::Text => {
            return Ok((Field::new(name, col.data_type().clone(), true), col.clone()))
        }
    };

    Ok((field, array))
}

fn as_strings<'a>(name: &str, col: &'a ArrayRef) -> Result<&'a StringArray> {
    col.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column {name}: expected StringArray"))
}

fn parse_int(name: &str, row: usize, opt: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = opt else { return Ok(None) };
    let s = clean_str(raw);
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = s.parse::<i64>() {
        return Ok(Some(v));
    }
    // the upstream export renders integer columns as "6.0"
    if let Ok(f) = s.parse::<f64>() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Ok(Some(f as i64));
        }
    }
    bail!("column {name}: value {raw:?} at row {row} is not an integer")
}

fn parse_float(name: &str, row: usize, opt: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = opt else { return Ok(None) };
    let s = clean_str(raw);
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| anyhow!("column {name}: value {raw:?} at row {row} is not a number"))
}

fn parse_bool(name: &str, row: usize, opt: Option<&str>) -> Result<Option<bool>> {
    let Some(raw) = opt else { return Ok(None) };
    let s = clean_str(raw);
    if s.is_empty() {
        return Ok(None);
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        _ => bail!("column {name}: value {raw:?} at row {row} is not a boolean"),
    }
}
