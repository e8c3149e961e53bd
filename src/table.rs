// src/table.rs

use anyhow::{anyhow, Result};
use arrow::array::{Array, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// A raw field counts as missing when it is null or blank after trimming.
pub fn is_missing(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(s) => s.trim().is_empty(),
    }
}

/// Calendar date for a Date32 day offset.
pub fn date32_to_naive(days: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days as i64)
}

/// Render one column as display strings, null-preserving.
///
/// The rendered form doubles as the group key for cross-tabulation and as
/// the per-field component of duplicate-row keys, so it must stay
/// deterministic across dtypes.
pub fn render_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let (idx, field) = batch
        .schema()
        .column_with_name(name)
        .map(|(i, f)| (i, f.clone()))
        .ok_or_else(|| anyhow!("column {name} not present in table"))?;
    let col = batch.column(idx);

    let rendered = match field.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("column {name}: expected StringArray"))?;
            arr.iter().map(|v| v.map(str::to_string)).collect()
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| anyhow!("column {name}: expected Int64Array"))?;
            arr.iter().map(|v| v.map(|x| x.to_string())).collect()
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| anyhow!("column {name}: expected Float64Array"))?;
            arr.iter().map(|v| v.map(|x| x.to_string())).collect()
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| anyhow!("column {name}: expected BooleanArray"))?;
            arr.iter().map(|v| v.map(|x| x.to_string())).collect()
        }
        DataType::Date32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(|| anyhow!("column {name}: expected Date32Array"))?;
            arr.iter()
                .map(|v| v.map(|d| date32_to_naive(d).to_string()))
                .collect()
        }
        other => return Err(anyhow!("column {name}: unsupported dtype {other}")),
    };

    Ok(rendered)
}

/// Extract a numeric column (Int64 or Float64) as f64 values.
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    let (idx, field) = batch
        .schema()
        .column_with_name(name)
        .map(|(i, f)| (i, f.clone()))
        .ok_or_else(|| anyhow!("column {name} not present in table"))?;
    let col = batch.column(idx);

    match field.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| anyhow!("column {name}: expected Float64Array"))?;
            Ok(arr.iter().collect())
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| anyhow!("column {name}: expected Int64Array"))?;
            Ok(arr.iter().map(|v| v.map(|x| x as f64)).collect())
        }
        other => Err(anyhow!("column {name}: not numeric (dtype {other})")),
    }
}

/// Names of all numeric (Int64 / Float64) columns, in schema order.
pub fn numeric_column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .filter(|f| matches!(f.data_type(), DataType::Int64 | DataType::Float64))
        .map(|f| f.name().clone())
        .collect()
}

/// Per-row dedup keys: every field rendered and joined with an
/// unprintable separator, nulls marked distinctly from empty strings.
pub fn row_keys(batch: &RecordBatch) -> Result<Vec<String>> {
    let mut columns = Vec::with_capacity(batch.num_columns());
    for field in batch.schema().fields() {
        columns.push(render_column(batch, field.name())?);
    }

    let mut keys = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut key = String::new();
        for col in &columns {
            match &col[row] {
                Some(v) => key.push_str(v),
                None => key.push('\u{0}'),
            }
            key.push('\u{1f}');
        }
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("amount", DataType::Float64, true),
            Field::new("label", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2), None])),
                Arc::new(Float64Array::from(vec![Some(1.5), None, Some(3.0)])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), Some("a")])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn clean_str_trims_and_unquotes() {
        assert_eq!(clean_str("  x  "), "x");
        assert_eq!(clean_str("\"quoted\""), "quoted");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn renders_each_dtype() {
        let batch = sample_batch();
        assert_eq!(
            render_column(&batch, "id").unwrap(),
            vec![Some("1".into()), Some("2".into()), None]
        );
        assert_eq!(
            render_column(&batch, "amount").unwrap(),
            vec![Some("1.5".into()), None, Some("3".into())]
        );
        assert!(render_column(&batch, "nope").is_err());
    }

    #[test]
    fn numeric_column_widens_ints() {
        let batch = sample_batch();
        assert_eq!(
            numeric_column(&batch, "id").unwrap(),
            vec![Some(1.0), Some(2.0), None]
        );
        assert!(numeric_column(&batch, "label").is_err());
        assert_eq!(numeric_column_names(&batch), vec!["id", "amount"]);
    }

    #[test]
    fn row_keys_distinguish_null_from_empty() {
        let schema = Schema::new(vec![Field::new("v", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec![Some(""), None]))],
        )
        .unwrap();
        let keys = row_keys(&batch).unwrap();
        assert_ne!(keys[0], keys[1]);
    }
}
