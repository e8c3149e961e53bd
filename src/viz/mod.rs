// src/viz/mod.rs

pub mod plots;

use anyhow::{anyhow, Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::table::{numeric_column, numeric_column_names, render_column};

/// Explicit plotting configuration, applied once at construction.
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub out_dir: PathBuf,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
            out_dir: PathBuf::from("data/plots"),
        }
    }
}

/// Read-only consumer of the cleaned table: renders descriptive charts
/// and returns the aggregate tables behind them.
///
/// Holds its own handle to the (immutable) table; callers' data is never
/// touched.
pub struct Visualizer {
    data: RecordBatch,
    style: PlotStyle,
}

impl Visualizer {
    pub fn new(batch: &RecordBatch, style: PlotStyle) -> Self {
        Self {
            data: batch.clone(),
            style,
        }
    }

    fn plot_path(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.style.out_dir)
            .with_context(|| format!("creating plot directory {:?}", self.style.out_dir))?;
        Ok(self.style.out_dir.join(name))
    }

    fn size(&self) -> (u32, u32) {
        (self.style.width, self.style.height)
    }

    fn render(&self, name: &str, draw: impl FnOnce(&Path) -> Result<(), Box<dyn std::error::Error>>) -> Result<()> {
        let path = self.plot_path(name)?;
        draw(&path).map_err(|e| anyhow!("rendering {name}: {e}"))?;
        info!(plot = name, "rendered");
        Ok(())
    }

    /// Distribution plots: premium/claims histograms, gender and province
    /// observation counts.
    pub fn univariate_analysis(&self) -> Result<()> {
        for column in ["TotalPremium", "TotalClaims"] {
            let values: Vec<f64> = numeric_column(&self.data, column)?
                .into_iter()
                .flatten()
                .collect();
            let name = format!("hist_{}.svg", column.to_lowercase());
            self.render(&name, |path| {
                plots::histogram(
                    path,
                    self.size(),
                    &format!("{column} Distribution"),
                    column,
                    &values,
                    40,
                )
            })?;
        }

        for column in ["Gender", "Province"] {
            let (labels, counts) = self.category_counts(column)?;
            let name = format!("count_{}.svg", column.to_lowercase());
            self.render(&name, |path| {
                plots::bar_chart(
                    path,
                    self.size(),
                    &format!("Policy Count by {column}"),
                    "count",
                    &labels,
                    &counts,
                )
            })?;
        }

        Ok(())
    }

    fn category_counts(&self, column: &str) -> Result<(Vec<String>, Vec<f64>)> {
        let rendered = render_column(&self.data, column)?;
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for v in rendered.into_iter().flatten() {
            *counts.entry(v).or_insert(0.0) += 1.0;
        }
        let mut pairs: Vec<(String, f64)> = counts.into_iter().collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(pairs.into_iter().unzip())
    }

    /// Loss ratio (sum claims / sum premium) per value of `segment`,
    /// sorted descending. Returns the aggregate table and renders a bar
    /// chart.
    pub fn loss_ratio_by(&self, segment: &str) -> Result<RecordBatch> {
        let groups = render_column(&self.data, segment)?;
        let claims = numeric_column(&self.data, "TotalClaims")?;
        let premium = numeric_column(&self.data, "TotalPremium")?;

        let total_claims: f64 = claims.iter().flatten().sum();
        let total_premium: f64 = premium.iter().flatten().sum();
        if total_premium > 0.0 {
            info!(
                overall = total_claims / total_premium,
                "portfolio loss ratio"
            );
        }

        let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for ((g, c), p) in groups.iter().zip(&claims).zip(&premium) {
            let Some(g) = g else { continue };
            let entry = sums.entry(g.clone()).or_insert((0.0, 0.0));
            entry.0 += c.unwrap_or(0.0);
            entry.1 += p.unwrap_or(0.0);
        }

        let mut rows: Vec<(String, f64, f64, f64)> = sums
            .into_iter()
            .map(|(g, (c, p))| (g, c, p, c / p))
            .collect();
        rows.sort_by(|a, b| b.3.total_cmp(&a.3));

        let labels: Vec<String> = rows.iter().map(|r| r.0.clone()).collect();
        let ratios: Vec<f64> = rows.iter().map(|r| r.3).collect();
        let name = format!("loss_ratio_by_{}.svg", segment.to_lowercase());
        self.render(&name, |path| {
            plots::bar_chart(
                path,
                self.size(),
                &format!("Loss Ratio by {segment}"),
                "Loss Ratio",
                &labels,
                &ratios,
            )
        })?;

        let schema = Schema::new(vec![
            Field::new(segment, DataType::Utf8, false),
            Field::new("TotalClaims", DataType::Float64, false),
            Field::new("TotalPremium", DataType::Float64, false),
            Field::new("LossRatio", DataType::Float64, false),
        ]);
        let seg: StringArray = rows.iter().map(|r| Some(r.0.as_str())).collect();
        let c: Float64Array = rows.iter().map(|r| Some(r.1)).collect();
        let p: Float64Array = rows.iter().map(|r| Some(r.2)).collect();
        let lr: Float64Array = rows.iter().map(|r| Some(r.3)).collect();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(seg), Arc::new(c), Arc::new(p), Arc::new(lr)],
        )
        .map_err(Into::into)
    }

    /// Pearson correlation matrix over all numeric columns
    /// (pairwise-complete observations). Returns the matrix as a table
    /// and renders a heatmap.
    pub fn correlation_matrix(&self) -> Result<RecordBatch> {
        let names = numeric_column_names(&self.data);
        let columns: Vec<Vec<Option<f64>>> = names
            .iter()
            .map(|n| numeric_column(&self.data, n))
            .collect::<Result<_>>()?;

        let n = names.len();
        let mut matrix: Vec<Vec<Option<f64>>> = vec![vec![None; n]; n];
        for i in 0..n {
            for j in 0..n {
                matrix[i][j] = pearson(&columns[i], &columns[j]);
            }
        }

        self.render("correlation_matrix.svg", |path| {
            plots::heatmap(
                path,
                (self.style.width.max(700), self.style.height.max(700)),
                "Correlation Matrix",
                &names,
                &matrix,
            )
        })?;

        let mut fields = vec![Field::new("Column", DataType::Utf8, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(
            names.iter().map(|n| Some(n.as_str())).collect::<StringArray>(),
        )];
        for (j, name) in names.iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, true));
            let col: Float64Array = (0..n).map(|i| matrix[i][j]).collect();
            arrays.push(Arc::new(col));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Into::into)
    }

    /// Box-and-whisker renders for the heavy-tailed currency columns.
    pub fn outlier_boxplots(&self) -> Result<()> {
        for column in ["TotalClaims", "CustomValueEstimate"] {
            if self.data.schema().column_with_name(column).is_none() {
                warn!(column, "absent from table; skipping boxplot");
                continue;
            }
            let values: Vec<f64> = numeric_column(&self.data, column)?
                .into_iter()
                .flatten()
                .collect();
            let name = format!("box_{}.svg", column.to_lowercase());
            self.render(&name, |path| {
                plots::boxplot(
                    path,
                    self.size(),
                    &format!("Outliers in {column}"),
                    values.clone(),
                )
            })?;
        }
        Ok(())
    }

    /// Monthly premium and claim sums keyed by TransactionMonth.
    /// Returns the monthly table and renders a line chart.
    pub fn claims_over_time(&self) -> Result<RecordBatch> {
        let months = render_column(&self.data, "TransactionMonth")?;
        let claims = numeric_column(&self.data, "TotalClaims")?;
        let premium = numeric_column(&self.data, "TotalPremium")?;

        // rendered dates are ISO, so the month key is the "YYYY-MM" prefix
        let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        let mut skipped = 0usize;
        for ((m, c), p) in months.iter().zip(&claims).zip(&premium) {
            let key = match m.as_deref() {
                Some(s) if s.len() >= 7 && s.as_bytes()[4] == b'-' => s[..7].to_string(),
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            let entry = sums.entry(key).or_insert((0.0, 0.0));
            entry.0 += p.unwrap_or(0.0);
            entry.1 += c.unwrap_or(0.0);
        }
        if skipped > 0 {
            warn!(skipped, "rows without a usable TransactionMonth");
        }

        let labels: Vec<String> = sums.keys().cloned().collect();
        let premium_series: Vec<f64> = sums.values().map(|v| v.0).collect();
        let claim_series: Vec<f64> = sums.values().map(|v| v.1).collect();

        self.render("claims_over_time.svg", |path| {
            plots::line_chart(
                path,
                self.size(),
                "Monthly Premium vs Claims",
                "Amount (ZAR)",
                &labels,
                &[
                    ("TotalPremium", premium_series.as_slice()),
                    ("TotalClaims", claim_series.as_slice()),
                ],
            )
        })?;

        let schema = Schema::new(vec![
            Field::new("Month", DataType::Utf8, false),
            Field::new("TotalPremium", DataType::Float64, false),
            Field::new("TotalClaims", DataType::Float64, false),
        ]);
        let m: StringArray = labels.iter().map(|l| Some(l.as_str())).collect();
        let p: Float64Array = premium_series.iter().copied().map(Some).collect();
        let c: Float64Array = claim_series.iter().copied().map(Some).collect();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(m), Arc::new(p), Arc::new(c)],
        )
        .map_err(Into::into)
    }
}

/// Pearson correlation over pairwise-complete observations.
fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some((*x, *y)),
            _ => None,
        })
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let my = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in &pairs {
        cov += (x - mx) * (y - my);
        vx += (x - mx) * (x - mx);
        vy += (y - my) * (y - my);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx * vy).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int64Array};
    use tempfile::TempDir;

    fn style(dir: &TempDir) -> PlotStyle {
        PlotStyle {
            width: 400,
            height: 300,
            out_dir: dir.path().to_path_buf(),
        }
    }

    fn sample_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Province", DataType::Utf8, true),
            Field::new("Gender", DataType::Utf8, true),
            Field::new("TransactionMonth", DataType::Date32, true),
            Field::new("TotalPremium", DataType::Float64, true),
            Field::new("TotalClaims", DataType::Float64, true),
            Field::new("PolicyID", DataType::Int64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![
                    Some("Gauteng"),
                    Some("Gauteng"),
                    Some("Western Cape"),
                    Some("Western Cape"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("Male"),
                    Some("Female"),
                    Some("Male"),
                    Some("Female"),
                ])),
                // 2015-03 and 2015-04
                Arc::new(Date32Array::from(vec![
                    Some(16495),
                    Some(16495),
                    Some(16526),
                    Some(16526),
                ])),
                Arc::new(Float64Array::from(vec![
                    Some(100.0),
                    Some(100.0),
                    Some(200.0),
                    Some(200.0),
                ])),
                Arc::new(Float64Array::from(vec![
                    Some(50.0),
                    Some(0.0),
                    Some(20.0),
                    Some(20.0),
                ])),
                Arc::new(Int64Array::from(vec![Some(1), Some(2), Some(3), Some(4)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn loss_ratio_table_is_sorted_descending() {
        let dir = TempDir::new().unwrap();
        let viz = Visualizer::new(&sample_batch(), style(&dir));
        let table = viz.loss_ratio_by("Province").unwrap();
        assert_eq!(table.num_rows(), 2);

        let segments = render_column(&table, "Province").unwrap();
        // Gauteng: 50/200 = 0.25, Western Cape: 40/400 = 0.10
        assert_eq!(segments[0].as_deref(), Some("Gauteng"));
        let ratios = numeric_column(&table, "LossRatio").unwrap();
        assert_eq!(ratios[0], Some(0.25));
        assert_eq!(ratios[1], Some(0.1));
        assert!(dir.path().join("loss_ratio_by_province.svg").is_file());
    }

    #[test]
    fn correlation_matrix_has_unit_diagonal() {
        let dir = TempDir::new().unwrap();
        let viz = Visualizer::new(&sample_batch(), style(&dir));
        let table = viz.correlation_matrix().unwrap();
        // Column + one column per numeric field
        assert_eq!(table.num_columns(), 4);

        let premium_corr = numeric_column(&table, "TotalPremium").unwrap();
        assert!((premium_corr[0].unwrap() - 1.0).abs() < 1e-12);
        assert!(dir.path().join("correlation_matrix.svg").is_file());
    }

    #[test]
    fn monthly_series_aggregates_by_month() {
        let dir = TempDir::new().unwrap();
        let viz = Visualizer::new(&sample_batch(), style(&dir));
        let table = viz.claims_over_time().unwrap();
        assert_eq!(table.num_rows(), 2);

        let months = render_column(&table, "Month").unwrap();
        assert_eq!(months[0].as_deref(), Some("2015-03"));
        let premium = numeric_column(&table, "TotalPremium").unwrap();
        assert_eq!(premium[0], Some(200.0));
        assert_eq!(premium[1], Some(400.0));
    }

    #[test]
    fn univariate_and_outlier_renders_write_files() {
        let dir = TempDir::new().unwrap();
        let viz = Visualizer::new(&sample_batch(), style(&dir));
        viz.univariate_analysis().unwrap();
        viz.outlier_boxplots().unwrap();
        assert!(dir.path().join("hist_totalpremium.svg").is_file());
        assert!(dir.path().join("count_gender.svg").is_file());
        // CustomValueEstimate is absent and skipped without error
        assert!(!dir.path().join("box_customvalueestimate.svg").exists());
    }
}
