// src/stats/mod.rs

pub mod inference;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::loader;
use crate::table::{numeric_column, render_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestMethod {
    ChiSquared,
    TTest,
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMethod::ChiSquared => write!(f, "Chi-squared"),
            TestMethod::TTest => write!(f, "t-test"),
        }
    }
}

/// One executed significance test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test: String,
    pub method: TestMethod,
    pub groups: String,
    /// Rounded to 4 decimals.
    pub p_value: f64,
    pub conclusion: String,
}

const SIGNIFICANCE: f64 = 0.05;

/// Runs the fixed pairwise test battery against the cleaned table.
///
/// KPI columns (HasClaim, Margin, ClaimSeverity, LossRatio) are derived
/// once at construction and live only on this instance's in-memory table.
pub struct StatisticalTester {
    data: RecordBatch,
    results: Vec<TestResult>,
}

impl StatisticalTester {
    /// Load the cleaned table from `path` and derive the KPI columns.
    pub fn from_cleaned(path: impl AsRef<Path>) -> Result<Self> {
        let batch = loader::load_cleaned(path.as_ref())
            .with_context(|| format!("loading cleaned table {}", path.as_ref().display()))?;
        let data = derive_kpis(&batch).context("deriving KPI columns")?;
        Ok(Self {
            data,
            results: Vec::new(),
        })
    }

    /// Table under test, KPI columns included.
    pub fn table(&self) -> &RecordBatch {
        &self.data
    }

    /// Chi-squared test of independence between two categorical columns,
    /// optionally restricted to `subset` values of the group column.
    pub fn chi_squared_test(
        &self,
        group_col: &str,
        target_col: &str,
        subset: Option<&[&str]>,
    ) -> Result<(f64, f64)> {
        let groups = render_column(&self.data, group_col)?;
        let targets = render_column(&self.data, target_col)?;

        let mut counts: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut group_labels: BTreeSet<String> = BTreeSet::new();
        let mut target_labels: BTreeSet<String> = BTreeSet::new();

        for (g, t) in groups.iter().zip(&targets) {
            let (Some(g), Some(t)) = (g, t) else { continue };
            if let Some(wanted) = subset {
                if !wanted.contains(&g.as_str()) {
                    continue;
                }
            }
            group_labels.insert(g.clone());
            target_labels.insert(t.clone());
            *counts.entry((g.clone(), t.clone())).or_insert(0.0) += 1.0;
        }

        let observed: Vec<Vec<f64>> = group_labels
            .iter()
            .map(|g| {
                target_labels
                    .iter()
                    .map(|t| {
                        counts
                            .get(&(g.clone(), t.clone()))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect();

        inference::chi_squared(&observed)
            .with_context(|| format!("chi-squared on {group_col} x {target_col}"))
    }

    /// Welch's t-test on `target_col` between two values of `group_col`.
    /// Missing target values are dropped.
    pub fn t_test(
        &self,
        group_col: &str,
        target_col: &str,
        group_a: &str,
        group_b: &str,
    ) -> Result<(f64, f64)> {
        let groups = render_column(&self.data, group_col)?;
        let targets = numeric_column(&self.data, target_col)?;

        let collect = |label: &str| -> Vec<f64> {
            groups
                .iter()
                .zip(&targets)
                .filter(|(g, _)| g.as_deref() == Some(label))
                .filter_map(|(_, t)| *t)
                .collect()
        };

        let a = collect(group_a);
        let b = collect(group_b);
        inference::welch_t_test(&a, &b).with_context(|| {
            format!("t-test on {target_col} between {group_col}={group_a} and {group_col}={group_b}")
        })
    }

    /// Execute the five fixed comparisons, in declaration order.
    /// Any failing test aborts the whole invocation.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn run_tests(&mut self) -> Result<()> {
        let (prov_a, prov_b) = ("Western Cape", "Gauteng");
        let (zip_a, zip_b) = ("1000", "2000");

        let (_, p) = self.chi_squared_test("Province", "HasClaim", Some(&[prov_a, prov_b]))?;
        self.log_result("Province vs Claim Frequency", TestMethod::ChiSquared, prov_a, prov_b, p);

        let (_, p) = self.chi_squared_test("PostalCode", "HasClaim", Some(&[zip_a, zip_b]))?;
        self.log_result("Zip Code vs Claim Frequency", TestMethod::ChiSquared, zip_a, zip_b, p);

        let (_, p) = self.t_test("PostalCode", "Margin", zip_a, zip_b)?;
        self.log_result("Zip Code vs Margin", TestMethod::TTest, zip_a, zip_b, p);

        let (_, p) = self.chi_squared_test("Gender", "HasClaim", Some(&["Male", "Female"]))?;
        self.log_result("Gender vs Claim Frequency", TestMethod::ChiSquared, "Male", "Female", p);

        let (_, p) = self.t_test("Province", "ClaimSeverity", prov_a, prov_b)?;
        self.log_result("Province vs Claim Severity", TestMethod::TTest, prov_a, prov_b, p);

        Ok(())
    }

    fn log_result(&mut self, test: &str, method: TestMethod, a: &str, b: &str, p: f64) {
        let p_value = (p * 1e4).round() / 1e4;
        let conclusion = if p < SIGNIFICANCE {
            "Reject H₀"
        } else {
            "Fail to Reject H₀"
        };
        info!(test, %method, p_value, conclusion, "test complete");
        self.results.push(TestResult {
            test: test.to_string(),
            method,
            groups: format!("{a} vs {b}"),
            p_value,
            conclusion: conclusion.to_string(),
        });
    }

    /// Accumulated results, insertion order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Results as a Record Table, insertion order.
    pub fn results_table(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new("Test", DataType::Utf8, false),
            Field::new("Method", DataType::Utf8, false),
            Field::new("Groups", DataType::Utf8, false),
            Field::new("PValue", DataType::Float64, false),
            Field::new("Conclusion", DataType::Utf8, false),
        ]);

        let tests: StringArray = self.results.iter().map(|r| Some(r.test.as_str())).collect();
        let methods: StringArray = self
            .results
            .iter()
            .map(|r| Some(r.method.to_string()))
            .collect();
        let groups: StringArray = self
            .results
            .iter()
            .map(|r| Some(r.groups.as_str()))
            .collect();
        let p_values: Float64Array = self.results.iter().map(|r| Some(r.p_value)).collect();
        let conclusions: StringArray = self
            .results
            .iter()
            .map(|r| Some(r.conclusion.as_str()))
            .collect();

        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(tests),
                Arc::new(methods),
                Arc::new(groups),
                Arc::new(p_values),
                Arc::new(conclusions),
            ],
        )
        .map_err(Into::into)
    }
}

/// Append the four derived KPI columns to `batch`.
fn derive_kpis(batch: &RecordBatch) -> Result<RecordBatch> {
    let claims = numeric_column(batch, "TotalClaims").context("KPI inputs")?;
    let premium = numeric_column(batch, "TotalPremium").context("KPI inputs")?;

    let has_claim: Vec<i64> = claims
        .iter()
        .map(|c| i64::from(c.unwrap_or(0.0) > 0.0))
        .collect();

    let margin: Float64Array = premium
        .iter()
        .zip(&claims)
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(p - c),
            _ => None,
        })
        .collect();

    let severity: Float64Array = claims
        .iter()
        .zip(&has_claim)
        .map(|(c, h)| if *h == 1 { *c } else { None })
        .collect();

    let loss_ratio: Float64Array = premium
        .iter()
        .zip(&claims)
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(c / p),
            _ => None,
        })
        .collect();

    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new("HasClaim", DataType::Int64, false));
    fields.push(Field::new("Margin", DataType::Float64, true));
    fields.push(Field::new("ClaimSeverity", DataType::Float64, true));
    fields.push(Field::new("LossRatio", DataType::Float64, true));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(Int64Array::from(has_claim)));
    columns.push(Arc::new(margin));
    columns.push(Arc::new(severity));
    columns.push(Arc::new(loss_ratio));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}
