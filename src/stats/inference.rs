// src/stats/inference.rs
//
// Significance tests over plain f64 slices. The statistic math is local;
// p-values come from statrs distribution CDFs.

use anyhow::{bail, Context, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Chi-squared test of independence on an r×c contingency table of
/// observed counts. Returns (statistic, p-value).
///
/// A table with fewer than two rows or two columns has zero degrees of
/// freedom and is rejected.
pub fn chi_squared(observed: &[Vec<f64>]) -> Result<(f64, f64)> {
    let r = observed.len();
    let c = observed.first().map_or(0, Vec::len);
    if r < 2 || c < 2 {
        bail!("contingency table is {r}x{c}; need at least 2x2");
    }
    if observed.iter().any(|row| row.len() != c) {
        bail!("contingency table rows have uneven lengths");
    }

    let row_totals: Vec<f64> = observed.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..c)
        .map(|j| observed.iter().map(|row| row[j]).sum())
        .collect();
    let grand: f64 = row_totals.iter().sum();
    if grand == 0.0 {
        bail!("contingency table is empty");
    }

    let mut statistic = 0.0;
    for i in 0..r {
        for j in 0..c {
            let expected = row_totals[i] * col_totals[j] / grand;
            if expected == 0.0 {
                bail!("expected frequency of zero in cell ({i}, {j})");
            }
            let diff = observed[i][j] - expected;
            statistic += diff * diff / expected;
        }
    }

    let dof = ((r - 1) * (c - 1)) as f64;
    let dist = ChiSquared::new(dof).context("constructing chi-squared distribution")?;
    let p = 1.0 - dist.cdf(statistic);

    Ok((statistic, p))
}

/// Welch's two-sample t-test (unequal variances assumed).
/// Returns (t-statistic, two-tailed p-value).
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        bail!(
            "need at least 2 observations per group for a t-test (got {} and {})",
            a.len(),
            b.len()
        );
    }

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (ma, mb) = (mean(a), mean(b));
    let (va, vb) = (sample_variance(a, ma), sample_variance(b, mb));

    let se2 = va / na + vb / nb;
    if se2 == 0.0 {
        bail!("both groups have zero variance; t-statistic is undefined");
    }

    let t = (ma - mb) / se2.sqrt();
    // Welch–Satterthwaite degrees of freedom
    let dof = se2 * se2
        / ((va / na) * (va / na) / (na - 1.0) + (vb / nb) * (vb / nb) / (nb - 1.0));

    let dist = StudentsT::new(0.0, 1.0, dof).context("constructing t distribution")?;
    let p = 2.0 * (1.0 - dist.cdf(t.abs()));

    Ok((t, p))
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (xs.len() as f64 - 1.0)
}
