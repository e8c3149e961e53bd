use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use claimscope::{
    clean::Cleaner,
    loader,
    stats::StatisticalTester,
    viz::{PlotStyle, Visualizer},
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configure paths ──────────────────────────────────────────
    let raw_path = Path::new("data/raw/MachineLearningRating_v3.txt");
    let processed_dir = PathBuf::from("data/processed");
    let plots_dir = PathBuf::from("data/plots");

    // ─── 3) load + clean ─────────────────────────────────────────────
    let raw = loader::load(raw_path).context("loading raw rating file")?;
    let cleaner = Cleaner::new(processed_dir);
    let cleaned = cleaner.clean(raw).context("cleaning rating table")?;

    // ─── 4) significance tests against the persisted table ──────────
    let mut tester = StatisticalTester::from_cleaned(cleaner.cleaned_path())
        .context("constructing statistical tester")?;
    tester.run_tests().context("running test battery")?;
    let results = tester.results_table()?;
    println!("{}", pretty_format_batches(&[results])?);

    // ─── 5) descriptive visualizations + aggregates ──────────────────
    let style = PlotStyle {
        out_dir: plots_dir,
        ..PlotStyle::default()
    };
    let viz = Visualizer::new(&cleaned, style);
    viz.univariate_analysis()?;
    viz.outlier_boxplots()?;
    for segment in ["Province", "Gender", "VehicleType"] {
        let table = viz.loss_ratio_by(segment)?;
        println!("{}", pretty_format_batches(&[table])?);
    }
    viz.correlation_matrix()?;
    viz.claims_over_time()?;

    info!("all done");
    Ok(())
}
