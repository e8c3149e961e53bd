// End-to-end pipeline: raw pipe-delimited file → clean → persisted CSV →
// statistical test battery.

use arrow::datatypes::DataType;
use claimscope::clean::{Cleaner, CLEANED_FILE_NAME};
use claimscope::loader;
use claimscope::stats::StatisticalTester;
use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Synthetic portfolio with the dirt the Cleaner must handle: one exact
/// duplicate row, one all-missing row, an unmapped column, and a broken
/// date. Claim incidence is independent of gender and province; Western
/// Cape premiums sit 100 higher so margins separate by postal code.
fn write_raw_file(dir: &TempDir) -> std::path::PathBuf {
    let mut content = String::new();
    writeln!(
        content,
        "PolicyID|TransactionMonth|Province|PostalCode|Gender|TotalPremium|TotalClaims|Mystery"
    )
    .unwrap();

    let mut id = 0;
    for (province, postal, base_premium) in
        [("Gauteng", 1000, 60.0), ("Western Cape", 2000, 160.0)]
    {
        for i in 0..24 {
            let claims = if (i / 2) % 2 == 0 {
                50.0 + (i % 7) as f64
            } else {
                0.0
            };
            let premium = base_premium + (i % 5) as f64;
            let gender = if i % 2 == 0 { "Male" } else { "Female" };
            let month = if i == 23 { "junk" } else { "2015-03-01 00:00:00" };
            writeln!(
                content,
                "{id}|{month}|{province}|{postal}|{gender}|{premium}|{claims}|x{i}"
            )
            .unwrap();
            id += 1;
        }
    }

    // exact duplicate of the first data row, then an all-missing row
    writeln!(
        content,
        "0|2015-03-01 00:00:00|Gauteng|1000|Male|60|50|x0"
    )
    .unwrap();
    writeln!(content, "|||||||").unwrap();

    let path = dir.path().join("MachineLearningRating_v3.txt");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn raw_file_to_test_results() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let raw_path = write_raw_file(&dir);

    let raw = loader::load(&raw_path).unwrap();
    assert_eq!(raw.num_rows(), 50);
    assert_eq!(raw.num_columns(), 8);

    let out_dir = dir.path().join("processed");
    let cleaner = Cleaner::new(&out_dir);
    let cleaned = cleaner.clean(raw).unwrap();

    // one duplicate + one all-missing row dropped
    assert_eq!(cleaned.num_rows(), 48);
    assert!(out_dir.join(CLEANED_FILE_NAME).is_file());

    // declared types survive the CSV round trip
    let reloaded = loader::load_cleaned(cleaner.cleaned_path()).unwrap();
    let schema = reloaded.schema();
    let dtype = |name: &str| {
        schema
            .column_with_name(name)
            .map(|(_, f)| f.data_type().clone())
            .unwrap()
    };
    assert_eq!(dtype("PolicyID"), DataType::Int64);
    assert_eq!(dtype("TransactionMonth"), DataType::Date32);
    assert_eq!(dtype("PostalCode"), DataType::Int64);
    assert_eq!(dtype("TotalPremium"), DataType::Float64);
    assert_eq!(dtype("Mystery"), DataType::Utf8);

    let mut tester = StatisticalTester::from_cleaned(cleaner.cleaned_path()).unwrap();
    tester.run_tests().unwrap();

    let results = tester.results();
    assert_eq!(results.len(), 5);

    // claim incidence is identical across provinces, postal codes, genders
    assert_eq!(results[0].conclusion, "Fail to Reject H₀");
    assert_eq!(results[1].conclusion, "Fail to Reject H₀");
    assert_eq!(results[3].conclusion, "Fail to Reject H₀");
    // margins differ by construction between the postal codes
    assert_eq!(results[2].test, "Zip Code vs Margin");
    assert_eq!(results[2].conclusion, "Reject H₀");

    let table = tester.results_table().unwrap();
    assert_eq!(table.num_rows(), 5);
}

#[test]
fn cleaning_an_already_clean_file_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let raw_path = write_raw_file(&dir);

    let out_dir = dir.path().join("processed");
    let cleaner = Cleaner::new(&out_dir);
    let cleaned = cleaner.clean(loader::load(&raw_path).unwrap()).unwrap();

    let again = cleaner.clean(cleaned.clone()).unwrap();
    assert_eq!(cleaned, again);
}
