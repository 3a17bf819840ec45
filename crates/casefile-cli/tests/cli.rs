//! End-to-end runs of the `casefile` binary against a temporary data
//! directory. No provider is configured, so every document goes through
//! the rule-based tier.

use std::path::Path;
use std::process::{Command, Output};

fn casefile(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_casefile"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("CASEFILE_LLM_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run casefile")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Whether an artifact was written for a document imported as
/// `folder/stem`.
fn has_artifact(data_dir: &Path, folder: &str, stem: &str) -> bool {
    let prefix = format!("{}_{}-", folder, stem);
    std::fs::read_dir(data_dir.join("artifacts"))
        .map(|entries| {
            entries.filter_map(|e| e.ok()).any(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with(&prefix) && name.ends_with(".json")
            })
        })
        .unwrap_or(false)
}

fn seed_corpus(root: &Path) {
    let emails = root.join("emails");
    let filings = root.join("court-filings");
    std::fs::create_dir_all(&emails).unwrap();
    std::fs::create_dir_all(&filings).unwrap();
    std::fs::write(
        emails.join("EFTA00001.txt"),
        "From: Jeffrey Epstein\nTo: Ghislaine Maxwell\nSent: March 3, 2005\n\nPlease call Sarah Kellen about Palm Beach.",
    )
    .unwrap();
    std::fs::write(
        filings.join("case-08-80736.txt"),
        "UNITED STATES DISTRICT COURT\nSOUTHERN DISTRICT OF FLORIDA\nCase No. 08-80736\n\nJeffrey Epstein, defendant.",
    )
    .unwrap();
}

#[test]
fn test_import_analyze_dedup() {
    let corpus = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    seed_corpus(corpus.path());

    let import = casefile(data.path(), &["import", corpus.path().to_str().unwrap()]);
    assert!(import.status.success());
    assert!(stdout(&import).contains("Imported:           2"));

    let again = casefile(data.path(), &["import", corpus.path().to_str().unwrap()]);
    assert!(again.status.success());
    assert!(stdout(&again).contains("Duplicates:         2"));

    let plan = casefile(data.path(), &["analyze", "--dry-run"]);
    assert!(plan.status.success());
    let plan = stdout(&plan);
    assert!(plan.contains("emails/EFTA00001"));
    assert!(plan.contains("Would process:      2"));

    let run = casefile(data.path(), &["analyze", "--tier", "0"]);
    assert!(run.status.success());
    let run = stdout(&run);
    assert!(run.contains("Processed:          2"));
    assert!(run.contains("Spent:              0.00¢"));
    assert!(has_artifact(data.path(), "emails", "EFTA00001"));
    assert!(has_artifact(data.path(), "court-filings", "case-08-80736"));

    let status = casefile(data.path(), &["analyze", "--status"]);
    assert!(status.status.success());
    assert!(stdout(&status).contains("Completed:          2"));

    let dedup = casefile(data.path(), &["dedup", "--dry-run"]);
    assert!(dedup.status.success());
    assert!(stdout(&dedup).contains("Persons scanned:"));
}

#[test]
fn test_data_set_filter_and_limit() {
    let corpus = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    seed_corpus(corpus.path());
    casefile(data.path(), &["import", corpus.path().to_str().unwrap()]);

    let run = casefile(
        data.path(),
        &["analyze", "--tier", "0", "--data-sets", "court-filings,depositions", "--limit", "5"],
    );
    assert!(run.status.success());
    assert!(stdout(&run).contains("Processed:          1"));
    assert!(has_artifact(data.path(), "court-filings", "case-08-80736"));
    assert!(!has_artifact(data.path(), "emails", "EFTA00001"));
}

#[test]
fn test_tier1_without_provider_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let output = casefile(data.path(), &["analyze", "--tier", "1"]);
    assert!(!output.status.success());
}
