//! Plain-text reports printed after each command.

use casefile_dedup::DedupReport;
use casefile_runtime::{PipelineStatus, RunReport};

use crate::import::ImportReport;

pub fn print_run(report: &RunReport) {
    if report.dry_run {
        print_plan(report);
        return;
    }
    println!("=== Casefile Analysis Run {} ===", report.run_id);
    println!();
    println!("Jobs created:       {}", report.jobs_created);
    println!("Processed:          {}", report.processed);
    println!("  Tier 0:           {}", report.tier0);
    println!("  Tier 1:           {}", report.tier1);
    println!("  Cached:           {}", report.cached);
    println!("Retried:            {}", report.retried);
    println!("Failed:             {}", report.failed);
    println!("Spent:              {:.2}¢", report.cost_cents);
    println!("Budget remaining:   {:.2}¢", report.remaining_budget_cents);
    println!();
    println!("Stopped: {}", report.stop_reason);
}

fn print_plan(report: &RunReport) {
    println!("=== Casefile Dry Run ===");
    println!();
    if report.planned.is_empty() {
        println!("Nothing to process.");
    } else {
        println!("{:<8} {:<6} {:<30} {:<20} {:>10}", "PRIORITY", "TIER", "DOCUMENT", "DATA SET", "EST. COST");
        for job in &report.planned {
            println!(
                "{:<8} {:<6} {:<30} {:<20} {:>9.2}¢",
                job.priority,
                job.tier,
                job.document_key,
                job.data_set_id.as_deref().unwrap_or("-"),
                job.estimated_cost_cents
            );
        }
    }
    println!();
    println!("Would process:      {}", report.planned.len());
    println!("  Tier 0:           {}", report.tier0);
    println!("  Tier 1:           {}", report.tier1);
    println!("Estimated cost:     {:.2}¢", report.cost_cents);
    println!("Budget remaining:   {:.2}¢", report.remaining_budget_cents);
}

pub fn print_status(status: &PipelineStatus) {
    println!("=== Casefile Pipeline Status ===");
    println!();
    println!("Pending:            {}", status.queue.pending);
    println!("Processing:         {}", status.queue.processing);
    println!("Completed:          {}", status.queue.completed);
    println!("Failed:             {}", status.queue.failed);
    println!();
    println!("Month:              {}", status.spend.month);
    println!("Spent:              {:.2}¢ of {:.2}¢", status.spend.spent_cents, status.monthly_cap_cents);
    println!("Budget remaining:   {:.2}¢", status.remaining_budget_cents);
    println!("Tier 1 calls:       {}", status.spend.records);
    println!(
        "Tokens:             {} in / {} out",
        status.spend.input_tokens, status.spend.output_tokens
    );

    if !status.queue.failed_jobs.is_empty() {
        println!();
        println!("Failed jobs:");
        for job in &status.queue.failed_jobs {
            println!(
                "  - job {} (document {}, {} attempts): {}",
                job.job_id,
                job.document_id,
                job.attempts,
                job.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

pub fn print_dedup(report: &DedupReport) {
    println!(
        "=== Casefile Deduplication{} ===",
        if report.dry_run { " (dry run)" } else { "" }
    );
    println!();
    println!("Persons scanned:    {}", report.persons_scanned);
    println!("Candidate pairs:    {}", report.candidate_pairs);
    for (strategy, count) in &report.matches {
        println!("  {:<22}{}", format!("{}:", strategy.as_str()), count);
    }
    println!("Groups found:       {}", report.groups_found);
    println!("Groups merged:      {}", report.groups_merged);
    println!("Persons removed:    {}", report.persons_removed);
    println!("Self-loops purged:  {}", report.self_loops_purged);
    println!("Pairs collapsed:    {}", report.duplicate_connections_collapsed);
    println!("Duration:           {}ms", report.duration_ms);

    if report.dry_run && !report.groups.is_empty() {
        println!();
        println!("Groups:");
        for group in &report.groups {
            println!(
                "  - {} <- {}",
                group.canonical_name,
                group.duplicate_names.join(", ")
            );
        }
    }
}

pub fn print_import(report: &ImportReport) {
    println!("=== Casefile Import ===");
    println!();
    println!("Files scanned:      {}", report.scanned);
    println!("Imported:           {}", report.imported);
    println!("Duplicates:         {}", report.duplicates);
    println!("Empty:              {}", report.empty);

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &report.errors {
            println!("  - {}", e);
        }
    }
}
