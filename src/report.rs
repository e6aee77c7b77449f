//! Terminal output for operators. Diagnostics go through `tracing` instead.

use spoor_cache::RunRecord;
use spoor_pipeline::{ItemOutcome, RunEvent, Stage};

pub fn event(event: &RunEvent) {
    match event {
        RunEvent::Started { date, stage, sources } => {
            let stage = match stage {
                Stage::Discover => "discovery",
                Stage::Detect => "change detection",
                Stage::Run => "run",
            };
            println!("Starting {stage} for {date} over {sources} source(s)");
        },
        RunEvent::SourceStarted { slug, name } => println!("\n{name} ({slug})"),
        RunEvent::Discovered { report, listing, .. } => {
            println!(
                "  discovered {} URL(s) from {} page(s), {} failed -> {}",
                report.discovered.len(),
                report.visited,
                report.failed,
                listing.display()
            );
        },
        RunEvent::Classified { classification, estimate, .. } => {
            println!(
                "  new: {}  existing: {}  moved: {}  disappeared: {}",
                classification.new.len(),
                classification.existing.len(),
                classification.moved.len(),
                classification.disappeared.len()
            );
            for moved in &classification.moved {
                println!("    moved {}: {} -> {}", moved.fingerprint, moved.old_url, moved.new_url);
            }
            for gone in &classification.disappeared {
                let label = gone.attributes.label().unwrap_or_else(|| gone.fingerprint.to_string());
                println!("    disappeared {label}: {}", gone.url);
            }
            if estimate.items > 0 {
                println!(
                    "  extracting {} item(s) costs about ${:.2} and takes about {} min",
                    estimate.items,
                    estimate.cost_usd,
                    estimate.duration.as_secs().div_ceil(60)
                );
            }
        },
        RunEvent::Extracted { url, outcome, .. } => match outcome {
            ItemOutcome::Tracked { fingerprint, .. } => println!("    extracted {fingerprint}: {url}"),
            ItemOutcome::NotASource => println!("    skipped {url}"),
            ItemOutcome::Failed(err) => println!("    failed {url}: {}", **err),
        },
        RunEvent::Applied { applied, .. } => {
            println!(
                "  stored: {} inserted, {} moved, {} seen, {} retired",
                applied.inserted, applied.moved, applied.observed, applied.retired
            );
        },
        RunEvent::SourceFailed { slug, error } => println!("  {slug} failed: {}", **error),
        RunEvent::Complete(summary) => {
            println!(
                "\nDone in {:.1} min: {} source(s) ok, {} failed; {} discovered, {} new, {} moved, {} disappeared",
                summary.duration.as_secs_f64() / 60.0,
                summary.succeeded,
                summary.failed,
                summary.discovered,
                summary.new,
                summary.moved,
                summary.disappeared
            );
            if summary.extracted > 0 {
                println!("Extracted {} item(s) for ${:.2}", summary.extracted, summary.cost_usd);
            }
            if summary.cancelled {
                println!("Cancelled before every source was processed");
            }
            println!("Summary: {}", summary.summary.display());
        },
    }
}

pub fn history(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("No runs recorded yet");
        return;
    }
    println!(
        "{:<10}  {:>7}  {:>10}  {:>5}  {:>5}  {:>11}  {:>9}  {:>8}  {:>7}",
        "date", "sources", "discovered", "new", "moved", "disappeared", "extracted", "cost", "minutes"
    );
    for run in runs {
        println!(
            "{:<10}  {:>7}  {:>10}  {:>5}  {:>5}  {:>11}  {:>9}  {:>8}  {:>7.1}",
            run.date.to_string(),
            run.sources,
            run.discovered,
            run.new,
            run.moved,
            run.disappeared,
            run.extracted,
            format!("${:.2}", run.cost_usd),
            run.duration_minutes
        );
    }
}
