use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use platecorpus_core::processor::{total_elapsed, CatalogStageSummary, ExtractionStageSummary, StepTiming};
use platecorpus_core::{BatchProcessor, PipelineConfig};

#[derive(Parser)]
#[command(name = "platecorpus")]
#[command(about = "Build an illustration corpus from library catalog files and scanned books")]
struct Args {
    /// Path to config file (YAML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report timings for each pipeline step
    #[arg(long, global = true)]
    profile: bool,

    /// Override the catalog directory from the config
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Override the books root from the config
    #[arg(long, global = true)]
    books_root: Option<PathBuf>,

    /// Override the images output directory from the config
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse catalog files into records and an unknown-tag report
    Parse,
    /// Extract sampled images for previously parsed records
    Extract,
    /// Parse, then extract
    Run,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("🦀 Platecorpus");

    // Unreadable or invalid config falls back to defaults with a warning
    let mut config = PipelineConfig::load_with_fallback(args.config.as_deref());

    if let Some(path) = &args.config {
        println!("📋 Loaded config from: {}", path.display());
    } else {
        println!("📋 Using default config");
    }

    // Apply CLI overrides to config
    if let Some(dir) = &args.catalog_dir {
        config.paths.catalog_dir = dir.clone();
    }
    if let Some(dir) = &args.books_root {
        config.paths.books_root = dir.clone();
    }
    if let Some(dir) = &args.images_dir {
        config.paths.images_dir = dir.clone();
    }

    tracing::debug!(?config, "effective config");
    let processor = BatchProcessor::new(config).with_profiling(args.profile);

    match args.command {
        Command::Parse => {
            let (_, summary) = processor.run_catalog_stage().context("catalog stage failed")?;
            print_catalog_summary(&summary, &processor);
        }
        Command::Extract => {
            let records = processor.load_records().with_context(|| {
                format!(
                    "reading records from {}",
                    processor.config().paths.records_output.display()
                )
            })?;
            println!("📄 Loaded {} records", records.len());
            let summary = processor
                .run_extraction_stage(&records)
                .context("extraction stage failed")?;
            print_extraction_summary(&summary, &processor);
        }
        Command::Run => {
            let summary = processor.run().context("batch run failed")?;
            print_catalog_summary(&summary.catalog, &processor);
            print_extraction_summary(&summary.extraction, &processor);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn print_catalog_summary(summary: &CatalogStageSummary, processor: &BatchProcessor) {
    let paths = &processor.config().paths;
    println!("✅ Catalog stage complete");
    println!("📊 Catalog metrics:");
    println!("   - Files parsed: {}", summary.files_parsed);
    if summary.files_failed > 0 {
        println!("   - Files skipped: {}", summary.files_failed);
    }
    println!("   - Records: {}", summary.records);
    println!("   - With document reference: {}", summary.records_with_document);
    println!(
        "   - Unknown tags: {} ({} occurrences)",
        summary.unknown_tags, summary.unknown_tag_occurrences
    );
    println!("💾 Records: {}", paths.records_output.display());
    println!("💾 Unknown tags: {}", paths.unknown_report_output.display());
    print_timings(&summary.timings);
}

fn print_extraction_summary(summary: &ExtractionStageSummary, processor: &BatchProcessor) {
    println!("✅ Extraction stage complete");
    println!("📊 Extraction metrics:");
    println!("   - Candidate records: {}", summary.candidates);
    println!("   - Filtered out: {}", summary.filtered_out);
    println!("   - Unusable year: {}", summary.invalid_year);
    println!("   - Missing documents: {}", summary.join_misses);
    println!("   - Duplicate documents: {}", summary.duplicate_documents);
    println!("   - Failed documents: {}", summary.failed_documents);
    println!("   - Books: {}", summary.documents);
    println!("   - Images: {}", summary.images);
    println!("💾 Manifest: {}", processor.config().paths.manifest_path().display());
    print_timings(&summary.timings);
}

/// Per-step table, empty unless `--profile` was given
fn print_timings(timings: &[StepTiming]) {
    if timings.is_empty() {
        return;
    }

    let total = total_elapsed(timings);
    println!("⏱️  Step timings:");
    for timing in timings {
        let share = timing.elapsed.as_secs_f64() / total.as_secs_f64().max(f64::EPSILON) * 100.0;
        println!("   {:.<35} {}ms ({:.1}%)", timing.step, timing.elapsed.as_millis(), share);
    }
    println!("   {:.<35} {}ms", "Total", total.as_millis());
}
