//! zoofetch CLI
//!
//! Loads a filtered slice of a zoo dataset, prints a summary and optionally
//! exports one label field to disk.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, DatasetCache, CACHE_DIR_ENV},
    config::{DatasetRequest, ExportFormat, ExportRequest, DEFAULT_DATASET, DEFAULT_NUM_WORKERS},
    dataset::{Dataset, CLASSIFICATIONS_FIELD},
    export::export_dataset,
    tracing_config::{events, init_cli_tracing, spans},
    zoo::{ZooCatalog, ZooLoader},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use tracing::Instrument;

/// Fetch filtered subsets of zoo image datasets and export them
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "zoofetch")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Zoo dataset to load
    #[arg(short, long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// Split to load (train, validation, test)
    #[arg(short, long, default_value = "validation")]
    pub split: String,

    /// Comma-separated label types (classifications, detections)
    #[arg(short, long, value_delimiter = ',', default_value = "classifications")]
    pub label_types: Vec<String>,

    /// Comma-separated class names to keep [default: every class]
    #[arg(short, long, value_delimiter = ',')]
    pub classes: Vec<String>,

    /// Maximum number of samples to load
    #[arg(short = 'n', long)]
    pub max_samples: Option<usize>,

    /// Randomize which matching samples are selected
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for --shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep labels of every class on selected samples, not only the requested ones
    #[arg(long)]
    pub all_labels: bool,

    /// Only fetch annotations; do not download images
    #[arg(long)]
    pub skip_media: bool,

    /// Concurrent media downloads
    #[arg(short = 'j', long, default_value_t = DEFAULT_NUM_WORKERS)]
    pub workers: usize,

    /// Export the loaded dataset to this file
    #[arg(short, long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Export file format
    #[arg(long, value_enum, default_value_t = CliExportFormat::Csv)]
    pub export_format: CliExportFormat,

    /// Label field to export
    #[arg(long, default_value = CLASSIFICATIONS_FIELD)]
    pub label_field: String,

    /// Replace the export file if it already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// List datasets available in the zoo and exit
    #[arg(long)]
    pub list_datasets: bool,

    /// List cached datasets and exit
    #[arg(long)]
    pub list_cached: bool,

    /// Clear the dataset cache, or a single cached dataset when KEY is given
    #[arg(long, value_name = "KEY", num_args = 0..=1)]
    pub clear_cache: Option<Option<String>>,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExportFormat {
    Csv,
    Jsonl,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(format: CliExportFormat) -> Self {
        match format {
            CliExportFormat::Csv => ExportFormat::Csv,
            CliExportFormat::Jsonl => ExportFormat::JsonLines,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    // Handle special flags that don't load a dataset
    if cli.list_datasets {
        list_datasets();
        return Ok(());
    }

    if cli.list_cached {
        return list_cached_datasets(&cli);
    }

    if let Some(dataset_key) = &cli.clear_cache {
        return clear_cache(&cli, dataset_key.as_deref());
    }

    if cli.show_cache_dir {
        return show_current_cache_dir(&cli);
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    let request = CliConfigBuilder::dataset_request(&cli).context("Invalid dataset request")?;
    let export = CliConfigBuilder::export_request(&cli).context("Invalid export request")?;

    let span = spans::session(&session_id, &request.dataset);
    run(&cli, &request, export.as_ref()).instrument(span).await
}

async fn run(cli: &Cli, request: &DatasetRequest, export: Option<&ExportRequest>) -> Result<()> {
    info!(
        "Loading {} ({}) with label types [{}]",
        request.dataset,
        request.split,
        cli.label_types.join(", ")
    );

    let loader = create_loader(cli)?.with_progress(true);

    let dataset = match loader.load(request).await {
        Ok(dataset) => dataset,
        Err(e) => {
            events::error_with_context(&e, "dataset load");
            return Err(anyhow::Error::new(e).context("Failed to load dataset"));
        },
    };

    println!("{dataset}");
    print_label_counts(&dataset)?;

    if let Some(export) = export {
        let summary = export_dataset(&dataset, export).with_context(|| {
            format!("Failed to export dataset to {}", export.output_path.display())
        })?;

        events::progress(&format!(
            "Exported {} {} records ({} samples) to {}",
            summary.records,
            summary.format,
            summary.samples,
            summary.path.display()
        ));
        println!(
            "✅ Exported {} records to {}",
            summary.records,
            summary.path.display()
        );
    }

    Ok(())
}

fn create_loader(cli: &Cli) -> Result<ZooLoader> {
    match &cli.cache_dir {
        Some(cache_dir) => ZooLoader::with_cache_dir(cache_dir)
            .context("Failed to create loader with custom cache directory"),
        None => ZooLoader::new().context("Failed to create loader"),
    }
}

fn create_cache(cli: &Cli) -> Result<DatasetCache> {
    match &cli.cache_dir {
        Some(cache_dir) => DatasetCache::with_custom_cache_dir(cache_dir)
            .context("Failed to create cache with custom directory"),
        None => DatasetCache::new().context("Failed to create dataset cache"),
    }
}

fn print_label_counts(dataset: &Dataset) -> Result<()> {
    for field in dataset.label_fields() {
        let counts = dataset.count_values(field)?;
        if counts.is_empty() {
            continue;
        }

        println!("{field}:");
        for (label, count) in counts {
            println!("  {label}: {count}");
        }
    }
    Ok(())
}

fn list_datasets() {
    let catalog = ZooCatalog::default();

    println!("📚 Zoo Datasets");
    for dataset in catalog.iter() {
        println!("• {}", dataset.name());
        println!("  └─ {}", dataset.description());
        println!(
            "  └─ Splits: {}",
            dataset
                .splits()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  └─ Label types: {}",
            dataset
                .label_types()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn list_cached_datasets(cli: &Cli) -> Result<()> {
    let cache = create_cache(cli)?;
    let datasets = cache
        .scan_cached_datasets()
        .context("Failed to list cached datasets")?;

    println!("📦 Cached Datasets");

    if datasets.is_empty() {
        println!("No cached datasets found.");
        println!("\n💡 To fetch a dataset, use:");
        println!("  zoofetch --split validation --classes Cat,Dog --max-samples 100");
        return Ok(());
    }

    for dataset in datasets {
        println!("📁 {}", dataset.dataset_key);
        println!("  └─ Cache location: {}", dataset.path.display());
        if !dataset.splits.is_empty() {
            println!("  └─ Splits: {}", dataset.splits.join(", "));
        }
        println!("  └─ Media files: {}", dataset.media_files);
        println!("  └─ Size: {}", format_size(dataset.size_bytes));
        println!();
    }

    Ok(())
}

fn clear_cache(cli: &Cli, dataset_key: Option<&str>) -> Result<()> {
    let cache = create_cache(cli)?;

    if let Some(dataset_key) = dataset_key {
        let _span = spans::cache_operation("clear", dataset_key).entered();
        println!("🗑️  Clearing cached dataset: {}", dataset_key);

        if cache
            .clear_specific_dataset(dataset_key)
            .with_context(|| format!("Failed to clear dataset '{}'", dataset_key))?
        {
            println!("✅ Removed {}", dataset_key);
        } else {
            println!("⚠️  Dataset '{}' not found in cache", dataset_key);
            println!("   Use --list-cached to see cached datasets");
        }
    } else {
        let _span = spans::cache_operation("clear", "*").entered();
        println!("🗑️  Clearing entire dataset cache...");

        let removed = cache
            .clear_all_datasets()
            .context("Failed to clear cache")?;
        if removed.is_empty() {
            println!("💡 Cache was already empty");
        } else {
            println!("✅ Removed {} dataset(s):", removed.len());
            for dataset_key in &removed {
                println!("   • {}", dataset_key);
            }
        }
    }

    println!(
        "   Cache location: {}",
        cache.get_current_cache_dir().display()
    );
    Ok(())
}

fn show_current_cache_dir(cli: &Cli) -> Result<()> {
    let cache = create_cache(cli)?;

    println!("📁 Current cache directory:");
    println!("   Path: {}", cache.get_current_cache_dir().display());

    if cli.cache_dir.is_some() {
        println!("   Source: --cache-dir argument");
    } else if std::env::var(CACHE_DIR_ENV).is_ok() {
        println!("   Source: {} environment variable", CACHE_DIR_ENV);
    } else {
        println!("   Source: platform cache directory");
    }

    println!("\n💡 To use a custom cache directory:");
    println!("   zoofetch --cache-dir /path/to/custom/cache");
    println!("   or set {} environment variable", CACHE_DIR_ENV);

    Ok(())
}
