//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{DatasetRequest, ExportRequest, LabelType, Split};
use anyhow::{Context, Result};

/// Convert CLI arguments into library requests
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the dataset request from CLI arguments
    pub(crate) fn dataset_request(cli: &Cli) -> Result<DatasetRequest> {
        let split: Split = cli.split.parse().context("Invalid split")?;

        let label_types = cli
            .label_types
            .iter()
            .map(|s| s.parse::<LabelType>())
            .collect::<crate::Result<Vec<_>>>()
            .context("Invalid label type")?;

        let mut builder = DatasetRequest::builder()
            .dataset(cli.dataset.clone())
            .split(split)
            .label_types(label_types)
            .only_matching(!cli.all_labels)
            .shuffle(cli.shuffle)
            .download_media(!cli.skip_media)
            .num_workers(cli.workers);

        if !cli.classes.is_empty() {
            builder = builder.classes(cli.classes.iter().map(|c| c.trim().to_string()));
        }
        if let Some(max_samples) = cli.max_samples {
            builder = builder.max_samples(max_samples);
        }
        if let Some(seed) = cli.seed {
            builder = builder.seed(seed);
        }

        builder.build().context("Invalid configuration")
    }

    /// Build the export request, if `--export` was given
    pub(crate) fn export_request(cli: &Cli) -> Result<Option<ExportRequest>> {
        let Some(path) = &cli.export else {
            return Ok(None);
        };

        let request = ExportRequest::builder(path)
            .format(cli.export_format.into())
            .label_field(cli.label_field.clone())
            .overwrite(cli.overwrite)
            .build()
            .context("Invalid export configuration")?;

        Ok(Some(request))
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.seed.is_some() && !cli.shuffle {
            anyhow::bail!("--seed has no effect without --shuffle");
        }

        if cli.overwrite && cli.export.is_none() {
            anyhow::bail!("--overwrite requires --export");
        }

        if cli.workers == 0 {
            anyhow::bail!("--workers must be at least 1");
        }

        Ok(())
    }
}
