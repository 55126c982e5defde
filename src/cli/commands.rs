//! Command implementations for the mailsift CLI.

use std::fs::File;
use std::io::{self, BufWriter, Read};

use log::{debug, info};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::MailsiftConfig;
use crate::error::{MailsiftError, Result};
use crate::pipeline::{ClassificationPipeline, load_classifier_bundle, load_fallback};
use crate::storage::CLASSIFIER_ARTIFACT;
use crate::training;

/// Execute a CLI command.
pub async fn execute_command(args: MailsiftArgs) -> Result<()> {
    let config = load_config(&args)?;

    match &args.command {
        Command::Classify(classify_args) => classify(classify_args, &config, &args).await,
        Command::Train(train_args) => train(train_args, config, &args),
        Command::Index(index_args) => index(index_args, config, &args).await,
        Command::Distribution(distribution_args) => {
            distribution(distribution_args, config, &args)
        }
        Command::Verify(_) => verify(&config, &args),
        Command::Explore(explore_args) => explore(explore_args, config, &args),
    }
}

/// Read the configuration file, if any, and apply global overrides.
pub fn load_config(args: &MailsiftArgs) -> Result<MailsiftConfig> {
    let mut config = match &args.config {
        Some(path) => MailsiftConfig::load(path)?,
        None => MailsiftConfig::default(),
    };
    if let Some(directory) = &args.artifacts {
        config = config.with_artifact_dir(directory.clone());
    }
    debug!("Storage backend: {:?}", config.storage.backend);
    Ok(config)
}

async fn classify(
    args: &ClassifyArgs,
    config: &MailsiftConfig,
    cli_args: &MailsiftArgs,
) -> Result<()> {
    let store = config.artifact_store()?;
    let fallback = load_fallback(args.fallback, &store, config)?;
    let pipeline = ClassificationPipeline::new(config.keyword_classifier()?, fallback);

    let classification = match (&args.text, &args.file) {
        (Some(text), _) => pipeline.classify(text).await,
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path)?;
            pipeline.classify_message(&raw).await
        }
        (None, None) => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            pipeline.classify_message(&raw).await
        }
    };

    output_result(&classification, cli_args)
}

fn train(args: &TrainArgs, mut config: MailsiftConfig, cli_args: &MailsiftArgs) -> Result<()> {
    if args.corpus.limit.is_some() {
        config.training.row_limit = args.corpus.limit;
    }
    if let Some(fraction) = args.test_fraction {
        config.training.test_fraction = fraction;
    }
    config.validate()?;

    let store = config.artifact_store()?;
    let report = training::train_classifier(&config, &store, &args.corpus.corpus)?;
    info!("Published {CLASSIFIER_ARTIFACT}");
    output_result(&report, cli_args)
}

async fn index(args: &IndexArgs, mut config: MailsiftConfig, cli_args: &MailsiftArgs) -> Result<()> {
    if args.corpus.limit.is_some() {
        config.index.row_limit = args.corpus.limit;
    }
    if let Some(batch_size) = args.batch_size {
        config.index.batch_size = batch_size;
    }
    config.validate()?;

    let store = config.artifact_store()?;
    let embedder = config.embedder()?;
    let report =
        training::build_semantic_index(&config, &store, &args.corpus.corpus, embedder.as_ref())
            .await?;
    output_result(&report, cli_args)
}

fn distribution(
    args: &DistributionArgs,
    mut config: MailsiftConfig,
    cli_args: &MailsiftArgs,
) -> Result<()> {
    if args.corpus.limit.is_some() {
        config.training.distribution_row_limit = args.corpus.limit;
    }
    config.validate()?;

    let report = training::label_distribution(&config, &args.corpus.corpus)?;
    output_result(&report, cli_args)
}

fn verify(config: &MailsiftConfig, cli_args: &MailsiftArgs) -> Result<()> {
    let store = config.artifact_store()?;
    let bundle = load_classifier_bundle(&store)?
        .ok_or_else(|| MailsiftError::artifact_missing(CLASSIFIER_ARTIFACT))?;
    let report = training::verify_cases(&config.keyword_classifier()?, &bundle)?;
    output_result(&report, cli_args)
}

fn explore(args: &ExploreArgs, mut config: MailsiftConfig, cli_args: &MailsiftArgs) -> Result<()> {
    if args.corpus.limit.is_some() {
        config.features.explore_row_limit = args.corpus.limit;
    }
    config.validate()?;

    let exploration = training::explore(&config, &args.corpus.corpus)?;
    match &args.output {
        Some(path) => {
            exploration.write_csv(BufWriter::new(File::create(path)?))?;
            let summary = ExportSummary {
                path: path.display().to_string(),
                rows: exploration.points.len(),
                n_features: exploration.n_features,
                explained_variance: exploration.explained_variance.clone(),
            };
            output_result(&summary, cli_args)
        }
        None => output_result(&exploration, cli_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> MailsiftArgs {
        MailsiftArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_artifacts_flag_overrides_storage() {
        let dir = TempDir::new().unwrap();
        let artifacts = dir.path().join("out");
        let args = parse(&[
            "mailsift",
            "--artifacts",
            artifacts.to_str().unwrap(),
            "verify",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(
            config.storage.backend,
            crate::storage::StorageBackend::File {
                directory: artifacts
            }
        );
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["mailsift", "--config", "/nonexistent/mailsift.json", "verify"]);
        assert!(matches!(
            load_config(&args),
            Err(MailsiftError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_without_model_fails() {
        let dir = TempDir::new().unwrap();
        let args = parse(&[
            "mailsift",
            "--artifacts",
            dir.path().to_str().unwrap(),
            "verify",
        ]);

        let err = execute_command(args).await.unwrap_err();
        assert!(err.is_missing_artifact());
    }

    #[tokio::test]
    async fn test_classify_without_artifacts_succeeds() {
        let dir = TempDir::new().unwrap();
        let args = parse(&[
            "mailsift",
            "-q",
            "--artifacts",
            dir.path().to_str().unwrap(),
            "classify",
            "Please pay the invoice",
        ]);

        execute_command(args).await.unwrap();
    }
}
