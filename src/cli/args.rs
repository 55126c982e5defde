//! Command line argument parsing for the mailsift CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::pipeline::FallbackStrategy;

/// mailsift - keyword-first email classification
#[derive(Parser, Debug, Clone)]
#[command(name = "mailsift")]
#[command(about = "Classify email into Urgent, Financial, HR or General")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct MailsiftArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Artifact directory, overriding the configured storage
    #[arg(long, value_name = "DIR", env = "MAILSIFT_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl MailsiftArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Classify one message
    Classify(ClassifyArgs),

    /// Train the supervised classifier and publish it
    Train(TrainArgs),

    /// Build the semantic index and publish it
    Index(IndexArgs),

    /// Count heuristic labels in a corpus sample
    Distribution(DistributionArgs),

    /// Run the built-in sentences through the trained classifier
    Verify(VerifyArgs),

    /// Project a corpus sample onto its principal components (CSV)
    Explore(ExploreArgs),
}

/// Arguments for classifying a message
#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    /// Body text to classify; reads a raw message from stdin when omitted
    #[arg(value_name = "TEXT", conflicts_with = "file")]
    pub text: Option<String>,

    /// Raw message file (headers, blank line, body)
    #[arg(long, value_name = "MESSAGE_FILE")]
    pub file: Option<PathBuf>,

    /// Fallback used when no keyword matches
    #[arg(long, value_enum, default_value_t = FallbackStrategy::Semantic)]
    pub fallback: FallbackStrategy,
}

/// Arguments shared by the corpus jobs
#[derive(Parser, Debug, Clone)]
pub struct CorpusArgs {
    /// Corpus file (CSV with a `message` column, or JSON lines)
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Maximum number of rows to read
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Fraction of rows held out for evaluation
    #[arg(long)]
    pub test_fraction: Option<f64>,
}

/// Arguments for building the semantic index
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Documents per embedding request
    #[arg(short, long)]
    pub batch_size: Option<usize>,
}

/// Arguments for the label distribution report
#[derive(Parser, Debug, Clone)]
pub struct DistributionArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,
}

/// Arguments for the smoke check
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {}

/// Arguments for the exploratory projection
#[derive(Parser, Debug, Clone)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Write the CSV here instead of stdout
    #[arg(short, long, value_name = "CSV_FILE")]
    pub output: Option<PathBuf>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
