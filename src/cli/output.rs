//! Output formatting for CLI commands.

use std::io::{self, Write};

use serde::Serialize;

use crate::category::CategoryLabel;
use crate::classifier::ClassProbability;
use crate::cli::args::{MailsiftArgs, OutputFormat};
use crate::error::Result;
use crate::pipeline::{Classification, Evidence, Outcome, Resolution};
use crate::training::{
    CaseSource, Exploration, IndexReport, LabelDistribution, TrainingReport, VerificationReport,
};

/// A command result that can be printed for people.
pub trait HumanReport {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> Result<()>;
}

/// Output a result in the requested format on stdout.
pub fn output_result<T: Serialize + HumanReport>(result: &T, args: &MailsiftArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(result, args, &mut out)
}

/// Output a result in the requested format on `out`.
pub fn write_result<T: Serialize + HumanReport>(
    result: &T,
    args: &MailsiftArgs,
    out: &mut dyn Write,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => result.write_human(out, args.verbosity())?,
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            writeln!(out, "{json}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_probabilities(out: &mut dyn Write, probabilities: &[ClassProbability]) -> Result<()> {
    let rendered: Vec<String> = probabilities
        .iter()
        .map(|p| format!("{}={:.3}", p.label, p.probability))
        .collect();
    writeln!(out, "    probabilities: {}", rendered.join(" "))?;
    Ok(())
}

impl HumanReport for Classification {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> Result<()> {
        writeln!(out, "{}", self.outcome)?;
        if verbosity < 2 {
            return Ok(());
        }

        if let Outcome::Resolved { resolution, .. } = &self.outcome {
            match resolution {
                Resolution::Heuristic { keyword } => {
                    writeln!(out, "  decided by keyword '{keyword}'")?;
                }
                Resolution::Fallback { strategy, evidence } => {
                    writeln!(out, "  decided by {strategy} fallback")?;
                    match evidence {
                        Evidence::Neighbors(vote) => {
                            for neighbor in &vote.neighbors {
                                writeln!(
                                    out,
                                    "    neighbor {} {} (distance {:.4})",
                                    neighbor.id, neighbor.category, neighbor.distance
                                )?;
                            }
                        }
                        Evidence::Probabilities(probabilities) => {
                            write_probabilities(out, probabilities)?;
                        }
                        Evidence::Opaque => {}
                    }
                }
            }
        }
        let trace: Vec<String> = self.trace.iter().map(|s| format!("{s:?}")).collect();
        writeln!(out, "  trace: {}", trace.join(" -> "))?;
        Ok(())
    }
}

impl HumanReport for LabelDistribution {
    fn write_human(&self, out: &mut dyn Write, _verbosity: u8) -> Result<()> {
        writeln!(out, "Label distribution ({} documents):", self.total)?;
        for label in CategoryLabel::ALL {
            let count = self.count(label);
            let share = if self.total == 0 {
                0.0
            } else {
                100.0 * count as f64 / self.total as f64
            };
            writeln!(out, "  {:<10} {count:>7} ({share:.1}%)", label.name())?;
        }
        Ok(())
    }
}

impl HumanReport for TrainingReport {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> Result<()> {
        self.distribution.write_human(out, verbosity)?;
        writeln!(out)?;
        writeln!(out, "Features: {}", self.n_features)?;
        writeln!(out, "Train/test rows: {}/{}", self.n_train, self.n_test)?;
        writeln!(
            out,
            "Iterations: {} (converged: {}, loss {:.6})",
            self.metadata.iterations, self.metadata.converged, self.metadata.final_loss
        )?;
        writeln!(out, "Accuracy: {:.4}", self.evaluation.accuracy)?;
        writeln!(out)?;
        writeln!(out, "Confusion matrix (rows actual, columns predicted):")?;
        write!(out, "{}", self.evaluation.confusion_matrix)?;
        writeln!(out)?;
        writeln!(
            out,
            "{:<10} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1", "support"
        )?;
        for metrics in &self.evaluation.per_class {
            writeln!(
                out,
                "{:<10} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                metrics.label.name(),
                metrics.precision,
                metrics.recall,
                metrics.f1,
                metrics.support
            )?;
        }
        Ok(())
    }
}

impl HumanReport for IndexReport {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> Result<()> {
        writeln!(
            out,
            "Indexed {} records (dimension {}, embedder {})",
            self.records, self.dimension, self.embedder
        )?;
        if verbosity > 1 {
            self.distribution.write_human(out, verbosity)?;
        }
        Ok(())
    }
}

impl HumanReport for VerificationReport {
    fn write_human(&self, out: &mut dyn Write, _verbosity: u8) -> Result<()> {
        for case in &self.cases {
            let verdict = if case.passed { "PASS" } else { "FAIL" };
            writeln!(out, "[{verdict}] {}", case.text)?;
            writeln!(
                out,
                "    expected {}, predicted {}",
                case.expected, case.predicted
            )?;
            match &case.source {
                CaseSource::Heuristic { keyword } => {
                    writeln!(out, "    decided by keyword '{keyword}'")?;
                }
                CaseSource::Model { probabilities } => write_probabilities(out, probabilities)?,
            }
        }
        writeln!(out, "{}/{} passed", self.passed(), self.cases.len())?;

        writeln!(out)?;
        writeln!(out, "Model-only predictions:")?;
        for probe in &self.probes {
            writeln!(out, "  {} => {}", probe.text, probe.prediction.label)?;
            write_probabilities(out, &probe.prediction.probabilities)?;
        }
        Ok(())
    }
}

impl HumanReport for Exploration {
    fn write_human(&self, out: &mut dyn Write, _verbosity: u8) -> Result<()> {
        self.write_csv(out)
    }
}

/// Printed after `explore` wrote its CSV to a file.
#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub rows: usize,
    pub n_features: usize,
    pub explained_variance: Vec<f64>,
}

impl HumanReport for ExportSummary {
    fn write_human(&self, out: &mut dyn Write, _verbosity: u8) -> Result<()> {
        writeln!(
            out,
            "Wrote {} rows to {} ({} features)",
            self.rows, self.path, self.n_features
        )?;
        let variance: Vec<String> = self
            .explained_variance
            .iter()
            .map(|v| format!("{v:.4}"))
            .collect();
        writeln!(out, "Explained variance: {}", variance.join(", "))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineState, UnclassifiedReason};
    use clap::Parser;

    fn args(extra: &[&str]) -> MailsiftArgs {
        let mut argv = vec!["mailsift"];
        argv.extend_from_slice(extra);
        argv.push("verify");
        MailsiftArgs::try_parse_from(argv).unwrap()
    }

    fn render<T: Serialize + HumanReport>(result: &T, args: &MailsiftArgs) -> String {
        let mut out = Vec::new();
        write_result(result, args, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unclassified_human_and_json() {
        let classification = Classification {
            outcome: Outcome::Unclassified {
                reason: UnclassifiedReason::FallbackUnavailable,
            },
            trace: vec![
                PipelineState::Start,
                PipelineState::HeuristicChecked,
                PipelineState::FallbackNeeded,
            ],
        };

        assert_eq!(
            render(&classification, &args(&[])),
            "unclassified (no fallback available)\n"
        );

        let json = render(&classification, &args(&["-f", "json"]));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"]["status"], "unclassified");
        assert_eq!(value["outcome"]["reason"], "fallback_unavailable");
        assert_eq!(value["trace"][2], "FallbackNeeded");
    }

    #[test]
    fn test_verbose_classification_shows_keyword_and_trace() {
        let classification = Classification {
            outcome: Outcome::Resolved {
                label: CategoryLabel::Urgent,
                resolution: Resolution::Heuristic {
                    keyword: "asap".into(),
                },
            },
            trace: vec![
                PipelineState::Start,
                PipelineState::HeuristicChecked,
                PipelineState::Resolved,
            ],
        };

        let text = render(&classification, &args(&["-vv"]));
        assert!(text.starts_with("Urgent\n"));
        assert!(text.contains("keyword 'asap'"));
        assert!(text.contains("Start -> HeuristicChecked -> Resolved"));
    }

    #[test]
    fn test_distribution_lists_every_label() {
        let distribution = LabelDistribution {
            total: 4,
            counts: vec![crate::training::LabelCount {
                label: CategoryLabel::General,
                count: 4,
            }],
        };

        let text = render(&distribution, &args(&[]));
        assert!(text.starts_with("Label distribution (4 documents):"));
        assert!(text.contains("Urgent"));
        assert!(text.contains("(100.0%)"));
        assert_eq!(text.lines().count(), 5);
    }
}
