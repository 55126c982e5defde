//! Reading raw message corpora and labeling them with the heuristic.
//!
//! Offline jobs never need the whole corpus: every read takes an optional
//! row cap and stops early once it is reached.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::error::{MailsiftError, Result};
use crate::heuristic::KeywordClassifier;
use crate::message::{MessageParser, ParsedDocument};

/// Name of the column (CSV) or field (JSON lines) holding the raw message.
pub const MESSAGE_FIELD: &str = "message";

/// On-disk layout of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusFormat {
    /// Comma-separated with a header row.
    Csv,
    /// One JSON object per line.
    Jsonl,
}

impl CorpusFormat {
    /// Guess the format from the file extension; anything unknown is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => CorpusFormat::Jsonl,
            _ => CorpusFormat::Csv,
        }
    }
}

/// One raw message and its zero-based row number in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRow {
    pub row: usize,
    pub message: String,
}

#[derive(Deserialize)]
struct JsonRow {
    message: String,
}

/// Reads raw messages from a corpus file.
#[derive(Debug, Clone)]
pub struct CorpusReader {
    path: PathBuf,
    format: CorpusFormat,
    limit: Option<usize>,
}

impl CorpusReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = CorpusFormat::from_path(&path);
        CorpusReader {
            path,
            format,
            limit: None,
        }
    }

    pub fn format(mut self, format: CorpusFormat) -> Self {
        self.format = format;
        self
    }

    /// Read at most `limit` rows.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Read the rows up to the cap.
    pub fn read(&self) -> Result<Vec<CorpusRow>> {
        if !self.path.is_file() {
            return Err(MailsiftError::training_data(format!(
                "corpus not found: {}",
                self.path.display()
            )));
        }

        let rows = match self.format {
            CorpusFormat::Csv => self.read_csv()?,
            CorpusFormat::Jsonl => self.read_jsonl()?,
        };
        info!("Loaded {} messages from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    fn cap(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }

    fn read_csv(&self) -> Result<Vec<CorpusRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let column = reader
            .headers()?
            .iter()
            .position(|header| header.trim() == MESSAGE_FIELD)
            .ok_or_else(|| {
                MailsiftError::training_data(format!(
                    "{} has no `{MESSAGE_FIELD}` column",
                    self.path.display()
                ))
            })?;

        let mut rows = Vec::new();
        for (row, record) in reader.records().take(self.cap()).enumerate() {
            let record = record?;
            let message = record.get(column).ok_or_else(|| {
                MailsiftError::training_data(format!("row {row} has no `{MESSAGE_FIELD}` value"))
            })?;
            rows.push(CorpusRow {
                row,
                message: message.to_string(),
            });
        }
        Ok(rows)
    }

    fn read_jsonl(&self) -> Result<Vec<CorpusRow>> {
        let reader = BufReader::new(File::open(&self.path)?);

        let mut rows = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            if rows.len() >= self.cap() {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JsonRow = serde_json::from_str(&line).map_err(|e| {
                MailsiftError::training_data(format!("line {}: {e}", line_number + 1))
            })?;
            rows.push(CorpusRow {
                row: rows.len(),
                message: parsed.message,
            });
        }
        Ok(rows)
    }
}

/// A parsed document with the label the heuristic gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub row: usize,
    pub document: ParsedDocument,
    pub label: CategoryLabel,
}

/// Parsed documents in corpus order, labeled by the keyword heuristic.
///
/// Documents the heuristic is uncertain about are labeled General.
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    examples: Vec<LabeledExample>,
}

impl LabeledDataset {
    pub fn from_rows(
        rows: Vec<CorpusRow>,
        parser: &MessageParser,
        heuristic: &KeywordClassifier,
    ) -> Self {
        let examples: Vec<LabeledExample> = rows
            .into_iter()
            .map(|row| {
                let document = parser.parse(&row.message);
                let label = heuristic.label(document.text());
                LabeledExample {
                    row: row.row,
                    document,
                    label,
                }
            })
            .collect();
        debug!("Labeled {} documents", examples.len());
        LabeledDataset { examples }
    }

    /// Drop documents whose body is empty.
    pub fn without_empty(self) -> Self {
        LabeledDataset {
            examples: self
                .examples
                .into_iter()
                .filter(|example| !example.document.is_empty())
                .collect(),
        }
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.document.text()).collect()
    }

    pub fn labels(&self) -> Vec<CategoryLabel> {
        self.examples.iter().map(|e| e.label).collect()
    }

    /// Number of documents per label, in precedence order.
    pub fn label_counts(&self) -> BTreeMap<CategoryLabel, usize> {
        let mut counts = BTreeMap::new();
        for example in &self.examples {
            *counts.entry(example.label).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CorpusFormat::from_path(Path::new("a.jsonl")), CorpusFormat::Jsonl);
        assert_eq!(CorpusFormat::from_path(Path::new("emails.CSV")), CorpusFormat::Csv);
        assert_eq!(CorpusFormat::from_path(Path::new("emails")), CorpusFormat::Csv);
    }

    #[test]
    fn test_read_csv_with_multiline_messages() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "emails.csv",
            "file,message\n\
             a/1,\"Subject: hi\n\nPlease pay the invoice.\"\n\
             a/2,\"Subject: lunch\n\nLunch tomorrow?\"\n\
             a/3,\"Subject: x\n\nthird\"\n",
        );

        let rows = CorpusReader::new(&path).limit(Some(2)).read().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 0);
        assert_eq!(rows[0].message, "Subject: hi\n\nPlease pay the invoice.");
    }

    #[test]
    fn test_csv_without_message_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.csv", "file,body\na,b\n");

        let err = CorpusReader::new(&path).read().unwrap_err();
        assert!(matches!(err, MailsiftError::TrainingData(_)));
    }

    #[test]
    fn test_read_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "emails.jsonl",
            "{\"message\": \"H: v\\n\\nbudget\", \"id\": 1}\n\n{\"message\": \"H: v\\n\\nhello\"}\n",
        );

        let rows = CorpusReader::new(&path).read().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row, 1);
        assert_eq!(rows[1].message, "H: v\n\nhello");
    }

    #[test]
    fn test_missing_corpus() {
        let err = CorpusReader::new("/nonexistent/emails.csv").read().unwrap_err();
        assert!(matches!(err, MailsiftError::TrainingData(_)));
    }

    #[test]
    fn test_labeled_dataset() {
        let rows = vec![
            CorpusRow {
                row: 0,
                message: "From: a\n\nThe quarterly report is attached.".into(),
            },
            CorpusRow {
                row: 1,
                message: "From: b\n\nSee you at lunch.".into(),
            },
            CorpusRow {
                row: 2,
                message: "no separator so no body".into(),
            },
        ];
        let dataset =
            LabeledDataset::from_rows(rows, &MessageParser::new(), &KeywordClassifier::new());

        assert_eq!(
            dataset.labels(),
            vec![
                CategoryLabel::Financial,
                CategoryLabel::General,
                CategoryLabel::General
            ]
        );
        assert_eq!(dataset.label_counts()[&CategoryLabel::General], 2);

        let non_empty = dataset.without_empty();
        assert_eq!(non_empty.len(), 2);
        assert_eq!(non_empty.texts()[1], "See you at lunch.");
    }
}
