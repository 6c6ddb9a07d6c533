use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::config::CategoryRule;
use crate::error::StageError;
use crate::pipeline::{JobMetadata, Stage};
use crate::storage::ArtifactStore;

/// Category assigned when no rule matches.
const FALLBACK_CATEGORY: &str = "general";

/// Minimum number of sentences for a document to count as prose.
const MIN_SENTENCES: usize = 2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategorySummary<'a> {
    document_id: &'a str,
    filename: &'a str,
    category: &'a str,
    sentence_count: usize,
    character_count: usize,
}

struct CompiledRule {
    category: String,
    keywords: Vec<Regex>,
}

/// Final pipeline stage: assigns a category to the extracted text by keyword
/// rules and writes a JSON summary as the job result.
pub struct CategorizeStage {
    artifacts: ArtifactStore,
    rules: Vec<CompiledRule>,
}

impl CategorizeStage {
    pub fn new(artifacts: ArtifactStore, rules: Vec<CategoryRule>) -> Self {
        // Keywords are matched on word boundaries, case-insensitive. Rules
        // are validated at config load, so compilation cannot fail here.
        let rules = rules
            .into_iter()
            .map(|rule| CompiledRule {
                category: rule.category,
                keywords: rule
                    .keywords
                    .iter()
                    .filter_map(|kw| {
                        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok()
                    })
                    .collect(),
            })
            .collect();
        Self { artifacts, rules }
    }

    fn categorize(&self, text: &str) -> &str {
        for rule in &self.rules {
            if rule.keywords.iter().any(|kw| kw.is_match(text)) {
                return &rule.category;
            }
        }
        FALLBACK_CATEGORY
    }
}

fn count_sentences(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, '.' | '!' | '?'))
        .count()
}

impl Stage for CategorizeStage {
    fn name(&self) -> &str {
        "categorize"
    }

    fn run(&self, artifact: &Path, meta: &JobMetadata) -> Result<PathBuf, StageError> {
        let text = std::fs::read_to_string(artifact).map_err(|source| {
            StageError::ReadArtifact {
                path: artifact.to_path_buf(),
                source,
            }
        })?;

        let sentences = count_sentences(&text);
        if sentences < MIN_SENTENCES {
            return Err(StageError::Rejected(
                "insufficient sentence structure".to_string(),
            ));
        }

        let summary = CategorySummary {
            document_id: &meta.job_id,
            filename: &meta.filename,
            category: self.categorize(&text),
            sentence_count: sentences,
            character_count: text.chars().count(),
        };
        let json = serde_json::to_vec_pretty(&summary)
            .map_err(|e| StageError::Rejected(format!("failed to encode summary: {e}")))?;

        let result = self
            .artifacts
            .write_result(&format!("{}.json", meta.job_id), &json)?;

        Ok(result)
    }
}
