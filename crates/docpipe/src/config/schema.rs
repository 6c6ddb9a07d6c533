use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Keyword rule mapping matched documents to a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Root directory for spooled uploads and result artifacts.
    pub spool_directory: PathBuf,
    /// SQLite database path. When absent, jobs live in memory only.
    pub database_path: Option<PathBuf>,
    /// Number of worker threads executing jobs.
    pub worker_count: usize,
    /// Accepted upload extensions (lowercase, no dot).
    pub allowed_kinds: Vec<String>,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Capacity of the progress broadcast channel.
    pub broadcast_capacity: usize,
    /// Categorization rules, checked in order.
    pub category_rules: Vec<CategoryRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spool_directory: PathBuf::from("spool"),
            database_path: None,
            worker_count: num_cpus::get(),
            allowed_kinds: default_allowed_kinds(),
            max_upload_bytes: 10 * 1024 * 1024,
            broadcast_capacity: 100,
            category_rules: default_category_rules(),
        }
    }
}

pub fn default_allowed_kinds() -> Vec<String> {
    ["pdf", "docx", "doc", "txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_category_rules() -> Vec<CategoryRule> {
    let rule = |category: &str, keywords: &[&str]| CategoryRule {
        category: category.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    };
    vec![
        rule("contract", &["contract", "agreement", "party", "clause"]),
        rule("invoice", &["invoice", "payment", "amount due"]),
        rule(
            "court-filing",
            &["court", "judgment", "plaintiff", "defendant"],
        ),
    ]
}
