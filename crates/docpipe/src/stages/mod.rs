//! Built-in pipeline stages: format validation, text extraction and
//! categorization. Each implements the [`Stage`](crate::pipeline::Stage)
//! contract; custom pipelines may mix them with their own stages.

pub mod categorize;
pub mod extract;
pub mod validate;

pub use categorize::CategorizeStage;
pub use extract::ExtractStage;
pub use validate::ValidateStage;

use crate::config::Config;
use crate::pipeline::Stage;
use crate::storage::ArtifactStore;

/// Document kinds the built-in stages understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Doc,
    Text,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "doc" => Some(DocumentKind::Doc),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename).extension()?.to_str()?;
        Self::from_extension(ext)
    }
}

/// The standard three-stage pipeline: validate → extract → categorize.
pub fn standard(config: &Config, artifacts: &ArtifactStore) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ValidateStage::new(
            config.max_upload_bytes,
            config.allowed_kinds.clone(),
        )),
        Box::new(ExtractStage::new(artifacts.clone())),
        Box::new(CategorizeStage::new(
            artifacts.clone(),
            config.category_rules.clone(),
        )),
    ]
}
