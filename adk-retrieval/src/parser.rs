//! Document parsing upstream of the chunker.
//!
//! Parsing arbitrary formats (PDF, HTML) is left to external collaborators
//! implementing [`DocumentParser`]; [`PlainTextParser`] reads UTF-8 text files.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{Result, RetrievalError};
use crate::value::Metadata;

/// Extracted text content and metadata of one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub content: String,
    pub metadata: Metadata,
}

/// Turns a file into text for chunking.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse the file at `path`.
    ///
    /// Failures are reported as [`RetrievalError::ProviderFailure`].
    async fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

/// Reads a file as UTF-8 text.
///
/// Metadata carries `source` (the path) and, when present, `file_name` and `extension`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::provider("plain_text_parser", format!("{}: {e}", path.display()))
        })?;

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), path.display().to_string().into());
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.into());
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            metadata.insert("extension".to_string(), ext.into());
        }
        Ok(ParsedDocument { content, metadata })
    }
}
