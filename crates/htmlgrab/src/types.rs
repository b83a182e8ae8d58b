//! Core types for htmlgrab

use crate::address::Address;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Raw body and transport metadata of one successful retrieval
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Response body as received (after transfer decompression)
    pub raw_bytes: Bytes,

    /// HTTP status code
    pub status_code: u16,

    /// Reason phrase for the status code
    pub reason_phrase: String,

    /// Body size in bytes
    pub byte_length: usize,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Address after transparent redirects
    pub final_url: String,
}

impl FetchResult {
    /// Build a result from a body, deriving `byte_length`
    pub fn new(
        raw_bytes: impl Into<Bytes>,
        status_code: u16,
        reason_phrase: impl Into<String>,
    ) -> Self {
        let raw_bytes = raw_bytes.into();
        Self {
            byte_length: raw_bytes.len(),
            raw_bytes,
            status_code,
            reason_phrase: reason_phrase.into(),
            content_type: None,
            final_url: String::new(),
        }
    }

    /// Set the Content-Type header value
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the address the body was finally served from
    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = final_url.into();
        self
    }
}

/// Indented markup plus size metrics
///
/// The metrics are computed once from `text` at construction and cannot be
/// changed independently of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedDocument {
    text: String,
    character_count: usize,
    line_count: usize,
    word_count: usize,
    encoding: &'static str,
}

impl NormalizedDocument {
    /// Wrap `text`, scanning it for the metrics
    pub fn new(text: String) -> Self {
        Self::with_encoding(text, "UTF-8")
    }

    pub(crate) fn with_encoding(text: String, encoding: &'static str) -> Self {
        let character_count = text.chars().count();
        let line_count = text.matches('\n').count();
        let word_count = text.split_whitespace().count();
        Self {
            text,
            character_count,
            line_count,
            word_count,
            encoding,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters (Unicode scalar values)
    pub fn character_count(&self) -> usize {
        self.character_count
    }

    /// Number of newline characters
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Number of whitespace-delimited tokens
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Name of the character encoding the body was decoded from
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Where and when a document was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRecord {
    pub path: PathBuf,
    pub source_address: Address,
    pub timestamp_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_metrics() {
        let doc = NormalizedDocument::new("a b\nc".to_string());
        assert_eq!(doc.word_count(), 3);
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.character_count(), 5);
    }

    #[test]
    fn test_document_metrics_count_chars_not_bytes() {
        let doc = NormalizedDocument::new("<p>\n extraído\n</p>\n".to_string());
        assert_eq!(doc.character_count(), doc.text().chars().count());
        assert_ne!(doc.character_count(), doc.text().len());
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.word_count(), 3);
    }

    #[test]
    fn test_empty_document() {
        let doc = NormalizedDocument::new(String::new());
        assert_eq!(doc.character_count(), 0);
        assert_eq!(doc.line_count(), 0);
        assert_eq!(doc.word_count(), 0);
        assert_eq!(doc.encoding(), "UTF-8");
    }

    #[test]
    fn test_fetch_result_byte_length() {
        let result = FetchResult::new("<html></html>", 200, "OK")
            .with_content_type("text/html")
            .with_final_url("https://example.com/");
        assert_eq!(result.byte_length, 13);
        assert_eq!(result.content_type.as_deref(), Some("text/html"));
        assert_eq!(result.final_url, "https://example.com/");
    }

    #[test]
    fn test_document_serialization() {
        let doc = NormalizedDocument::new("<p>\n</p>\n".to_string());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["line_count"], 2);
        assert_eq!(json["encoding"], "UTF-8");
    }
}
