//! Output sinks: files, console preview and pass-through export

use crate::address::Address;
use crate::error::SinkError;
use crate::types::{NormalizedDocument, SaveRecord};
use chrono::{DateTime, Local, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Marker appended to a truncated preview
pub const TRUNCATION_MARKER: &str = "\n\n... (content truncated for preview)";

/// Prefix of generated output file names
const FILE_PREFIX: &str = "html_extraido_";

/// Whether a saved file starts with the provenance header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// Document text only
    Plain,
    /// Source address and timestamp comments, blank line, document text
    WithProvenance,
}

/// Default output file name for a save at `now`
pub fn default_file_name(now: &DateTime<Local>) -> String {
    format!("{FILE_PREFIX}{}.html", now.format("%Y%m%d_%H%M%S"))
}

/// The two provenance comment lines, each terminated by a newline
pub fn provenance_header(address: &Address, now: &DateTime<Local>) -> String {
    format!(
        "<!-- HTML extraído de: {address} -->\n<!-- Data: {} -->\n",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Save with the provenance header
///
/// Without a destination the file is created in the current directory
/// under [`default_file_name`].
pub fn persist(
    doc: &NormalizedDocument,
    address: &Address,
    destination: Option<&Path>,
) -> Result<SaveRecord, SinkError> {
    persist_at(
        doc,
        address,
        destination,
        SaveFormat::WithProvenance,
        Local::now(),
    )
}

/// Save the document text without a header
pub fn persist_plain(
    doc: &NormalizedDocument,
    address: &Address,
    destination: Option<&Path>,
) -> Result<SaveRecord, SinkError> {
    persist_at(doc, address, destination, SaveFormat::Plain, Local::now())
}

/// Save with an explicit format and clock reading
pub fn persist_at(
    doc: &NormalizedDocument,
    address: &Address,
    destination: Option<&Path>,
    format: SaveFormat,
    now: DateTime<Local>,
) -> Result<SaveRecord, SinkError> {
    let path = match destination {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_file_name(&now)),
    };

    write_file(&path, doc, address, format, &now).map_err(|source| SinkError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), chars = doc.character_count(), "Saved document");

    Ok(SaveRecord {
        path,
        source_address: address.clone(),
        timestamp_utc: now.with_timezone(&Utc),
    })
}

fn write_file(
    path: &Path,
    doc: &NormalizedDocument,
    address: &Address,
    format: SaveFormat,
    now: &DateTime<Local>,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if format == SaveFormat::WithProvenance {
        writer.write_all(provenance_header(address, now).as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.write_all(doc.text().as_bytes())?;
    writer.flush()
}

/// First `max_chars` characters of the document
///
/// Cut at a character boundary with no word trimming; [`TRUNCATION_MARKER`]
/// is appended only when something was cut.
pub fn preview(doc: &NormalizedDocument, max_chars: usize) -> String {
    let text = doc.text();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}

/// Write the document text unchanged to `writer`
///
/// Used for stdout and for editable surfaces or clipboards supplied by the
/// caller as writers.
pub fn export<W: Write>(doc: &NormalizedDocument, mut writer: W) -> std::io::Result<()> {
    writer.write_all(doc.text().as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn address() -> Address {
        Address::parse("example.com").unwrap()
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(
            default_file_name(&fixed_now()),
            "html_extraido_20240309_140507.html"
        );
    }

    #[test]
    fn test_provenance_header() {
        assert_eq!(
            provenance_header(&address(), &fixed_now()),
            "<!-- HTML extraído de: https://example.com -->\n<!-- Data: 2024-03-09 14:05:07 -->\n"
        );
    }

    #[test]
    fn test_persist_with_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let doc = NormalizedDocument::new("<html>\n</html>\n".to_string());

        let record = persist_at(
            &doc,
            &address(),
            Some(&path),
            SaveFormat::WithProvenance,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(record.path, path);
        assert_eq!(record.source_address, address());
        assert_eq!(record.timestamp_utc, fixed_now().with_timezone(&Utc));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "<!-- HTML extraído de: https://example.com -->\n<!-- Data: 2024-03-09 14:05:07 -->\n\n<html>\n</html>\n"
        );
    }

    #[test]
    fn test_persist_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.html");
        let doc = NormalizedDocument::new("<p>\n olá\n</p>\n".to_string());

        persist_plain(&doc, &address(), Some(&path)).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.text());
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.html");
        std::fs::write(&path, "old content that is longer than the new one").unwrap();

        let doc = NormalizedDocument::new("new".to_string());
        persist_plain(&doc, &address(), Some(&path)).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_persist_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.html");
        let doc = NormalizedDocument::new("x".to_string());

        let err = persist(&doc, &address(), Some(&path)).unwrap_err();
        let SinkError::Io { path: failed, .. } = err;
        assert_eq!(failed, path);
    }

    #[test]
    fn test_preview_truncates() {
        let text: String = "abcdefghij".repeat(100);
        let doc = NormalizedDocument::new(text.clone());

        let first = preview(&doc, 800);
        assert_eq!(first, format!("{}{}", &text[..800], TRUNCATION_MARKER));
        assert_eq!(preview(&doc, 800), first);
    }

    #[test]
    fn test_preview_short_document_untouched() {
        let doc = NormalizedDocument::new("short".to_string());
        assert_eq!(preview(&doc, 800), "short");

        let exact = NormalizedDocument::new("12345".to_string());
        assert_eq!(preview(&exact, 5), "12345");
    }

    #[test]
    fn test_preview_counts_characters() {
        let doc = NormalizedDocument::new("ééééé".to_string());
        assert_eq!(preview(&doc, 2), format!("éé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_export_passes_text_through() {
        let doc = NormalizedDocument::new("<p>\n a & b\n</p>\n".to_string());
        let mut buffer = Vec::new();
        export(&doc, &mut buffer).unwrap();
        assert_eq!(buffer, doc.text().as_bytes());
    }
}
