//! Interactive session state and background worker
//!
//! [`Session`] is a value: every handler takes it by value and returns the
//! next state, so the front end has a single place where state changes.
//! Extractions run on a tokio task and report back over a channel once the
//! whole pipeline has settled.

use crate::address::Address;
use crate::error::{Error, ErrorKind, SinkError};
use crate::pipeline::{Extraction, Pipeline};
use crate::sink;
use crate::types::{NormalizedDocument, SaveRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Text shown on the status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Working { address: Address },
    Extracted {
        characters: usize,
        lines: usize,
        words: usize,
        saved_to: Option<PathBuf>,
    },
    Saved { path: PathBuf },
    Exported,
    Cleared,
    Failed {
        kind: ErrorKind,
        message: String,
    },
    /// A request arrived while an extraction was in flight
    Busy,
    /// A document action was requested before any extraction succeeded
    NoDocument,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ready => write!(f, "Ready"),
            Status::Working { address } => write!(f, "Extracting {address}..."),
            Status::Extracted {
                characters,
                lines,
                words,
                saved_to,
            } => {
                write!(
                    f,
                    "Extracted: {characters} characters, {lines} lines, {words} words"
                )?;
                if let Some(path) = saved_to {
                    write!(f, " (saved to {})", path.display())?;
                }
                Ok(())
            }
            Status::Saved { path } => write!(f, "Saved: {}", path.display()),
            Status::Exported => write!(f, "Document exported"),
            Status::Cleared => write!(f, "Cleared, ready for a new extraction"),
            Status::Failed { kind, message } => write!(f, "Failed ({kind}): {message}"),
            Status::Busy => write!(f, "An extraction is already running"),
            Status::NoDocument => write!(f, "No document extracted yet"),
        }
    }
}

/// State of one interactive session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    address: Option<Address>,
    document: Option<NormalizedDocument>,
    status: Status,
    in_flight: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            address: None,
            document: None,
            status: Status::Ready,
            in_flight: false,
        }
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn document(&self) -> Option<&NormalizedDocument> {
        self.document.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// True while an extraction is outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Save, export and clear are available
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Accept an address for extraction
    ///
    /// Returns the validated address when the caller should start a job.
    /// While a job is outstanding the submission is refused.
    pub fn submit(mut self, input: &str) -> (Self, Option<Address>) {
        if self.in_flight {
            self.status = Status::Busy;
            return (self, None);
        }

        match Address::parse(input) {
            Ok(address) => {
                self.in_flight = true;
                self.status = Status::Working {
                    address: address.clone(),
                };
                (self, Some(address))
            }
            Err(e) => {
                self.status = Status::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                };
                (self, None)
            }
        }
    }

    /// Apply the settled outcome of a job
    ///
    /// A failure leaves the previous document in place.
    pub fn complete(mut self, outcome: Result<Extraction, Error>) -> Self {
        self.in_flight = false;
        match outcome {
            Ok(extraction) => {
                let doc = extraction.document;
                self.status = match extraction.saved {
                    Some(Err(e)) => Status::Failed {
                        kind: ErrorKind::Io,
                        message: e.to_string(),
                    },
                    saved => Status::Extracted {
                        characters: doc.character_count(),
                        lines: doc.line_count(),
                        words: doc.word_count(),
                        saved_to: saved.and_then(Result::ok).map(|record| record.path),
                    },
                };
                self.address = Some(extraction.address);
                self.document = Some(doc);
            }
            Err(e) => {
                self.status = Status::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                };
            }
        }
        self
    }

    /// Save the current document with the provenance header
    pub fn save(self, destination: Option<&Path>) -> (Self, Option<Result<SaveRecord, SinkError>>) {
        let outcome = match (&self.document, &self.address) {
            (Some(doc), Some(address)) if !self.in_flight => {
                Some(sink::persist(doc, address, destination))
            }
            _ => None,
        };
        let session = match &outcome {
            Some(result) => self.record_save(result),
            None => self.refuse(),
        };
        (session, outcome)
    }

    /// Note the result of a save done outside the session
    pub fn record_save(mut self, result: &Result<SaveRecord, SinkError>) -> Self {
        self.status = match result {
            Ok(record) => Status::Saved {
                path: record.path.clone(),
            },
            Err(e) => Status::Failed {
                kind: ErrorKind::Io,
                message: e.to_string(),
            },
        };
        self
    }

    /// Note that the document was handed to an export sink
    pub fn record_export(mut self) -> Self {
        self.status = if self.document.is_some() {
            Status::Exported
        } else {
            Status::NoDocument
        };
        self
    }

    /// Drop the current document and address
    pub fn clear(mut self) -> Self {
        if self.in_flight {
            self.status = Status::Busy;
            return self;
        }
        self.address = None;
        self.document = None;
        self.status = Status::Cleared;
        self
    }

    fn refuse(mut self) -> Self {
        self.status = if self.in_flight {
            Status::Busy
        } else {
            Status::NoDocument
        };
        self
    }
}

/// Settled outcome of a background extraction
pub type Completion = Result<Extraction, Error>;

/// Run `pipeline` for `address` on a tokio task
///
/// The outcome is sent on `tx` once the pipeline has settled. A panic in the
/// pipeline is reported as [`Error::Unexpected`].
pub fn spawn_extraction(
    pipeline: Arc<Pipeline>,
    address: Address,
    tx: mpsc::Sender<Completion>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let job = tokio::spawn(async move { pipeline.run(address).await });
        let completion = match job.await {
            Ok(result) => result.map_err(Error::from),
            Err(join_error) => {
                error!(error = %join_error, "Extraction task failed");
                Err(Error::Unexpected(join_error.to_string()))
            }
        };
        if tx.send(completion).await.is_err() {
            debug!("Session closed before extraction finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::Fetcher;
    use crate::pipeline::SaveMode;
    use crate::types::FetchResult;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticFetcher;

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, _address: &Address) -> Result<FetchResult, FetchError> {
            Ok(FetchResult::new("<p>Hi</p>", 200, "OK"))
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn fetch(&self, _address: &Address) -> Result<FetchResult, FetchError> {
            panic!("transport exploded");
        }
    }

    struct RefusingFetcher;

    #[async_trait]
    impl Fetcher for RefusingFetcher {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn fetch(&self, _address: &Address) -> Result<FetchResult, FetchError> {
            Err(FetchError::Http {
                status_code: 503,
                reason: "Service Unavailable".to_string(),
            })
        }
    }

    fn pipeline(fetcher: Arc<dyn Fetcher>) -> Arc<Pipeline> {
        Arc::new(
            Pipeline::builder()
                .fetcher(fetcher)
                .save_mode(SaveMode::Off)
                .build(),
        )
    }

    #[test]
    fn test_new_session_is_ready() {
        let session = Session::new();
        assert_eq!(session.status(), &Status::Ready);
        assert!(!session.is_busy());
        assert!(!session.has_document());
    }

    #[test]
    fn test_submit_gates_second_request() {
        let (session, address) = Session::new().submit("example.com");
        assert_eq!(address.unwrap().as_str(), "https://example.com");
        assert!(session.is_busy());

        let (session, second) = session.submit("example.org");
        assert!(second.is_none());
        assert_eq!(session.status(), &Status::Busy);
        assert!(session.is_busy());
    }

    #[test]
    fn test_submit_invalid_address() {
        let (session, address) = Session::new().submit("   ");
        assert!(address.is_none());
        assert!(!session.is_busy());
        assert!(matches!(
            session.status(),
            Status::Failed {
                kind: ErrorKind::Request,
                ..
            }
        ));
    }

    #[test]
    fn test_failure_keeps_previous_document() {
        let mut session = Session::new();
        session.document = Some(NormalizedDocument::new("<p>old</p>".to_string()));

        let (session, _) = session.submit("example.com");
        let session = session.complete(Err(Error::Unexpected("boom".to_string())));

        assert!(!session.is_busy());
        assert_eq!(session.document().unwrap().text(), "<p>old</p>");
        assert!(matches!(
            session.status(),
            Status::Failed {
                kind: ErrorKind::Unexpected,
                ..
            }
        ));
    }

    #[test]
    fn test_save_without_document_refused() {
        let (session, outcome) = Session::new().save(None);
        assert!(outcome.is_none());
        assert_eq!(session.status(), &Status::NoDocument);
    }

    #[test]
    fn test_save_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.html");

        let mut session = Session::new();
        session.address = Some(Address::parse("example.com").unwrap());
        session.document = Some(NormalizedDocument::new("<p>\n Hi\n</p>\n".to_string()));

        let (session, outcome) = session.save(Some(&path));
        assert_eq!(outcome.unwrap().unwrap().path, path);
        assert_eq!(session.status(), &Status::Saved { path: path.clone() });
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!-- HTML extraído de: https://example.com -->\n"));

        let session = session.clear();
        assert!(!session.has_document());
        assert!(session.address().is_none());
        assert_eq!(session.status(), &Status::Cleared);
    }

    #[test]
    fn test_clear_refused_while_busy() {
        let (session, _) = Session::new().submit("example.com");
        let session = session.clear();
        assert_eq!(session.status(), &Status::Busy);
        assert!(session.is_busy());
    }

    #[test]
    fn test_status_display() {
        let status = Status::Extracted {
            characters: 10,
            lines: 2,
            words: 3,
            saved_to: Some(PathBuf::from("out.html")),
        };
        assert_eq!(
            status.to_string(),
            "Extracted: 10 characters, 2 lines, 3 words (saved to out.html)"
        );
    }

    #[tokio::test]
    async fn test_worker_delivers_extraction() {
        let (tx, mut rx) = mpsc::channel(1);
        let (session, address) = Session::new().submit("example.com");

        spawn_extraction(pipeline(Arc::new(StaticFetcher)), address.unwrap(), tx);
        let completion = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();

        let session = session.complete(completion);
        assert!(!session.is_busy());
        assert!(session.has_document());
        assert_eq!(session.address().unwrap().as_str(), "https://example.com");
        let Status::Extracted { saved_to, .. } = session.status() else {
            panic!("unexpected status {:?}", session.status());
        };
        assert!(saved_to.is_none());
    }

    #[tokio::test]
    async fn test_worker_reports_http_error() {
        let (tx, mut rx) = mpsc::channel(1);
        let address = Address::parse("example.com").unwrap();

        spawn_extraction(pipeline(Arc::new(RefusingFetcher)), address, tx);
        let completion = rx.recv().await.unwrap();

        let err = completion.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.to_string(), "HTTP error 503: Service Unavailable");
    }

    #[tokio::test]
    async fn test_worker_turns_panic_into_unexpected() {
        let (tx, mut rx) = mpsc::channel(1);
        let address = Address::parse("example.com").unwrap();

        spawn_extraction(pipeline(Arc::new(PanickingFetcher)), address, tx);
        let completion = rx.recv().await.unwrap();

        assert_eq!(completion.unwrap_err().kind(), ErrorKind::Unexpected);
    }
}
