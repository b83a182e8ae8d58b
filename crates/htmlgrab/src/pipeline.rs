//! Pipeline builder and contract for htmlgrab
//!
//! Chains fetch, normalize and save for one address. Fetch failures end the
//! run; a save failure is recorded on the [`Extraction`] so the document is
//! never lost.

use crate::address::Address;
use crate::error::{FetchError, SinkError};
use crate::fetcher::{FetchOptions, Fetcher, HttpFetcher};
use crate::normalize::{normalize_with, PrettyPrinter};
use crate::sink::{persist_at, SaveFormat};
use crate::types::{NormalizedDocument, SaveRecord};
use crate::{DEFAULT_INDENT, DEFAULT_TIMEOUT};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Stage reached by a running pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Normalize,
    Save,
    Complete,
}

/// Status update during a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub phase: Phase,
    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PipelineStatus {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            message: None,
        }
    }

    /// Set message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// What happens to a document after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Keep the document in memory only
    Off,
    /// Write the document text alone
    #[default]
    Plain,
    /// Write the provenance header before the text
    WithProvenance,
}

/// Outcome of one successful pipeline run
#[derive(Debug)]
pub struct Extraction {
    pub address: Address,
    /// Address after redirects
    pub final_url: String,
    pub status_code: u16,
    pub reason: String,
    /// Size of the fetched body
    pub byte_length: usize,
    pub document: NormalizedDocument,
    /// `None` when saving was off
    pub saved: Option<Result<SaveRecord, SinkError>>,
}

/// Builder for configuring a [`Pipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    fetcher: Option<Arc<dyn Fetcher>>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    indent: Option<usize>,
    save_mode: SaveMode,
    destination: Option<PathBuf>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom transport instead of [`HttpFetcher`]
    ///
    /// `user_agent` and `timeout` only configure the default transport.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Bound on the whole request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spaces per nesting level in the output
    pub fn indent(mut self, width: usize) -> Self {
        self.indent = Some(width);
        self
    }

    pub fn save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    /// Output path; a timestamped name in the current directory otherwise
    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(FetchOptions {
                user_agent: self.user_agent,
                timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            })),
        };

        Pipeline {
            fetcher,
            printer: PrettyPrinter::new(self.indent.unwrap_or(DEFAULT_INDENT)),
            save_mode: self.save_mode,
            destination: self.destination,
        }
    }
}

/// Configured fetch, normalize and save pipeline
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    printer: PrettyPrinter,
    save_mode: SaveMode,
    destination: Option<PathBuf>,
}

impl Default for Pipeline {
    fn default() -> Self {
        PipelineBuilder::new().build()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetcher", &self.fetcher.name())
            .field("printer", &self.printer)
            .field("save_mode", &self.save_mode)
            .field("destination", &self.destination)
            .finish()
    }
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    /// Configured output path, if any
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Run the pipeline for `address`
    pub async fn run(&self, address: Address) -> Result<Extraction, FetchError> {
        self.run_with_status(address, |_| {}).await
    }

    /// Run the pipeline with status updates
    pub async fn run_with_status<F>(
        &self,
        address: Address,
        mut status_callback: F,
    ) -> Result<Extraction, FetchError>
    where
        F: FnMut(PipelineStatus),
    {
        status_callback(PipelineStatus::new(Phase::Fetch).with_message(address.to_string()));
        info!(url = %address, fetcher = self.fetcher.name(), "Fetching");
        let result = self.fetcher.fetch(&address).await?;

        let status_code = result.status_code;
        let reason = result.reason_phrase.clone();
        let byte_length = result.byte_length;
        let final_url = if result.final_url.is_empty() {
            address.to_string()
        } else {
            result.final_url.clone()
        };

        status_callback(
            PipelineStatus::new(Phase::Normalize).with_message(format!("{byte_length} bytes")),
        );
        let document = normalize_with(result, &self.printer);

        let saved = match self.save_mode {
            SaveMode::Off => None,
            SaveMode::Plain | SaveMode::WithProvenance => {
                status_callback(PipelineStatus::new(Phase::Save));
                let format = if self.save_mode == SaveMode::Plain {
                    SaveFormat::Plain
                } else {
                    SaveFormat::WithProvenance
                };
                let outcome = persist_at(
                    &document,
                    &address,
                    self.destination.as_deref(),
                    format,
                    Local::now(),
                );
                if let Err(ref e) = outcome {
                    warn!(error = %e, "Save failed, document kept in memory");
                }
                Some(outcome)
            }
        };

        status_callback(PipelineStatus::new(Phase::Complete));

        Ok(Extraction {
            address,
            final_url,
            status_code,
            reason,
            byte_length,
            document,
            saved,
        })
    }
}
