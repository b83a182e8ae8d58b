//! htmlgrab - fetch a web page and save its markup as indented HTML
//!
//! The library is a three stage pipeline:
//!
//! - [`fetcher`] - a single GET with browser-like headers and a hard timeout
//! - [`normalize`] - tolerant HTML5 parsing and deterministic re-indentation
//! - [`sink`] - timestamped files, console preview and pass-through export
//!
//! [`Pipeline`] chains the stages for one address, and [`session`] holds the
//! state machine and background worker used by interactive front ends.
//!
//! ```no_run
//! # async fn demo() -> Result<(), htmlgrab::FetchError> {
//! use htmlgrab::{Address, Pipeline, SaveMode};
//!
//! let pipeline = Pipeline::builder().save_mode(SaveMode::Off).build();
//! let extraction = pipeline.run(Address::parse("example.com")?).await?;
//! println!("{}", htmlgrab::preview(&extraction.document, 800));
//! # Ok(())
//! # }
//! ```

mod address;
mod error;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod sink;
mod types;

use std::time::Duration;

pub use address::{normalize_scheme, Address, DEFAULT_SCHEME};
pub use error::{Error, ErrorKind, FetchError, SinkError};
pub use fetcher::{fetch, FetchOptions, Fetcher, HttpFetcher};
pub use normalize::{normalize, normalize_with, PrettyPrinter};
pub use pipeline::{Extraction, Phase, Pipeline, PipelineBuilder, PipelineStatus, SaveMode};
pub use session::{spawn_extraction, Session, Status};
pub use sink::{export, persist, persist_plain, preview, TRUNCATION_MARKER};
pub use types::{FetchResult, NormalizedDocument, SaveRecord};

/// User-Agent of a common desktop browser
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bound on a whole request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Spaces per nesting level in normalized output
pub const DEFAULT_INDENT: usize = 1;

/// Characters shown by the console preview
pub const DEFAULT_PREVIEW_CHARS: usize = 800;
