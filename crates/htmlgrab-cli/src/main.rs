//! htmlgrab CLI - fetch a page and save its markup as indented HTML

mod interactive;

use clap::{Parser, ValueEnum};
use htmlgrab::{
    preview, Address, Error, ErrorKind, Extraction, FetchError, Phase, Pipeline, PipelineStatus,
    SaveMode, SinkError, DEFAULT_INDENT, DEFAULT_PREVIEW_CHARS, DEFAULT_SCHEME,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const RULE: &str = "==================================================";

/// Output format for the run summary
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Progress lines, summary and preview
    #[default]
    Text,
    /// JSON summary
    Json,
}

/// htmlgrab - fetch a web page and save its markup as indented HTML
#[derive(Parser, Debug)]
#[command(name = "htmlgrab")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:\n  htmlgrab https://example.com\n  htmlgrab --no-save example.com\n  htmlgrab --no-preview example.com\n  htmlgrab --interactive")]
struct Cli {
    /// Address to fetch; asked for on stdin when omitted
    address: Option<String>,

    /// Do not save the markup to a file
    #[arg(long)]
    no_save: bool,

    /// Do not print the preview
    #[arg(long)]
    no_preview: bool,

    /// Output file (default: html_extraido_<timestamp>.html)
    #[arg(long, short = 'o')]
    output_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Spaces per nesting level
    #[arg(long, default_value_t = DEFAULT_INDENT)]
    indent: usize,

    /// Characters shown in the preview
    #[arg(long, default_value_t = DEFAULT_PREVIEW_CHARS)]
    preview_chars: usize,

    /// Custom User-Agent
    #[arg(long)]
    user_agent: Option<String>,

    /// Summary format
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Log debug details to stderr
    #[arg(long, short)]
    verbose: bool,

    /// Start an interactive session
    #[arg(long, short)]
    interactive: bool,
}

impl Cli {
    fn pipeline(&self, save_mode: SaveMode) -> Pipeline {
        let mut builder = Pipeline::builder()
            .timeout(Duration::from_secs(self.timeout))
            .indent(self.indent)
            .save_mode(save_mode);

        if let Some(ref ua) = self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(ref path) = self.output_file {
            builder = builder.destination(path.clone());
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.interactive {
        let save_mode = if cli.no_save {
            SaveMode::Off
        } else {
            SaveMode::WithProvenance
        };
        interactive::run(Arc::new(cli.pipeline(save_mode)), cli.preview_chars).await;
        return;
    }

    let text = matches!(cli.format, OutputFormat::Text);
    let input = match cli.address.clone() {
        Some(address) => address,
        None => prompt_address(text).await,
    };

    if text && input.trim().is_empty() {
        eprintln!("Error: no address given");
        eprintln!("Usage: htmlgrab <ADDRESS>");
        eprintln!("   or: htmlgrab --help");
        std::process::exit(1);
    }

    let address = match Address::parse(&input) {
        Ok(address) => address,
        Err(e) => {
            let error = Error::from(e);
            if text {
                eprintln!("{}", describe_error(&error));
            } else {
                print_json(&Report::failure(input.trim(), &error));
            }
            std::process::exit(1);
        }
    };

    if text && address.as_str() != input.trim() {
        writeln_safe(&format!("Adding '{DEFAULT_SCHEME}' to the address"));
    }

    let save_mode = if cli.no_save {
        SaveMode::Off
    } else {
        SaveMode::Plain
    };

    if !run_extract(&cli, cli.pipeline(save_mode), address).await {
        std::process::exit(1);
    }
}

/// Log filter comes from the flag only; the environment is not consulted
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("htmlgrab=debug,warn")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Read one address line; the prompt is only shown for text output
async fn prompt_address(show_prompt: bool) -> String {
    if show_prompt {
        writeln_safe("Paste the address:");
        print!("URL: ");
        let _ = io::stdout().flush();
    }

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    match stdin.read_line(&mut line).await {
        Ok(_) => line.trim().to_string(),
        Err(_) => String::new(),
    }
}

/// Run the pipeline and print the outcome; false on any failure
async fn run_extract(cli: &Cli, pipeline: Pipeline, address: Address) -> bool {
    let text = matches!(cli.format, OutputFormat::Text);
    if text {
        writeln_safe(&format!("Fetching: {address}"));
        writeln_safe(&"-".repeat(RULE.len()));
    }

    let result = pipeline
        .run_with_status(address.clone(), |status| {
            if text {
                if let Some(line) = progress_line(&status) {
                    writeln_safe(line);
                }
            }
        })
        .await;

    match (result, cli.format) {
        (Ok(extraction), OutputFormat::Text) => {
            let saved_ok = !matches!(extraction.saved, Some(Err(_)));
            writeln_safe(&format_summary(&extraction));
            if !cli.no_preview {
                writeln_safe(&format_preview(&extraction, cli.preview_chars));
            }
            if saved_ok {
                writeln_safe("\nExtraction completed successfully.");
            } else {
                writeln_safe("\nExtraction completed, but the file could not be saved.");
            }
            saved_ok
        }
        (Ok(extraction), OutputFormat::Json) => {
            let saved_ok = !matches!(extraction.saved, Some(Err(_)));
            let preview_chars = (!cli.no_preview).then_some(cli.preview_chars);
            print_json(&Report::success(&extraction, preview_chars));
            saved_ok
        }
        (Err(e), OutputFormat::Text) => {
            eprintln!("{}", describe_error(&Error::from(e)));
            eprintln!("\nExtraction failed.");
            false
        }
        (Err(e), OutputFormat::Json) => {
            print_json(&Report::failure(address.as_str(), &Error::from(e)));
            false
        }
    }
}

fn progress_line(status: &PipelineStatus) -> Option<&'static str> {
    match status.phase {
        Phase::Fetch => Some("Sending HTTP request..."),
        Phase::Normalize => Some("Parsing HTML..."),
        Phase::Save => Some("Saving file..."),
        Phase::Complete => None,
    }
}

/// Human readable message for each error kind
fn describe_error(error: &Error) -> String {
    match error {
        Error::Fetch(FetchError::Http {
            status_code,
            reason,
        }) => format!("HTTP error {status_code}: {reason}"),
        Error::Save(e) => describe_save_error(e),
        Error::Unexpected(_) => error.to_string(),
        Error::Fetch(e) => match e.kind() {
            ErrorKind::Timeout => format!("Timeout: the request took too long ({e})"),
            ErrorKind::Connection => {
                "Connection error: check your internet connection or the address".to_string()
            }
            ErrorKind::Request => format!("Error accessing URL: {e}"),
            _ => format!("Unexpected error: {e}"),
        },
    }
}

fn describe_save_error(error: &SinkError) -> String {
    format!("Could not save file: {error}")
}

/// Status, size and save details of a successful run
fn format_summary(extraction: &Extraction) -> String {
    let doc = &extraction.document;
    let mut output = String::new();

    output.push_str(&format!(
        "Status: {} {}\n",
        extraction.status_code, extraction.reason
    ));
    if extraction.final_url != extraction.address.as_str() {
        output.push_str(&format!("Redirected to: {}\n", extraction.final_url));
    }
    output.push_str(&format!(
        "Response size: {} bytes\n",
        group_thousands(extraction.byte_length)
    ));

    match &extraction.saved {
        Some(Ok(record)) => {
            output.push_str(&format!("\nHTML saved to: {}\n", record.path.display()));
            output.push_str(&format!(
                "Size: {} characters\n",
                group_thousands(doc.character_count())
            ));
            let location =
                std::fs::canonicalize(&record.path).unwrap_or_else(|_| record.path.clone());
            output.push_str(&format!("Location: {}", location.display()));
        }
        Some(Err(e)) => {
            output.push_str(&format!("\n{}", describe_save_error(e)));
        }
        None => {
            output.push_str(&format!(
                "Size: {} characters, {} lines, {} words",
                group_thousands(doc.character_count()),
                group_thousands(doc.line_count()),
                group_thousands(doc.word_count())
            ));
        }
    }

    output
}

/// Preview framed by rule lines
fn format_preview(extraction: &Extraction, max_chars: usize) -> String {
    let mut output = String::new();
    output.push('\n');
    output.push_str(RULE);
    output.push_str(&format!("\nPREVIEW (first {max_chars} characters):\n"));
    output.push_str(RULE);
    output.push('\n');
    output.push_str(&preview(&extraction.document, max_chars));
    output.push('\n');
    output.push_str(RULE);
    output
}

/// Format a count with comma thousands separators
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Machine readable run summary
#[derive(Debug, Serialize)]
struct Report {
    url: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    characters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    words: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Report {
    fn success(extraction: &Extraction, preview_chars: Option<usize>) -> Self {
        let doc = &extraction.document;
        let (saved_to, error_kind, error) = match &extraction.saved {
            Some(Ok(record)) => (Some(record.path.clone()), None, None),
            Some(Err(e)) => (None, Some(ErrorKind::Io), Some(e.to_string())),
            None => (None, None, None),
        };
        Self {
            url: extraction.address.to_string(),
            success: error.is_none(),
            final_url: Some(extraction.final_url.clone()),
            status_code: Some(extraction.status_code),
            size: Some(extraction.byte_length),
            characters: Some(doc.character_count()),
            lines: Some(doc.line_count()),
            words: Some(doc.word_count()),
            encoding: Some(doc.encoding()),
            saved_to,
            preview: preview_chars.map(|n| preview(doc, n)),
            error_kind,
            error,
        }
    }

    /// `url` is the address as given when it could not be parsed
    fn failure(url: &str, error: &Error) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            final_url: None,
            status_code: None,
            size: None,
            characters: None,
            lines: None,
            words: None,
            encoding: None,
            saved_to: None,
            preview: None,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }
}

fn print_json(report: &Report) {
    let json = serde_json::to_string_pretty(report).unwrap_or_else(|e| {
        eprintln!("Error serializing report: {}", e);
        std::process::exit(1);
    });
    writeln_safe(&json);
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
