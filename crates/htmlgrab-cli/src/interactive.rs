//! Line oriented interactive session
//!
//! Each input line is either an address or a `:command`. Extractions run in
//! the background; this loop is the only place the session state changes.

use htmlgrab::session::Completion;
use htmlgrab::{export, preview, spawn_extraction, Pipeline, Session, Status};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

const HELP: &str = "Enter an address to extract its HTML, or a command:
  :save [PATH]   save the current document (with source and date header)
                 to PATH, the --output-file path or a timestamped name
  :show          preview the current document
  :copy          write the current document to stdout
  :clear         discard the current document
  :status        show the status line
  :help          show this help
  :quit          leave";

/// Progress indicator tick
const TICK: Duration = Duration::from_millis(250);

/// One parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Extract(String),
    Save(Option<PathBuf>),
    Show,
    Copy,
    Clear,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let Some(command) = line.strip_prefix(':') else {
        return Command::Extract(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };

    match name {
        "save" | "s" => Command::Save(arg.map(PathBuf::from)),
        "show" => Command::Show,
        "copy" => Command::Copy,
        "clear" => Command::Clear,
        "status" => Command::Status,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Run the session until `:quit` or end of input
pub async fn run(pipeline: Arc<Pipeline>, preview_chars: usize) {
    println!("htmlgrab interactive session");
    println!("{HELP}");

    let (tx, mut rx) = mpsc::channel::<Completion>(1);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK);
    let mut session = Session::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("Error reading input: {e}");
                        break;
                    }
                };

                let command = parse_command(&line);
                if command == Command::Quit {
                    break;
                }
                session = apply(session, command, &pipeline, &tx, preview_chars);
            }
            Some(completion) = rx.recv() => {
                session = settle(session, completion, preview_chars);
            }
            _ = ticker.tick(), if session.is_busy() => {
                eprint!(".");
                let _ = io::stderr().flush();
            }
        }
    }

    // Input closed with a job outstanding: let it finish before leaving.
    if session.is_busy() {
        debug!("Waiting for outstanding extraction");
        if let Some(completion) = rx.recv().await {
            settle(session, completion, preview_chars);
        }
    }
}

fn apply(
    session: Session,
    command: Command,
    pipeline: &Arc<Pipeline>,
    tx: &mpsc::Sender<Completion>,
    preview_chars: usize,
) -> Session {
    let session = match command {
        Command::Extract(input) => {
            let (session, address) = session.submit(&input);
            if let Some(address) = address {
                spawn_extraction(Arc::clone(pipeline), address, tx.clone());
            }
            session
        }
        Command::Save(path) => {
            let destination = path.as_deref().or(pipeline.destination());
            session.save(destination).0
        }
        Command::Show => {
            match session.document() {
                Some(doc) => println!("{}", preview(doc, preview_chars)),
                None => eprintln!("{}", Status::NoDocument),
            }
            return session;
        }
        Command::Copy => {
            if let Some(doc) = session.document() {
                if let Err(e) = export(doc, io::stdout().lock()) {
                    eprintln!("Error writing to stdout: {e}");
                }
                println!();
            }
            session.record_export()
        }
        Command::Clear => session.clear(),
        Command::Status => session,
        Command::Help => {
            println!("{HELP}");
            return session;
        }
        Command::Unknown(name) => {
            println!("Unknown command ':{name}', try :help");
            return session;
        }
        Command::Empty | Command::Quit => return session,
    };

    print_status(session.status());
    session
}

/// The single point where a finished extraction reaches the session
fn settle(session: Session, completion: Completion, preview_chars: usize) -> Session {
    eprintln!();
    let session = session.complete(completion);
    print_status(session.status());
    if matches!(session.status(), Status::Extracted { .. }) {
        if let Some(doc) = session.document() {
            println!("{}", preview(doc, preview_chars));
        }
    }
    session
}

fn print_status(status: &Status) {
    match status {
        Status::Failed { .. } | Status::Busy | Status::NoDocument => eprintln!("{status}"),
        _ => println!("{status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htmlgrab::{Extraction, NormalizedDocument};

    #[test]
    fn test_parse_address_line() {
        assert_eq!(
            parse_command("  example.com "),
            Command::Extract("example.com".to_string())
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command(":save"), Command::Save(None));
        assert_eq!(
            parse_command(":save out/page.html"),
            Command::Save(Some(PathBuf::from("out/page.html")))
        );
        assert_eq!(parse_command(":show"), Command::Show);
        assert_eq!(parse_command(":copy"), Command::Copy);
        assert_eq!(parse_command(":clear"), Command::Clear);
        assert_eq!(parse_command(":status"), Command::Status);
        assert_eq!(parse_command(":?"), Command::Help);
        assert_eq!(parse_command(":q"), Command::Quit);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(
            parse_command(":frobnicate"),
            Command::Unknown("frobnicate".to_string())
        );
    }

    #[tokio::test]
    async fn test_apply_without_document() {
        let pipeline = Arc::new(Pipeline::default());
        let (tx, _rx) = mpsc::channel(1);

        let session = apply(Session::new(), Command::Save(None), &pipeline, &tx, 800);
        assert_eq!(session.status(), &Status::NoDocument);

        let session = apply(session, Command::Copy, &pipeline, &tx, 800);
        assert_eq!(session.status(), &Status::NoDocument);
        assert!(!session.has_document());
    }

    fn extracted_session() -> Session {
        let (session, address) = Session::new().submit("example.com");
        session.complete(Ok(Extraction {
            final_url: "https://example.com".to_string(),
            address: address.unwrap(),
            status_code: 200,
            reason: "OK".to_string(),
            byte_length: 9,
            document: NormalizedDocument::new("<p>\n Hi\n</p>\n".to_string()),
            saved: None,
        }))
    }

    #[tokio::test]
    async fn test_save_defaults_to_configured_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("configured.html");
        let pipeline = Arc::new(Pipeline::builder().destination(&configured).build());
        let (tx, _rx) = mpsc::channel(1);

        let command = Command::Save(None);
        let session = apply(extracted_session(), command, &pipeline, &tx, 800);

        assert_eq!(
            session.status(),
            &Status::Saved {
                path: configured.clone(),
            }
        );
        let written = std::fs::read_to_string(&configured).unwrap();
        assert!(written.ends_with("<p>\n Hi\n</p>\n"));
    }

    #[tokio::test]
    async fn test_save_path_overrides_configured_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("configured.html");
        let explicit = dir.path().join("explicit.html");
        let pipeline = Arc::new(Pipeline::builder().destination(&configured).build());
        let (tx, _rx) = mpsc::channel(1);

        let command = Command::Save(Some(explicit.clone()));
        let session = apply(extracted_session(), command, &pipeline, &tx, 800);

        assert_eq!(session.status(), &Status::Saved { path: explicit });
        assert!(!configured.exists());
    }

    #[tokio::test]
    async fn test_apply_invalid_address_does_not_start_job() {
        let pipeline = Arc::new(Pipeline::default());
        let (tx, mut rx) = mpsc::channel(1);

        let session = apply(
            Session::new(),
            Command::Extract("ftp://example.com".to_string()),
            &pipeline,
            &tx,
            800,
        );

        assert!(!session.is_busy());
        assert!(matches!(session.status(), Status::Failed { .. }));
        assert!(rx.try_recv().is_err());
    }
}
