//! Example: run the pipeline against live sites and check the outcome
//!
//! Run with: cargo run -p htmlgrab --example live_check
//!
//! Each case runs one extraction without saving and checks either a
//! snippet of the normalized markup or the kind of error reported.

use htmlgrab::{Address, Error, ErrorKind, Extraction, Pipeline, SaveMode};
use std::time::Duration;

/// Expected outcome of a case
enum Expect {
    Contains(&'static str),
    Fails(ErrorKind),
}

struct Case {
    address: &'static str,
    description: &'static str,
    timeout: Duration,
    expect: Expect,
}

const CASES: &[Case] = &[
    Case {
        address: "example.com",
        description: "Simple HTML page, scheme added",
        timeout: Duration::from_secs(30),
        expect: Expect::Contains("Example Domain"),
    },
    Case {
        address: "https://httpbin.org/html",
        description: "Larger HTML page",
        timeout: Duration::from_secs(30),
        expect: Expect::Contains("Herman Melville"),
    },
    Case {
        address: "https://httpbin.org/status/404",
        description: "Missing page",
        timeout: Duration::from_secs(30),
        expect: Expect::Fails(ErrorKind::Http),
    },
    Case {
        address: "https://httpbin.org/delay/5",
        description: "Slow server",
        timeout: Duration::from_secs(1),
        expect: Expect::Fails(ErrorKind::Timeout),
    },
    Case {
        address: "https://no-such-host.invalid/",
        description: "Unresolvable host",
        timeout: Duration::from_secs(30),
        expect: Expect::Fails(ErrorKind::Connection),
    },
];

#[tokio::main]
async fn main() {
    println!("htmlgrab live checks");
    println!("====================\n");

    let mut passed = 0;
    let mut failed = 0;

    for (i, case) in CASES.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   Address: {}", case.address);

        let pipeline = Pipeline::builder()
            .timeout(case.timeout)
            .save_mode(SaveMode::Off)
            .build();

        let outcome = match Address::parse(case.address) {
            Ok(address) => pipeline.run(address).await.map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };

        if let Ok(ref extraction) = outcome {
            print_summary(extraction);
        }

        if check(case, &outcome) {
            println!("   ✓ PASS\n");
            passed += 1;
        } else {
            println!("   ✗ FAIL\n");
            failed += 1;
        }
    }

    println!("====================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_summary(extraction: &Extraction) {
    let doc = &extraction.document;
    println!(
        "   Status: {} {}",
        extraction.status_code, extraction.reason
    );
    println!("   Size: {} bytes", extraction.byte_length);
    println!(
        "   Output: {} characters, {} lines, {} words ({})",
        doc.character_count(),
        doc.line_count(),
        doc.word_count(),
        doc.encoding()
    );
}

fn check(case: &Case, outcome: &Result<Extraction, Error>) -> bool {
    match (&case.expect, outcome) {
        (Expect::Contains(snippet), Ok(extraction)) => {
            let found = extraction.document.text().contains(snippet);
            if !found {
                println!("   Expected output to contain '{}'", snippet);
            }
            found
        }
        (Expect::Fails(kind), Err(e)) => {
            println!("   Error: {}", e);
            if e.kind() != *kind {
                println!("   Expected {} error, got {}", kind, e.kind());
            }
            e.kind() == *kind
        }
        (Expect::Contains(_), Err(e)) => {
            println!("   Error: {}", e);
            false
        }
        (Expect::Fails(kind), Ok(_)) => {
            println!("   Expected {} error, got success", kind);
            false
        }
    }
}
