//! Address validation and scheme normalization

use crate::error::FetchError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Scheme prepended to addresses that carry none
pub const DEFAULT_SCHEME: &str = "https://";

/// A validated network address
///
/// Always starts with `http://` or `https://` and parses as a URL with a
/// host. Built once from user input and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Validate user input, prepending [`DEFAULT_SCHEME`] when needed
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FetchError::MissingUrl);
        }

        if explicit_scheme(trimmed).is_some() && !has_http_scheme(trimmed) {
            return Err(FetchError::InvalidUrlScheme);
        }

        let normalized = normalize_scheme(trimmed);
        let parsed = Url::parse(&normalized).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(FetchError::InvalidUrl("missing host".to_string()));
        }

        Ok(Self(normalized))
    }

    /// The address as passed to the transport
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Prepend `https://` unless the input already starts with an http scheme
///
/// Idempotent: `normalize_scheme(&normalize_scheme(a)) == normalize_scheme(a)`.
pub fn normalize_scheme(input: &str) -> String {
    if has_http_scheme(input) {
        input.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{input}")
    }
}

fn has_http_scheme(input: &str) -> bool {
    explicit_scheme(input).is_some_and(|scheme| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}

/// Scheme token before the first `://`, if the input starts with one
///
/// `example.com/go?to=https://other.org` has no scheme: the text before
/// `://` contains a path.
fn explicit_scheme(input: &str) -> Option<&str> {
    let (scheme, _) = input.split_once("://")?;
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    (starts_alpha && rest_valid).then_some(scheme)
}
