//! Failure classification.
//!
//! A failure is reduced to one user-facing line. A known status code found
//! anywhere in the error chain (outermost first) selects a fixed message;
//! otherwise the deepest non-blank message in the chain is used.

use crate::error::HasStatusCode;
use crate::Error;
use std::error::Error as StdError;
use std::fmt;

pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown request error.";

/// Category of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    PaymentRequired,
    RateLimited,
    ServiceUnavailable,
    SchemaMismatch,
    Unknown,
}

impl ErrorKind {
    /// Kind and fixed message for the status codes with special handling.
    fn from_status(status: u16) -> Option<(Self, &'static str)> {
        match status {
            401 => Some((ErrorKind::Unauthorized, "401 Unauthorized. Check your API key.")),
            402 => Some((
                ErrorKind::PaymentRequired,
                "402 Payment Required. Check your GonkaGate balance or billing status.",
            )),
            429 => Some((
                ErrorKind::RateLimited,
                "429 Too Many Requests. Slow down request rate and retry.",
            )),
            503 => Some((
                ErrorKind::ServiceUnavailable,
                "503 Service Unavailable. Retry in a few seconds.",
            )),
            _ => None,
        }
    }
}

/// A failure reduced to what the user is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub message: String,
    /// First status code found in the chain, whether or not it is in the table.
    pub status: Option<u16>,
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Classify a failure by walking its `source()` chain.
pub fn classify(error: &(dyn StdError + 'static)) -> ErrorClassification {
    let chain: Vec<&(dyn StdError + 'static)> = chain(error).collect();

    let status = chain.iter().find_map(|link| status_of(*link));

    if let Some((kind, message)) = status.and_then(ErrorKind::from_status) {
        return ErrorClassification {
            kind,
            message: message.to_string(),
            status,
        };
    }

    let kind = if chain
        .iter()
        .any(|link| matches!(as_crate_error(*link), Some(Error::SchemaMismatch(_))))
    {
        ErrorKind::SchemaMismatch
    } else {
        ErrorKind::Unknown
    };

    let message = chain
        .iter()
        .rev()
        .map(|link| link.to_string())
        .find(|message| !message.trim().is_empty())
        .map(|message| message.trim().to_string())
        .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());

    ErrorClassification {
        kind,
        message,
        status,
    }
}

fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&link| link.source())
}

/// `Error::Context` exposes its source as `Box<Error>`.
fn as_crate_error<'a>(link: &'a (dyn StdError + 'static)) -> Option<&'a Error> {
    link.downcast_ref::<Error>()
        .or_else(|| link.downcast_ref::<Box<Error>>().map(|boxed| &**boxed))
}

fn status_of(link: &(dyn StdError + 'static)) -> Option<u16> {
    if let Some(error) = as_crate_error(link) {
        return error.status_code();
    }
    link.downcast_ref::<reqwest::Error>()
        .and_then(|error| error.status_code())
}

impl Error {
    /// Classify this error for display.
    pub fn classify(&self) -> ErrorClassification {
        classify(self)
    }
}
