//! Utility functions for the transports and error reporting.
//!
//! This module provides helpers for:
//! - Status classification and reason phrases
//! - Bounded previews of response bodies for error messages
//! - Describing and classifying transport errors

use std::error::Error as StdError;
use std::io;

/// Longest body preview, in characters, placed in an error message.
pub const PREVIEW_LIMIT: usize = 128;

/// At most [`PREVIEW_LIMIT`] characters from the start of `text`.
///
/// # Examples
///
/// ```
/// use unifetch::client::{preview, PREVIEW_LIMIT};
///
/// assert_eq!(preview("short"), "short");
/// assert_eq!(preview(&"é".repeat(500)).chars().count(), PREVIEW_LIMIT);
/// ```
pub fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Canonical reason phrase for a status, empty when the code has none.
pub fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
        .to_string()
}

/// Check if status code is in the 2xx range
pub fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// Render an error and every source beneath it as `outer: inner: root`.
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(e) = source {
        let text = e.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = e.source();
    }
    parts.join(": ")
}

/// Whether an error chain shows the peer closing the connection.
pub fn is_remote_close(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(h) = e.downcast_ref::<hyper::Error>() {
            if h.is_incomplete_message() || h.is_closed() {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}
