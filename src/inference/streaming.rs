//! NDJSON streaming response parser for Ollama's native chat API.
//!
//! Reads a response body as a byte stream, splits it on newlines, and decodes
//! each line as a `StreamFragment`. The stream ends after the first fragment
//! flagged `done`, at end of body, or right after the first error item.

use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};

use super::errors::InferenceError;
use super::types::StreamFragment;

/// Parse an NDJSON byte stream into `StreamFragment`s.
///
/// Generic over the chunk and error types so it can be driven by
/// `reqwest::Response::bytes_stream()` or by an in-memory stream in tests.
pub fn parse_ndjson_stream<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<StreamFragment, InferenceError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    stream::unfold(
        Some((byte_stream, Vec::<u8>::new())),
        |state| async move {
            let (mut byte_stream, mut buffer) = state?;
            loop {
                // A complete line is waiting in the buffer
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                    match decode_line(&line_bytes) {
                        None => continue, // blank line
                        Some(Ok(fragment)) if fragment.done => {
                            return Some((Ok(fragment), None));
                        }
                        Some(Ok(fragment)) => {
                            return Some((Ok(fragment), Some((byte_stream, buffer))));
                        }
                        Some(Err(e)) => return Some((Err(e), None)),
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            None,
                        ));
                    }
                    None => {
                        // Body ended; the last line may lack its newline
                        let rest = std::mem::take(&mut buffer);
                        return decode_line(&rest).map(|item| (item, None));
                    }
                }
            }
        },
    )
}

/// Decode one NDJSON line. Returns `None` for blank lines.
fn decode_line(line_bytes: &[u8]) -> Option<Result<StreamFragment, InferenceError>> {
    let line = String::from_utf8_lossy(line_bytes);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let fragment = match serde_json::from_str::<StreamFragment>(trimmed) {
        Ok(fragment) => fragment,
        Err(e) => {
            return Some(Err(InferenceError::DecodeError {
                line: trimmed.to_string(),
                reason: e.to_string(),
            }))
        }
    };

    if let Some(reason) = fragment.error {
        return Some(Err(InferenceError::StreamError { reason }));
    }
    Some(Ok(fragment))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
