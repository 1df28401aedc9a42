//! Relay stage
//!
//! Turns an open upstream body into the body sent back to the caller.
//! Two strategies exist and a deployment runs exactly one of them:
//!
//! - [`RelayMode::Passthrough`] forwards every upstream chunk verbatim.
//! - [`RelayMode::Extract`] parses the upstream SSE stream and forwards only
//!   the text of each `choices[0].delta.content` fragment.
//!
//! Status and headers are already committed once a relay runs, so an
//! upstream fault is logged and ends the body cleanly instead of surfacing
//! as an error. The upstream stream is owned by the relay and dropped
//! whenever the relay ends or is itself dropped by a departing caller.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use crate::streaming::{classify_line, SseLine, SseLineBuffer};

/// Body stream handed to the HTTP layer
pub type RelayStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// Forwarding strategy, fixed per deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayMode {
    /// Raw upstream bytes, declared as an event stream
    #[default]
    Passthrough,
    /// Extracted delta text, declared as plain text
    Extract,
}

impl RelayMode {
    pub fn content_type(self) -> &'static str {
        match self {
            RelayMode::Passthrough => "text/event-stream",
            RelayMode::Extract => "text/plain; charset=utf-8",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelayMode::Passthrough => "passthrough",
            RelayMode::Extract => "extract",
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown relay mode '{0}', expected 'passthrough' or 'extract'")]
pub struct UnknownRelayMode(String);

impl FromStr for RelayMode {
    type Err = UnknownRelayMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" | "pass-through" | "raw" => Ok(RelayMode::Passthrough),
            "extract" | "extraction" | "text" => Ok(RelayMode::Extract),
            _ => Err(UnknownRelayMode(s.to_string())),
        }
    }
}

/// Build the caller-facing body for `upstream` using `mode`.
pub fn relay<S, E>(mode: RelayMode, upstream: S) -> RelayStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    match mode {
        RelayMode::Passthrough => passthrough(upstream),
        RelayMode::Extract => extract(upstream),
    }
}

/// Forward every non-empty upstream chunk unchanged and in order.
pub fn passthrough<S, E>(upstream: S) -> RelayStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures::pin_mut!(upstream);
        let mut chunks = 0usize;

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) if bytes.is_empty() => continue,
                Ok(bytes) => {
                    chunks += 1;
                    yield Ok::<Bytes, Infallible>(bytes);
                }
                Err(e) => {
                    warn!(error = %e, "Upstream stream failed mid-relay; ending response");
                    break;
                }
            }
        }

        debug!(chunks, "Passthrough relay finished");
    })
}

/// Forward only the delta text carried by upstream `data:` lines.
///
/// `[DONE]` emits nothing and the upstream is still read until it closes.
/// Malformed lines are logged and skipped.
pub fn extract<S, E>(upstream: S) -> RelayStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures::pin_mut!(upstream);
        let mut lines = SseLineBuffer::new();
        let mut fragments = 0usize;
        let mut clean_end = true;

        while let Some(chunk) = upstream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Upstream stream failed mid-relay; ending response");
                    clean_end = false;
                    break;
                }
            };

            for line in lines.feed(&bytes) {
                if let Some(text) = fragment(&line) {
                    fragments += 1;
                    yield Ok::<Bytes, Infallible>(text);
                }
            }
        }

        if clean_end {
            if let Some(text) = lines.finish().as_deref().and_then(fragment) {
                fragments += 1;
                yield Ok::<Bytes, Infallible>(text);
            }
        }

        debug!(fragments, "Extraction relay finished");
    })
}

fn fragment(line: &[u8]) -> Option<Bytes> {
    match classify_line(line) {
        SseLine::Delta(text) => Some(Bytes::from(text)),
        SseLine::Done => {
            debug!("Upstream signalled end of completion");
            None
        }
        SseLine::Malformed(error) => {
            let line = String::from_utf8_lossy(line);
            warn!(error = %error, line = %line, "Skipping malformed upstream SSE line");
            None
        }
        SseLine::Ignored | SseLine::Empty => None,
    }
}
