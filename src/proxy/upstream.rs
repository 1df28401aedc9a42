//! Upstream chat completions client
//!
//! Issues exactly one streaming POST per inbound request and hands the
//! response body back as a byte stream. The connection stays owned by the
//! returned [`UpstreamStream`] and is released when that value is dropped,
//! whichever way the relay ends.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{AppError, AppResult},
    providers::ResolvedTarget,
    request::Message,
};

/// Stream type for streaming responses from upstream providers
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Outbound request body
#[derive(Debug, Serialize)]
struct UpstreamPayload<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Client for OpenAI-compatible chat completion endpoints
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client whose timeout covers the whole call, streamed body included.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Open a streaming chat completion against `target`.
    ///
    /// Transport failures become [`AppError::UpstreamUnreachable`]; a non-2xx
    /// answer becomes [`AppError::UpstreamRejected`] with the upstream body.
    #[instrument(skip(self, target, messages), fields(url = %target.upstream_url, model = %target.upstream_model))]
    pub async fn open_stream(
        &self,
        target: &ResolvedTarget,
        messages: &[Message],
    ) -> AppResult<UpstreamStream> {
        let url = target.upstream_url.as_str();
        let payload = UpstreamPayload {
            model: &target.upstream_model,
            messages,
            stream: true,
        };

        debug!(messages = messages.len(), "Sending streaming request upstream");

        let response = self
            .client
            .post(url)
            .headers(build_headers(&target.credential)?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let message = error_chain(&e);
                error!(url = %url, error = %message, "Failed to reach upstream provider");
                AppError::UpstreamUnreachable {
                    url: url.to_string(),
                    message,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!(url = %url, error = %error_chain(&e), "Failed to read upstream error body");
                    String::new()
                }
            };
            let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            error!(url = %url, status = %status, body = %body, "Upstream provider rejected request");
            return Err(AppError::UpstreamRejected {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        info!(url = %url, status = %status, "Upstream stream opened");
        Ok(UpstreamStream::new(url, Box::pin(response.bytes_stream())))
    }
}

fn build_headers(credential: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential)).map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "configured credential is not a valid header value"
        ))
    })?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Render an error with its whole source chain, e.g. the DNS cause under a
/// reqwest connect error.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Body of an open upstream response.
///
/// Owns the underlying connection; dropping it releases the connection
/// whether the body was fully read, abandoned by the caller, or cut short
/// by an error.
pub struct UpstreamStream {
    inner: ByteStream,
    url: String,
    completed: bool,
}

impl UpstreamStream {
    pub fn new(url: impl Into<String>, inner: ByteStream) -> Self {
        Self {
            inner,
            url: url.into(),
            completed: false,
        }
    }
}

impl Stream for UpstreamStream {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(None) = poll {
            self.completed = true;
        }
        poll
    }
}

impl Drop for UpstreamStream {
    fn drop(&mut self) {
        if self.completed {
            debug!(url = %self.url, "Upstream stream drained; connection released");
        } else {
            debug!(url = %self.url, "Upstream stream abandoned before completion; connection released");
        }
    }
}
