//! Batch endpoint transport.
//!
//! [`BatchTransport`] is the network seam of the manager. The manager runs
//! each send on its own task and cancels superseded sends by aborting that
//! task, which drops the in-progress HTTP request.

use std::future::Future;

use cartsync_core::{BatchRequest, BatchResponse};
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use tracing::{debug, error, instrument};
use url::Url;

use crate::config::CartSyncConfig;
use crate::error::SyncError;

/// Maximum number of body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 200;

/// Sends one batch and returns the server's response.
pub trait BatchTransport: Send + Sync + 'static {
    /// Send `request` with the anti-forgery `token`.
    ///
    /// Non-2xx statuses and malformed bodies are errors; a well-formed
    /// `{"success": false}` body is a successful send.
    fn send_batch(
        &self,
        request: BatchRequest,
        token: String,
    ) -> impl Future<Output = Result<BatchResponse, SyncError>> + Send;
}

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    csrf_header: HeaderName,
}

impl HttpTransport {
    /// Create a transport for the configured batch endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the
    /// configured header name is invalid.
    pub fn new(config: &CartSyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, config.batch_endpoint.clone(), &config.csrf_header)
    }

    /// Create a transport around an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if `csrf_header` is not a valid header name.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: Url,
        csrf_header: &str,
    ) -> Result<Self, SyncError> {
        let csrf_header = HeaderName::from_bytes(csrf_header.as_bytes())
            .map_err(|e| SyncError::Config(format!("invalid header name {csrf_header}: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            csrf_header,
        })
    }

    /// The batch endpoint URL.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip_all, fields(ops = request.ops.len(), client_rev = %request.client_rev))]
    async fn post(&self, request: BatchRequest, token: String) -> Result<BatchResponse, SyncError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&request);

        if !token.is_empty() {
            match HeaderValue::from_str(&token) {
                Ok(value) => builder = builder.header(self.csrf_header.clone(), value),
                Err(e) => debug!(error = %e, "Skipping unusable anti-forgery token"),
            }
        }

        let response = builder.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            error!(status = %status, body = %preview, "Batch endpoint returned non-success status");
            return Err(SyncError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        serde_json::from_str::<BatchResponse>(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(BODY_PREVIEW_CHARS).collect::<String>(),
                "Failed to parse batch response"
            );
            SyncError::Parse(e)
        })
    }
}

impl BatchTransport for HttpTransport {
    fn send_batch(
        &self,
        request: BatchRequest,
        token: String,
    ) -> impl Future<Output = Result<BatchResponse, SyncError>> + Send {
        self.post(request, token)
    }
}
