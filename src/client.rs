//! Response service client — one `POST /chat` exchange per message.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::NetworkError;
use crate::pipeline::types::{ChatRequest, ChatResponse};

/// Maps a (sender, message) pair to a reply.
#[async_trait]
pub trait ResponseService: Send + Sync {
    /// Perform one request/response exchange. No retry, no batching.
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, NetworkError>;
}

/// HTTP client for the response service.
///
/// Construct once at startup and share by `Arc`. The underlying
/// `reqwest::Client` (and its connection pool) is built on first use; when
/// several tasks race on the first request, exactly one build wins.
pub struct HttpResponseClient {
    config: ClientConfig,
    http: OnceCell<reqwest::Client>,
}

impl HttpResponseClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: OnceCell::new(),
        }
    }

    /// Endpoint that receives chat requests.
    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn http(&self) -> Result<&reqwest::Client, NetworkError> {
        self.http.get_or_try_init(|| {
            debug!(
                base_url = %self.config.base_url,
                connect_timeout = ?self.config.connect_timeout,
                read_timeout = ?self.config.read_timeout,
                request_timeout = ?self.config.request_timeout(),
                "Building response service HTTP client"
            );
            reqwest::Client::builder()
                .connect_timeout(self.config.connect_timeout)
                .read_timeout(self.config.read_timeout)
                .timeout(self.config.request_timeout())
                .build()
                .map_err(|e| NetworkError::Client(e.to_string()))
        })
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout(self.config.request_timeout())
        } else if io_timed_out(&e) {
            NetworkError::Timeout(self.config.read_timeout)
        } else {
            NetworkError::Transport(e.to_string())
        }
    }
}

/// Whether an I/O timeout (the per-read ceiling) sits anywhere in the chain.
fn io_timed_out(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::TimedOut
        {
            return true;
        }
        source = err.source();
    }
    false
}

#[async_trait]
impl ResponseService for HttpResponseClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, NetworkError> {
        let url = self.chat_url();
        debug!(url = %url, sender = %request.sender, "Sending chat request");

        let response = self
            .http()?
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Response service rejected request");
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        serde_json::from_slice(&body).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}
