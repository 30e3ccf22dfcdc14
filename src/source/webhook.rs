//! Webhook source — a device-side bridge POSTs notifications to us.
//!
//! Routes:
//! - `POST /notifications` — one JSON `NotificationEvent`, answered `202 Accepted`
//! - `GET /status` — `{"active": bool, "source": "webhook"}`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::pipeline::types::NotificationEvent;
use crate::source::{EventStream, NotificationSource};

/// State shared between the source and the HTTP handlers.
struct WebhookInner {
    incoming_tx: mpsc::UnboundedSender<NotificationEvent>,
    active: AtomicBool,
}

/// Subscription status as reported to the bridge.
#[derive(Debug, Serialize)]
struct StatusBody {
    active: bool,
    source: &'static str,
}

/// HTTP webhook notification source.
///
/// `router()` builds the Axum routes; the caller serves them. Events posted
/// before `start()` are buffered.
pub struct WebhookSource {
    inner: Arc<WebhookInner>,
    /// Consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<NotificationEvent>>>,
}

impl WebhookSource {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(WebhookInner {
                incoming_tx,
                active: AtomicBool::new(false),
            }),
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Build the Axum router. Merge it into an app or serve it directly.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/notifications", post(post_notification))
            .route("/status", get(get_status))
            .with_state(Arc::clone(&self.inner))
    }
}

impl Default for WebhookSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSource for WebhookSource {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn start(&self) -> Result<EventStream, SourceError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| SourceError::AlreadyStarted {
                name: "webhook".to_string(),
            })?;

        self.inner.active.store(true, Ordering::SeqCst);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), SourceError> {
        self.inner.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn post_notification(
    State(inner): State<Arc<WebhookInner>>,
    Json(event): Json<NotificationEvent>,
) -> impl IntoResponse {
    debug!(key = %event.key, source = %event.source_app, "Notification posted via webhook");

    if inner.incoming_tx.send(event).is_err() {
        warn!("Webhook event stream closed, rejecting notification");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn get_status(State(inner): State<Arc<WebhookInner>>) -> impl IntoResponse {
    Json(StatusBody {
        active: inner.active.load(Ordering::SeqCst),
        source: "webhook",
    })
}
