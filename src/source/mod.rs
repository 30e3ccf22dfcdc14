//! Notification sources — where intercepted events come from.
//!
//! A source delivers the full, unfiltered event stream; the pipeline does
//! its own filtering by source application.

pub mod stdin;
pub mod webhook;

pub use stdin::JsonLinesSource;
pub use webhook::WebhookSource;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::SourceError;
use crate::pipeline::types::NotificationEvent;

/// Stream of posted notifications.
pub type EventStream = Pin<Box<dyn Stream<Item = NotificationEvent> + Send>>;

/// A subscription to posted notifications.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Source name for logging (e.g. "stdin", "webhook").
    fn name(&self) -> &str;

    /// Subscribe to the event stream. May only be called once.
    async fn start(&self) -> Result<EventStream, SourceError>;

    /// Whether the subscription is currently delivering events.
    fn is_active(&self) -> bool;

    /// Release the subscription.
    async fn shutdown(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
