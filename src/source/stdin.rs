//! JSON-lines source — one `NotificationEvent` per line.
//!
//! Handy for piping events from a device bridge (`adb logcat | jq ...`) or
//! replaying captured notifications locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::SourceError;
use crate::pipeline::types::NotificationEvent;
use crate::source::{EventStream, NotificationSource};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Reads newline-delimited JSON events from a reader (stdin by default).
pub struct JsonLinesSource {
    name: &'static str,
    reader: Mutex<Option<BoxedReader>>,
    active: Arc<AtomicBool>,
}

impl JsonLinesSource {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::named("json-lines", reader)
    }

    pub fn stdin() -> Self {
        Self::named("stdin", tokio::io::stdin())
    }

    fn named(name: &'static str, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name,
            reader: Mutex::new(Some(Box::new(reader))),
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl NotificationSource for JsonLinesSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self) -> Result<EventStream, SourceError> {
        let reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or_else(|| SourceError::AlreadyStarted {
                name: self.name.to_string(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::clone(&self.active);
        active.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<NotificationEvent>(line) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Skipping malformed notification line");
                            }
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading notification stream: {}", e);
                        break;
                    }
                }
            }

            active.store(false, Ordering::SeqCst);
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), SourceError> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}
