//! Interception pipeline — turns notifications into replies.
//!
//! Flow per event:
//! 1. Filter by source application
//! 2. Extract sender (title) and message (body)
//! 3. Select the first reply capability with a result slot
//! 4. Spawn the response service exchange
//! 5. On success, inject the reply (unless auto-reply is off), then
//!    optionally dismiss the notification
//!
//! Every failure is a logged drop. Nothing is retried and nothing is
//! surfaced to the caller.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::ResponseService;
use crate::config::{EmptyReplyPolicy, PipelineConfig};
use crate::error::SourceError;
use crate::injector::ReplyInjector;
use crate::pipeline::guard::FeedbackGuard;
use crate::pipeline::types::{
    ChatRequest, Dispatch, DropReason, NotificationEvent, Outcome, ReplyCapability, TriggerHandle,
};
use crate::source::NotificationSource;

/// State shared by every in-flight round trip.
struct PipelineInner {
    config: PipelineConfig,
    service: Arc<dyn ResponseService>,
    injector: Arc<dyn ReplyInjector>,
    guard: Option<FeedbackGuard>,
}

/// An admitted event, ready for its round trip.
struct Pending {
    request: ChatRequest,
    capability: ReplyCapability,
    dismiss: Option<TriggerHandle>,
}

/// The interception-and-reply pipeline.
///
/// Cheap to clone; clones share configuration, client and injector.
#[derive(Clone)]
pub struct InterceptionPipeline {
    inner: Arc<PipelineInner>,
}

impl InterceptionPipeline {
    pub fn new(
        config: PipelineConfig,
        service: Arc<dyn ResponseService>,
        injector: Arc<dyn ReplyInjector>,
    ) -> Self {
        let guard = config.guard.clone().map(FeedbackGuard::new);
        Self {
            inner: Arc::new(PipelineInner {
                config,
                service,
                injector,
                guard,
            }),
        }
    }

    /// Handle one notification.
    ///
    /// Never waits on the network: the exchange runs on its own task, and the
    /// returned handle may be ignored. Must be called within a tokio runtime.
    pub fn handle(&self, event: NotificationEvent) -> Dispatch {
        match self.prepare(event) {
            Ok(pending) => Dispatch::Spawned(tokio::spawn(complete(
                Arc::clone(&self.inner),
                pending,
            ))),
            Err(reason) => Dispatch::Dropped(reason),
        }
    }

    /// Steps 1 to 3. Synchronous; decides whether the event gets a round trip.
    fn prepare(&self, event: NotificationEvent) -> Result<Pending, DropReason> {
        let inner = &self.inner;

        if event.source_app != inner.config.source_app {
            debug!(source = %event.source_app, "Skipping notification from other app");
            return Err(DropReason::ForeignSource);
        }

        if event.is_group_summary && inner.config.skip_group_summaries {
            debug!(key = %event.key, "Skipping group summary notification");
            return Err(DropReason::GroupSummary);
        }

        let Some((sender, message)) = event.sender_and_message() else {
            warn!(key = %event.key, "Notification missing sender or message, ignoring");
            return Err(DropReason::MissingContent);
        };

        info!(sender = %sender, key = %event.key, "New message intercepted");

        if let Some(guard) = &inner.guard
            && let Err(reason) = guard.admit(sender, message, Utc::now())
        {
            debug!(sender = %sender, reason = reason.label(), "Feedback guard dropped message");
            return Err(reason);
        }

        let Some(capability) = event.reply_capability() else {
            warn!(
                key = %event.key,
                sender = %sender,
                "No reply action found, notification can't be answered inline"
            );
            return Err(DropReason::NoReplyAction);
        };

        debug!(
            action = capability.label.as_deref().unwrap_or("<unlabelled>"),
            slots = capability.result_slots.len(),
            "Selected reply action"
        );

        Ok(Pending {
            request: ChatRequest::new(sender, message),
            capability: capability.clone(),
            dismiss: event.dismiss_trigger.clone(),
        })
    }

    /// Consume a source until its stream ends.
    ///
    /// Round trips still in flight when the stream ends are awaited before
    /// returning.
    pub async fn run(&self, source: &dyn NotificationSource) -> Result<(), SourceError> {
        self.run_until(source, std::future::pending::<()>()).await
    }

    /// Consume a source until its stream ends or `shutdown` resolves,
    /// then wait for every in-flight round trip and shut the source down.
    pub async fn run_until<F>(
        &self,
        source: &dyn NotificationSource,
        shutdown: F,
    ) -> Result<(), SourceError>
    where
        F: Future<Output = ()>,
    {
        let mut events = source.start().await?;
        info!(
            source = source.name(),
            app = %self.inner.config.source_app,
            auto_reply = self.inner.config.auto_reply_enabled,
            "Notification listener connected"
        );

        tokio::pin!(shutdown);
        let mut in_flight: JoinSet<Outcome> = JoinSet::new();

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => {
                        if let Ok(pending) = self.prepare(event) {
                            in_flight.spawn(complete(Arc::clone(&self.inner), pending));
                        }
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Round trip task failed");
                    }
                }
                _ = &mut shutdown => {
                    info!(source = source.name(), "Shutdown requested");
                    break;
                }
            }
        }

        info!(
            source = source.name(),
            in_flight = in_flight.len(),
            "Notification listener disconnected"
        );
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Round trip task failed");
            }
        }

        source.shutdown().await
    }
}

/// Runs one admitted event to its end.
async fn complete(inner: Arc<PipelineInner>, pending: Pending) -> Outcome {
    let outcome = round_trip(&inner, pending).await;
    debug!(outcome = outcome.label(), "Round trip finished");
    outcome
}

/// Steps 4 and 5: ask the service, then deliver or log.
async fn round_trip(inner: &PipelineInner, pending: Pending) -> Outcome {
    let Pending {
        request,
        capability,
        dismiss,
    } = pending;

    let response = match inner.service.send(&request).await {
        Ok(response) => response,
        Err(e) if e.is_transport() => {
            error!(sender = %request.sender, error = %e, "Network error reaching response service");
            return Outcome::ServiceFailed;
        }
        Err(e) => {
            error!(sender = %request.sender, error = %e, "Response service error");
            return Outcome::ServiceFailed;
        }
    };

    info!(sender = %request.sender, reply = %response.reply, "Reply generated");

    if !inner.config.auto_reply_enabled {
        info!(
            sender = %request.sender,
            reply = %response.reply,
            "Auto-reply disabled, not sending"
        );
        return Outcome::AutoReplyDisabled;
    }

    if response.reply.is_empty() && inner.config.empty_reply == EmptyReplyPolicy::Suppress {
        debug!(sender = %request.sender, "Empty reply suppressed");
        return Outcome::EmptyReplySuppressed;
    }

    if let Err(e) = inner.injector.inject(&capability, &response.reply).await {
        error!(sender = %request.sender, error = %e, "Failed to send reply");
        return Outcome::InjectionFailed;
    }

    if let Some(guard) = &inner.guard {
        guard.record_reply(&request.sender, &response.reply, Utc::now());
    }
    info!(sender = %request.sender, reply = %response.reply, "Reply sent");

    if inner.config.dismiss_after_reply
        && let Some(trigger) = &dismiss
        && let Err(e) = inner.injector.dismiss(trigger).await
    {
        warn!(sender = %request.sender, error = %e, "Failed to dismiss notification");
    }

    Outcome::Injected
}
