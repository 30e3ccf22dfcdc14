//! Shared types for the interception pipeline.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

// ── Inbound notification ────────────────────────────────────────────

/// One posted notification, as delivered by a source.
///
/// Sources convert their native format into this struct. The pipeline only
/// reads it and never keeps it past a single `handle` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Platform key of the posted notification.
    #[serde(default = "generate_key")]
    pub key: String,
    /// Package/application identifier that posted the notification.
    pub source_app: String,
    /// Title field. For messaging apps this is the sender.
    #[serde(default)]
    pub title: Option<String>,
    /// Body field. For messaging apps this is the message text.
    #[serde(default)]
    pub body: Option<String>,
    /// Set on notifications that summarize a bundle of others.
    #[serde(default)]
    pub is_group_summary: bool,
    /// Inline-reply affordances, in the order the platform lists them.
    #[serde(default)]
    pub reply_capabilities: Vec<ReplyCapability>,
    /// Handle that removes the notification from the shade, if the source
    /// publishes one.
    #[serde(default)]
    pub dismiss_trigger: Option<TriggerHandle>,
}

fn generate_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl NotificationEvent {
    /// Create an event with no title, body or reply capabilities.
    pub fn new(source_app: impl Into<String>) -> Self {
        Self {
            key: generate_key(),
            source_app: source_app.into(),
            title: None,
            body: None,
            is_group_summary: false,
            reply_capabilities: Vec::new(),
            dismiss_trigger: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_capability(mut self, capability: ReplyCapability) -> Self {
        self.reply_capabilities.push(capability);
        self
    }

    pub fn with_dismiss_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.dismiss_trigger = Some(TriggerHandle(trigger.into()));
        self
    }

    /// Sender and message, if both are present and non-empty.
    ///
    /// Values are returned verbatim.
    pub fn sender_and_message(&self) -> Option<(&str, &str)> {
        let sender = self.title.as_deref().filter(|s| !s.is_empty())?;
        let message = self.body.as_deref().filter(|s| !s.is_empty())?;
        Some((sender, message))
    }

    /// First reply capability, in listed order, that has at least one result slot.
    pub fn reply_capability(&self) -> Option<&ReplyCapability> {
        self.reply_capabilities.iter().find(|c| c.is_usable())
    }
}

// ── Reply capability ────────────────────────────────────────────────

/// An inline-reply affordance on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCapability {
    /// Button label, e.g. "Reply". Informational only.
    #[serde(default)]
    pub label: Option<String>,
    /// Slots that must receive the reply text before the trigger fires.
    #[serde(default)]
    pub result_slots: Vec<ResultSlot>,
    /// Handle used to fire the action.
    pub trigger: TriggerHandle,
}

impl ReplyCapability {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            label: None,
            result_slots: Vec::new(),
            trigger: TriggerHandle(trigger.into()),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_slot(mut self, key: impl Into<String>) -> Self {
        self.result_slots.push(ResultSlot { key: key.into() });
        self
    }

    /// Whether a reply can actually be delivered through this capability.
    pub fn is_usable(&self) -> bool {
        !self.result_slots.is_empty()
    }
}

/// A keyed field that receives the reply text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSlot {
    pub key: String,
}

/// Opaque handle the injector knows how to fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerHandle(pub String);

impl TriggerHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Response service payloads ───────────────────────────────────────

/// Request sent to the response service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub sender: String,
    pub message: String,
}

impl ChatRequest {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
        }
    }
}

/// Reply from the response service. An empty `reply` is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub original_message: String,
}

// ── Handling results ────────────────────────────────────────────────

/// Why an event was dropped before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Posted by an application other than the configured source.
    ForeignSource,
    /// Group summary notification.
    GroupSummary,
    /// Title or body absent or empty.
    MissingContent,
    /// No reply capability with a result slot.
    NoReplyAction,
    /// The message is one of our own recent replies.
    OwnReply,
    /// This exact sender/message pair was already handled.
    Duplicate,
    /// We replied to this sender too recently.
    Cooldown,
}

impl DropReason {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ForeignSource => "foreign_source",
            Self::GroupSummary => "group_summary",
            Self::MissingContent => "missing_content",
            Self::NoReplyAction => "no_reply_action",
            Self::OwnReply => "own_reply",
            Self::Duplicate => "duplicate",
            Self::Cooldown => "cooldown",
        }
    }
}

/// How a dispatched round trip ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reply was delivered through the reply capability.
    Injected,
    /// Reply received but auto-reply is switched off.
    AutoReplyDisabled,
    /// Empty reply received and the policy says not to send it.
    EmptyReplySuppressed,
    /// Transport or application failure talking to the service.
    ServiceFailed,
    /// Reply received but the trigger could not be fired.
    InjectionFailed,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Injected => "injected",
            Self::AutoReplyDisabled => "auto_reply_disabled",
            Self::EmptyReplySuppressed => "empty_reply_suppressed",
            Self::ServiceFailed => "service_failed",
            Self::InjectionFailed => "injection_failed",
        }
    }
}

/// Result of handing one event to the pipeline.
#[derive(Debug)]
pub enum Dispatch {
    /// Discarded without contacting the service.
    Dropped(DropReason),
    /// A round trip is in flight on its own task.
    Spawned(JoinHandle<Outcome>),
}

impl Dispatch {
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Self::Dropped(reason) => Some(*reason),
            Self::Spawned(_) => None,
        }
    }

    pub fn is_spawned(&self) -> bool {
        matches!(self, Self::Spawned(_))
    }
}
