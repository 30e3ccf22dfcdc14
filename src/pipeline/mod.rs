//! Interception-and-reply pipeline.
//!
//! Every notification from a source flows through:
//! 1. `InterceptionPipeline::handle()` — filter, extract, pick a reply action
//! 2. `ResponseService::send()` — remote reply generation, on its own task
//! 3. `ReplyInjector::inject()` — deliver the reply inline
//!
//! The optional `FeedbackGuard` sits between steps 1 and 2.

pub mod guard;
pub mod processor;
pub mod types;

pub use processor::InterceptionPipeline;
pub use types::{
    ChatRequest, ChatResponse, Dispatch, DropReason, NotificationEvent, Outcome,
    ReplyCapability, ResultSlot, TriggerHandle,
};
