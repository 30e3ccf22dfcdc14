//! Feedback guard — keeps the relay from answering itself.
//!
//! Replies we inject usually come back as fresh notifications, and chatty
//! senders can trigger bursts. The guard remembers a bounded window of
//! recent traffic and rejects events that would start a loop.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::GuardConfig;
use crate::pipeline::types::DropReason;

/// Insertion-ordered set that forgets its oldest entries past `capacity`.
#[derive(Debug)]
struct BoundedSet {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl BoundedSet {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }

    fn insert(&mut self, value: String) {
        if !self.members.insert(value.clone()) {
            return;
        }
        self.order.push_back(value);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }
}

#[derive(Debug)]
struct GuardState {
    processed: BoundedSet,
    sent_replies: BoundedSet,
    last_reply: HashMap<String, DateTime<Utc>>,
}

/// Bounded memory of processed messages, sent replies and reply times.
#[derive(Debug)]
pub struct FeedbackGuard {
    config: GuardConfig,
    state: Mutex<GuardState>,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl FeedbackGuard {
    pub fn new(config: GuardConfig) -> Self {
        let state = GuardState {
            processed: BoundedSet::new(config.max_processed),
            sent_replies: BoundedSet::new(config.max_sent_replies),
            last_reply: HashMap::new(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Check an incoming message and, if admitted, mark it as processed.
    pub fn admit(&self, sender: &str, message: &str, now: DateTime<Utc>) -> Result<(), DropReason> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.sent_replies.contains(&normalize(message)) {
            return Err(DropReason::OwnReply);
        }

        let message_key = format!("{sender}:{message}");
        if state.processed.contains(&message_key) {
            return Err(DropReason::Duplicate);
        }

        if let Some(last) = state.last_reply.get(sender)
            && now.signed_duration_since(*last) < self.cooldown()
        {
            return Err(DropReason::Cooldown);
        }

        state.processed.insert(message_key);
        Ok(())
    }

    /// Remember a reply we delivered to `sender`.
    ///
    /// Senders whose cooldown has run out are forgotten here, so the reply
    /// times only cover senders answered within the last cooldown window.
    pub fn record_reply(&self, sender: &str, reply: &str, now: DateTime<Utc>) {
        let cooldown = self.cooldown();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sent_replies.insert(normalize(reply));
        state
            .last_reply
            .retain(|_, at| now.signed_duration_since(*at) < cooldown);
        state.last_reply.insert(sender.to_string(), now);
    }

    fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.cooldown).unwrap_or(chrono::Duration::MAX)
    }
}
