//! Reply injection — fires a notification's inline-reply action.
//!
//! The reply lands in the original conversation as if the user had typed it
//! into the notification's reply box.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::InjectionError;
use crate::pipeline::types::{ReplyCapability, TriggerHandle};

/// Delivers a reply through a reply capability.
#[async_trait]
pub trait ReplyInjector: Send + Sync {
    /// Fill every result slot with `text` and fire the capability's trigger.
    async fn inject(&self, capability: &ReplyCapability, text: &str)
        -> Result<(), InjectionError>;

    /// Remove the answered notification from the shade.
    async fn dismiss(&self, trigger: &TriggerHandle) -> Result<(), InjectionError>;
}

/// Payload delivered when a trigger fires: one value per result slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyResults {
    pub results: BTreeMap<String, String>,
}

impl ReplyResults {
    /// Attach `text` to every result slot of the capability.
    pub fn fill(capability: &ReplyCapability, text: &str) -> Result<Self, InjectionError> {
        if capability.result_slots.is_empty() {
            return Err(InjectionError::NoResultSlots);
        }
        let results = capability
            .result_slots
            .iter()
            .map(|slot| (slot.key.clone(), text.to_string()))
            .collect();
        Ok(Self { results })
    }
}

/// Fires triggers published by a device-side bridge.
///
/// The trigger handle is the callback URL of the reply action; firing it is
/// a `POST` of the filled [`ReplyResults`]. Dismiss handles are fired the
/// same way with an empty object.
pub struct HttpTriggerInjector {
    client: reqwest::Client,
}

impl HttpTriggerInjector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fire<T: Serialize + Sync>(
        &self,
        trigger: &TriggerHandle,
        payload: &T,
    ) -> Result<(), InjectionError> {
        let handle = trigger.as_str();
        let url = reqwest::Url::parse(handle).map_err(|e| InjectionError::InvalidTrigger {
            handle: handle.to_string(),
            reason: e.to_string(),
        })?;

        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| InjectionError::TriggerFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InjectionError::TriggerFailed(format!(
                "trigger returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

impl Default for HttpTriggerInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyInjector for HttpTriggerInjector {
    async fn inject(
        &self,
        capability: &ReplyCapability,
        text: &str,
    ) -> Result<(), InjectionError> {
        let payload = ReplyResults::fill(capability, text)?;

        debug!(
            trigger = %capability.trigger,
            slots = payload.results.len(),
            "Firing reply trigger"
        );
        self.fire(&capability.trigger, &payload).await?;

        info!(
            action = capability.label.as_deref().unwrap_or("reply"),
            "Reply trigger fired"
        );
        Ok(())
    }

    async fn dismiss(&self, trigger: &TriggerHandle) -> Result<(), InjectionError> {
        debug!(trigger = %trigger, "Dismissing notification");
        self.fire(trigger, &serde_json::json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_sets_every_slot() {
        let capability = ReplyCapability::new("http://bridge/a")
            .with_slot("reply_text")
            .with_slot("android.remoteinput.results");
        let results = ReplyResults::fill(&capability, "hello!").unwrap();
        assert_eq!(results.results.len(), 2);
        assert!(results.results.values().all(|v| v == "hello!"));
    }

    #[test]
    fn fill_without_slots_fails() {
        let capability = ReplyCapability::new("http://bridge/a");
        assert!(matches!(
            ReplyResults::fill(&capability, "x"),
            Err(InjectionError::NoResultSlots)
        ));
    }

    #[tokio::test]
    async fn inject_posts_results_to_trigger() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/actions/42")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"results": {"reply_text": "hello!"}}),
            ))
            .with_status(200)
            .create_async()
            .await;

        let capability = ReplyCapability::new(format!("{}/actions/42", server.url()))
            .with_label("Reply")
            .with_slot("reply_text");

        HttpTriggerInjector::new()
            .inject(&capability, "hello!")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn inject_reports_rejected_trigger() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/actions/gone")
            .with_status(410)
            .with_body("notification dismissed")
            .create_async()
            .await;

        let capability =
            ReplyCapability::new(format!("{}/actions/gone", server.url())).with_slot("reply_text");
        let err = HttpTriggerInjector::new()
            .inject(&capability, "hello!")
            .await
            .unwrap_err();

        match err {
            InjectionError::TriggerFailed(reason) => assert!(reason.contains("410")),
            other => panic!("Expected TriggerFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn inject_rejects_malformed_handle() {
        let capability = ReplyCapability::new("not a url").with_slot("reply_text");
        let err = HttpTriggerInjector::new()
            .inject(&capability, "hello!")
            .await
            .unwrap_err();
        assert!(matches!(err, InjectionError::InvalidTrigger { .. }));
    }

    #[tokio::test]
    async fn dismiss_posts_to_dismiss_handle() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/dismiss/7")
            .match_body(mockito::Matcher::Json(serde_json::json!({})))
            .with_status(204)
            .create_async()
            .await;

        let trigger = TriggerHandle(format!("{}/dismiss/7", server.url()));
        HttpTriggerInjector::new().dismiss(&trigger).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn dismiss_reports_rejected_handle() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/dismiss/gone")
            .with_status(404)
            .create_async()
            .await;

        let trigger = TriggerHandle(format!("{}/dismiss/gone", server.url()));
        let err = HttpTriggerInjector::new().dismiss(&trigger).await.unwrap_err();
        assert!(matches!(err, InjectionError::TriggerFailed(_)));
    }
}
