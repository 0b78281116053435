//! Outbound message delivery contract. One sender per channel; provider
//! protocols (SMTP, SMS gateways, Telegram Bot API) sit behind it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CdpResult;

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> CdpResult<()>;
}

/// Per-channel senders. A `None` channel turns its action type into a no-op.
#[derive(Clone, Default)]
pub struct Senders {
    pub email: Option<Arc<dyn MessageSender>>,
    pub sms: Option<Arc<dyn MessageSender>>,
    pub push: Option<Arc<dyn MessageSender>>,
    pub telegram: Option<Arc<dyn MessageSender>>,
    pub webhook: Option<Arc<dyn MessageSender>>,
}

impl Senders {
    pub fn with_email(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.email = Some(sender);
        self
    }

    pub fn with_sms(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sms = Some(sender);
        self
    }

    pub fn with_push(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.push = Some(sender);
        self
    }

    pub fn with_telegram(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.telegram = Some(sender);
        self
    }

    pub fn with_webhook(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.webhook = Some(sender);
        self
    }
}

impl std::fmt::Debug for Senders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Senders")
            .field("email", &self.email.is_some())
            .field("sms", &self.sms.is_some())
            .field("push", &self.push.is_some())
            .field("telegram", &self.telegram.is_some())
            .field("webhook", &self.webhook.is_some())
            .finish()
    }
}
