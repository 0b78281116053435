//! Sender that only logs deliveries. Stands in for real providers in
//! development and in the demo daemon.

use std::collections::HashMap;

use async_trait::async_trait;
use cdp_core::error::CdpResult;
use cdp_core::sender::MessageSender;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LoggingSender {
    channel: &'static str,
}

impl LoggingSender {
    pub fn new(channel: &'static str) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> CdpResult<()> {
        metrics::counter!("sender.messages", "channel" => self.channel).increment(1);
        info!(
            channel = self.channel,
            recipient,
            subject,
            content_len = content.len(),
            data_keys = data.len(),
            "Message delivered (logging sender)"
        );
        Ok(())
    }
}
