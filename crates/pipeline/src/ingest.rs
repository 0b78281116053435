//! TrackEvent: persist, then enqueue for asynchronous processing.

use std::sync::Arc;

use cdp_core::error::CdpResult;
use cdp_core::event::Event;
use cdp_core::repository::EventRepository;
use cdp_core::shard::ShardRouter;
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::processor::EventProcessor;

pub type EventSenders = Vec<mpsc::Sender<Event>>;
pub type EventReceivers = Vec<mpsc::Receiver<Event>>;

pub fn event_channels(shards: usize, capacity: usize) -> (EventSenders, EventReceivers) {
    (0..shards.max(1))
        .map(|_| mpsc::channel(capacity.max(1)))
        .unzip()
}

/// Shard key of an event: its customer, or its session when anonymous.
pub fn partition_key(event: &Event) -> &str {
    event.customer().unwrap_or(&event.session_id)
}

pub struct EventIngestor {
    events: Arc<dyn EventRepository>,
    router: ShardRouter,
    shards: EventSenders,
    processor: Arc<EventProcessor>,
}

impl EventIngestor {
    pub fn new(
        events: Arc<dyn EventRepository>,
        shards: EventSenders,
        processor: Arc<EventProcessor>,
    ) -> Self {
        Self {
            events,
            router: ShardRouter::new(shards.len()),
            shards,
            processor,
        }
    }

    /// Assign id and timestamp, persist, and queue the event. A full or
    /// closed shard processes the event on the caller's task; events are
    /// never dropped once persisted.
    pub async fn track(&self, mut event: Event) -> CdpResult<Event> {
        event.id = Uuid::new_v4().to_string();
        event.timestamp = Utc::now();

        self.events.save(&event).await?;
        metrics::counter!("events.tracked").increment(1);

        let shard = self.router.shard_for(partition_key(&event));
        match self.shards[shard].try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(queued)) | Err(TrySendError::Closed(queued)) => {
                metrics::counter!("events.inline_fallback").increment(1);
                debug!(event_id = %queued.id, shard, "Event queue unavailable, processing inline");
                self.processor.process(&queued).await;
            }
        }

        Ok(event)
    }
}
