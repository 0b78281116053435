//! Engine wiring and the service facade.
//!
//! [`CdpService::start`] builds both sharded queues, spawns one consumer per
//! shard plus the delay timer and any configured scanners, and returns the
//! facade used by transports and the daemon.

use std::sync::Arc;
use std::time::Duration;

use cdp_automation::{
    execution_channels, AutomationExecutor, DelayScheduler, ExecutionQueue, TriggerMatcher,
};
use cdp_core::automation::{Automation, Segment};
use cdp_core::config::AppConfig;
use cdp_core::error::CdpResult;
use cdp_core::event::Event;
use cdp_core::profile::CustomerProfile;
use cdp_core::repository::{
    AutomationRepository, CustomerRepository, EventRepository, SegmentRepository,
};
use cdp_core::sender::Senders;
use cdp_core::shard::{ShardRouter, WriterLocks};
use cdp_core::worker::{shutdown_channel, ShutdownSender, ShutdownSignal};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::ingest::{event_channels, EventIngestor};
use crate::memory::{
    MemoryAutomationStore, MemoryCustomerStore, MemoryEventStore, MemorySegmentStore,
};
use crate::processor::EventProcessor;
use crate::scanner::CartAbandonmentScanner;

/// The persistence collaborators the engine runs against.
#[derive(Clone)]
pub struct Repositories {
    pub events: Arc<dyn EventRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub segments: Arc<dyn SegmentRepository>,
    pub automations: Arc<dyn AutomationRepository>,
}

impl Repositories {
    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(MemoryEventStore::new()),
            customers: Arc::new(MemoryCustomerStore::new()),
            segments: Arc::new(MemorySegmentStore::new()),
            automations: Arc::new(MemoryAutomationStore::new()),
        }
    }
}

pub struct CdpService {
    repos: Repositories,
    ingestor: Arc<EventIngestor>,
    delays: Arc<DelayScheduler>,
    shutdown: ShutdownSender,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CdpService {
    /// Build and start the engine. Must be called inside a Tokio runtime.
    pub fn start(config: &AppConfig, repos: Repositories, senders: Senders) -> Self {
        let pipeline = &config.pipeline;
        let (shutdown, signal) = shutdown_channel();
        let mut handles = Vec::new();

        let locks = Arc::new(WriterLocks::new(ShardRouter::new(pipeline.event_shards)));

        let (exec_tx, exec_rx) = execution_channels(
            pipeline.execution_shards,
            pipeline.execution_shard_capacity(),
        );
        let delays = Arc::new(DelayScheduler::new(
            ShardRouter::new(exec_tx.len()),
            exec_tx.clone(),
        ));
        let executor = Arc::new(AutomationExecutor::new(
            repos.automations.clone(),
            repos.customers.clone(),
            repos.segments.clone(),
            senders,
            locks.clone(),
            delays.clone(),
        ));
        let executions = Arc::new(ExecutionQueue::new(
            exec_tx,
            pipeline.execution_overflow,
            executor.clone(),
        ));

        for (shard, rx) in exec_rx.into_iter().enumerate() {
            handles.push(tokio::spawn(executor.clone().run(shard, rx, signal.clone())));
        }
        handles.push(tokio::spawn(delays.clone().run(signal.clone())));

        let processor = Arc::new(EventProcessor::new(
            repos.customers.clone(),
            locks,
            TriggerMatcher::new(repos.automations.clone()),
            executions,
        ));
        let (event_tx, event_rx) =
            event_channels(pipeline.event_shards, pipeline.event_shard_capacity());
        for (shard, rx) in event_rx.into_iter().enumerate() {
            handles.push(tokio::spawn(processor.clone().run(shard, rx, signal.clone())));
        }
        let ingestor = Arc::new(EventIngestor::new(
            repos.events.clone(),
            event_tx,
            processor,
        ));

        info!(
            node_id = %config.node_id,
            event_shards = pipeline.event_shards.max(1),
            event_shard_capacity = pipeline.event_shard_capacity(),
            execution_shards = pipeline.execution_shards.max(1),
            execution_shard_capacity = pipeline.execution_shard_capacity(),
            execution_overflow = ?pipeline.execution_overflow,
            "CDP engine started"
        );

        let service = Self {
            repos,
            ingestor,
            delays,
            shutdown,
            handles: Mutex::new(handles),
        };

        if config.scanner.enabled {
            for tenant_id in &config.scanner.tenants {
                service.spawn_cart_scanner(
                    tenant_id,
                    Duration::from_secs(config.scanner.interval_secs),
                    Duration::from_secs(config.scanner.abandon_after_secs),
                );
            }
        }

        service
    }

    /// TrackEvent. Returns the event as stored, with id and timestamp set.
    pub async fn track_event(&self, event: Event) -> CdpResult<Event> {
        self.ingestor.track(event).await
    }

    /// Create or replace a customer profile.
    pub async fn save_customer(&self, mut profile: CustomerProfile) -> CdpResult<CustomerProfile> {
        if profile.id.is_empty() {
            profile.id = Uuid::new_v4().to_string();
        }
        profile.updated_at = Utc::now();
        self.repos.customers.save(&profile).await?;
        Ok(profile)
    }

    pub async fn get_customer(&self, tenant_id: &str, id: &str) -> CdpResult<CustomerProfile> {
        self.repos.customers.get_by_id(tenant_id, id).await
    }

    pub async fn search_customers(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> CdpResult<(Vec<CustomerProfile>, usize)> {
        self.repos
            .customers
            .search(tenant_id, query, limit, offset)
            .await
    }

    pub async fn customer_events(&self, customer_id: &str, limit: usize) -> CdpResult<Vec<Event>> {
        self.repos.events.get_by_customer(customer_id, limit).await
    }

    pub async fn create_segment(&self, mut segment: Segment) -> CdpResult<Segment> {
        let now = Utc::now();
        segment.id = Uuid::new_v4().to_string();
        segment.created_at = now;
        segment.updated_at = now;
        self.repos.segments.save(&segment).await?;
        info!(segment_id = %segment.id, tenant_id = %segment.tenant_id, name = %segment.name, "Segment created");
        Ok(segment)
    }

    pub async fn get_segment(&self, id: &str) -> CdpResult<Segment> {
        self.repos.segments.get_by_id(id).await
    }

    pub async fn list_segments(&self, tenant_id: &str) -> CdpResult<Vec<Segment>> {
        self.repos.segments.list(tenant_id).await
    }

    pub async fn create_automation(&self, mut automation: Automation) -> CdpResult<Automation> {
        let now = Utc::now();
        automation.id = Uuid::new_v4().to_string();
        automation.created_at = now;
        automation.updated_at = now;
        self.repos.automations.save(&automation).await?;
        info!(
            automation_id = %automation.id,
            tenant_id = %automation.tenant_id,
            trigger = %automation.trigger_type,
            actions = automation.actions.len(),
            "Automation created"
        );
        Ok(automation)
    }

    pub async fn get_automation(&self, id: &str) -> CdpResult<Automation> {
        self.repos.automations.get_by_id(id).await
    }

    pub async fn list_automations(&self, tenant_id: &str) -> CdpResult<Vec<Automation>> {
        self.repos.automations.list(tenant_id).await
    }

    /// Start a periodic cart-abandonment scan for `tenant_id`. It stops with
    /// the service.
    pub fn spawn_cart_scanner(&self, tenant_id: &str, interval: Duration, abandon_after: Duration) {
        let scanner = self.cart_scanner(tenant_id, interval, abandon_after);
        let handle = tokio::spawn(scanner.run(self.shutdown_signal()));
        self.handles.lock().push(handle);
    }

    /// A scanner bound to this service, for callers that drive scans
    /// themselves.
    pub fn cart_scanner(
        &self,
        tenant_id: &str,
        interval: Duration,
        abandon_after: Duration,
    ) -> CartAbandonmentScanner {
        CartAbandonmentScanner::new(
            tenant_id,
            self.repos.events.clone(),
            self.ingestor.clone(),
            interval,
            abandon_after,
        )
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }

    /// Delayed continuations not yet re-enqueued.
    pub fn pending_continuations(&self) -> usize {
        self.delays.pending()
    }

    /// Signal every task to stop and wait for them. Buffered queue items are
    /// drained first; pending delayed continuations are discarded.
    pub async fn shutdown(&self) {
        info!("Shutting down CDP engine");
        self.shutdown.send_replace(true);

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Engine task panicked");
            }
        }
        info!("CDP engine stopped");
    }
}
