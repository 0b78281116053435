//! In-crate test doubles for the repository and sender contracts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cdp_core::automation::{Automation, AutomationStats, Segment, TriggerType};
use cdp_core::error::{CdpError, CdpResult};
use cdp_core::profile::CustomerProfile;
use cdp_core::repository::{AutomationRepository, CustomerRepository, SegmentRepository};
use cdp_core::sender::MessageSender;
use cdp_core::shard::{ShardRouter, WriterLocks};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::delay::DelayScheduler;
use crate::executor::AutomationExecutor;

#[derive(Default)]
pub struct Automations(pub Mutex<HashMap<String, Automation>>);

impl Automations {
    pub fn with(automation: Automation) -> Arc<Self> {
        let repo = Self::default();
        repo.0.lock().insert(automation.id.clone(), automation);
        Arc::new(repo)
    }
}

#[async_trait]
impl AutomationRepository for Automations {
    async fn save(&self, automation: &Automation) -> CdpResult<()> {
        self.0.lock().insert(automation.id.clone(), automation.clone());
        Ok(())
    }
    async fn get_by_id(&self, id: &str) -> CdpResult<Automation> {
        self.0
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| CdpError::not_found("automation", id))
    }
    async fn list(&self, tenant_id: &str) -> CdpResult<Vec<Automation>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
    async fn delete(&self, id: &str) -> CdpResult<()> {
        self.0.lock().remove(id);
        Ok(())
    }
    async fn get_by_trigger(
        &self,
        tenant_id: &str,
        trigger_type: TriggerType,
    ) -> CdpResult<Vec<Automation>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.trigger_type == trigger_type)
            .cloned()
            .collect())
    }
    async fn record_stats(&self, id: &str, delta: &AutomationStats) -> CdpResult<()> {
        let mut automations = self.0.lock();
        let automation = automations
            .get_mut(id)
            .ok_or_else(|| CdpError::not_found("automation", id))?;
        automation.stats.accumulate(delta);
        Ok(())
    }
}

#[derive(Default)]
pub struct Customers(pub Mutex<HashMap<String, CustomerProfile>>);

impl Customers {
    pub fn with(profile: CustomerProfile) -> Arc<Self> {
        let repo = Self::default();
        repo.0.lock().insert(profile.id.clone(), profile);
        Arc::new(repo)
    }

    pub fn get(&self, id: &str) -> Option<CustomerProfile> {
        self.0.lock().get(id).cloned()
    }
}

#[async_trait]
impl CustomerRepository for Customers {
    async fn save(&self, profile: &CustomerProfile) -> CdpResult<()> {
        self.0.lock().insert(profile.id.clone(), profile.clone());
        Ok(())
    }
    async fn get_by_id(&self, _tenant_id: &str, id: &str) -> CdpResult<CustomerProfile> {
        self.get(id).ok_or_else(|| CdpError::not_found("customer", id))
    }
    async fn get_by_email(&self, _tenant_id: &str, email: &str) -> CdpResult<CustomerProfile> {
        self.0
            .lock()
            .values()
            .find(|c| c.email == email)
            .cloned()
            .ok_or_else(|| CdpError::not_found("customer", email))
    }
    async fn search(
        &self,
        _tenant_id: &str,
        _query: &str,
        _limit: usize,
        _offset: usize,
    ) -> CdpResult<(Vec<CustomerProfile>, usize)> {
        Ok((Vec::new(), 0))
    }
}

/// Records segment membership as (segment_id, customer_id) pairs.
#[derive(Default)]
pub struct Segments(pub Mutex<Vec<(String, String)>>);

#[async_trait]
impl SegmentRepository for Segments {
    async fn save(&self, _segment: &Segment) -> CdpResult<()> {
        Ok(())
    }
    async fn get_by_id(&self, id: &str) -> CdpResult<Segment> {
        Err(CdpError::not_found("segment", id))
    }
    async fn list(&self, _tenant_id: &str) -> CdpResult<Vec<Segment>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _id: &str) -> CdpResult<()> {
        Ok(())
    }
    async fn add_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()> {
        self.0
            .lock()
            .push((segment_id.to_string(), customer_id.to_string()));
        Ok(())
    }
    async fn remove_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()> {
        self.0
            .lock()
            .retain(|(s, c)| !(s == segment_id && c == customer_id));
        Ok(())
    }
}

/// Sender that appends "channel:recipient" to a shared log, or fails.
pub struct Recording {
    pub channel: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

#[async_trait]
impl MessageSender for Recording {
    async fn send(
        &self,
        recipient: &str,
        _subject: &str,
        _content: &str,
        _data: &HashMap<String, serde_json::Value>,
    ) -> CdpResult<()> {
        if self.fail {
            return Err(CdpError::Internal(anyhow::anyhow!("{} provider down", self.channel)));
        }
        self.log.lock().push(format!("{}:{}", self.channel, recipient));
        Ok(())
    }
}

pub fn recording(
    channel: &'static str,
    log: &Arc<Mutex<Vec<String>>>,
    fail: bool,
) -> Arc<dyn MessageSender> {
    Arc::new(Recording {
        channel,
        log: log.clone(),
        fail,
    })
}

/// Single-shard executor wiring plus the continuation receiver.
pub struct Harness {
    pub executor: Arc<AutomationExecutor>,
    pub delays: Arc<DelayScheduler>,
    pub continuations: mpsc::Receiver<cdp_core::AutomationExecution>,
}

pub fn harness(
    automations: Arc<Automations>,
    customers: Arc<Customers>,
    segments: Arc<Segments>,
    senders: cdp_core::Senders,
) -> Harness {
    let router = ShardRouter::new(1);
    let (tx, rx) = mpsc::channel(16);
    let delays = Arc::new(DelayScheduler::new(router, vec![tx]));
    let executor = Arc::new(AutomationExecutor::new(
        automations,
        customers,
        segments,
        senders,
        Arc::new(WriterLocks::new(router)),
        delays.clone(),
    ));
    Harness {
        executor,
        delays,
        continuations: rx,
    }
}
