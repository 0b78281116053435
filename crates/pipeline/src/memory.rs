//! In-memory repositories backed by DashMap.
//!
//! Development and test doubles with the same contract as the production
//! stores. Nothing here survives a restart.

use std::collections::HashSet;

use async_trait::async_trait;
use cdp_core::automation::{Automation, AutomationStats, Segment, TriggerType};
use cdp_core::error::{CdpError, CdpResult};
use cdp_core::event::{Event, EventType};
use cdp_core::profile::CustomerProfile;
use cdp_core::repository::{
    AutomationRepository, CustomerRepository, EventRepository, SegmentRepository,
    ABANDONED_CART_BATCH,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;

/// Append-only event log.
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        info!("Event store initialized (in-memory, development mode)");
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

#[async_trait]
impl EventRepository for MemoryEventStore {
    async fn save(&self, event: &Event) -> CdpResult<()> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn get_by_customer(&self, customer_id: &str, limit: usize) -> CdpResult<Vec<Event>> {
        let matching = self
            .events
            .read()
            .iter()
            .filter(|e| e.customer() == Some(customer_id))
            .cloned()
            .collect();
        let mut events = newest_first(matching);
        events.truncate(limit);
        Ok(events)
    }

    async fn get_by_type(
        &self,
        tenant_id: &str,
        event_type: EventType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CdpResult<Vec<Event>> {
        let matching = self
            .events
            .read()
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.event_type == event_type
                    && e.timestamp >= from
                    && e.timestamp <= to
            })
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn get_abandoned_carts(
        &self,
        tenant_id: &str,
        older_than: Duration,
        now: DateTime<Utc>,
    ) -> CdpResult<Vec<Event>> {
        let cutoff = now - older_than;
        let events = self.events.read();

        let marked: HashSet<&str> = events
            .iter()
            .filter(|e| e.event_type == EventType::CartAbandoned)
            .map(|e| e.session_id.as_str())
            .collect();

        let abandoned = events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.event_type == EventType::AddToCart
                    && e.timestamp < cutoff
                    && !marked.contains(e.session_id.as_str())
            })
            .filter(|cart| {
                !events.iter().any(|p| {
                    p.event_type == EventType::Purchase
                        && p.session_id == cart.session_id
                        && p.timestamp > cart.timestamp
                })
            })
            .take(ABANDONED_CART_BATCH)
            .cloned()
            .collect();
        Ok(abandoned)
    }
}

fn customer_key(tenant_id: &str, id: &str) -> String {
    format!("{}:{}", tenant_id, id)
}

pub struct MemoryCustomerStore {
    profiles: DashMap<String, CustomerProfile>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        info!("Customer store initialized (in-memory, development mode)");
        Self {
            profiles: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for MemoryCustomerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(profile: &CustomerProfile, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    [
        profile.id.as_str(),
        profile.email.as_str(),
        profile.phone.as_str(),
        profile.first_name.as_str(),
        profile.last_name.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(query))
}

#[async_trait]
impl CustomerRepository for MemoryCustomerStore {
    async fn save(&self, profile: &CustomerProfile) -> CdpResult<()> {
        self.profiles
            .insert(customer_key(&profile.tenant_id, &profile.id), profile.clone());
        Ok(())
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> CdpResult<CustomerProfile> {
        self.profiles
            .get(&customer_key(tenant_id, id))
            .map(|r| r.value().clone())
            .ok_or_else(|| CdpError::not_found("customer", id))
    }

    async fn get_by_email(&self, tenant_id: &str, email: &str) -> CdpResult<CustomerProfile> {
        self.profiles
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.email.eq_ignore_ascii_case(email))
            .map(|r| r.value().clone())
            .ok_or_else(|| CdpError::not_found("customer", email))
    }

    /// Case-insensitive substring match over id, email, phone and names,
    /// ordered by id for stable paging.
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> CdpResult<(Vec<CustomerProfile>, usize)> {
        let query = query.trim().to_lowercase();
        let mut matches: Vec<CustomerProfile> = self
            .profiles
            .iter()
            .filter(|r| r.tenant_id == tenant_id && matches_query(r.value(), &query))
            .map(|r| r.value().clone())
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        let total = matches.len();
        let page = matches.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

pub struct MemorySegmentStore {
    segments: DashMap<String, Segment>,
    members: DashMap<String, HashSet<String>>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        info!("Segment store initialized (in-memory, development mode)");
        Self {
            segments: DashMap::new(),
            members: DashMap::new(),
        }
    }

    pub fn members(&self, segment_id: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .members
            .get(segment_id)
            .map(|r| r.value().iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

impl Default for MemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentRepository for MemorySegmentStore {
    async fn save(&self, segment: &Segment) -> CdpResult<()> {
        self.segments.insert(segment.id.clone(), segment.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CdpResult<Segment> {
        self.segments
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CdpError::not_found("segment", id))
    }

    async fn list(&self, tenant_id: &str) -> CdpResult<Vec<Segment>> {
        let mut segments: Vec<Segment> = self
            .segments
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .collect();
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(segments)
    }

    async fn delete(&self, id: &str) -> CdpResult<()> {
        self.members.remove(id);
        self.segments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CdpError::not_found("segment", id))
    }

    async fn add_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()> {
        let mut segment = self
            .segments
            .get_mut(segment_id)
            .ok_or_else(|| CdpError::not_found("segment", segment_id))?;
        let mut members = self.members.entry(segment_id.to_string()).or_default();
        if members.insert(customer_id.to_string()) {
            segment.member_count = members.len() as u64;
            segment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn remove_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()> {
        let mut segment = self
            .segments
            .get_mut(segment_id)
            .ok_or_else(|| CdpError::not_found("segment", segment_id))?;
        if let Some(mut members) = self.members.get_mut(segment_id) {
            if members.remove(customer_id) {
                segment.member_count = members.len() as u64;
                segment.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}

pub struct MemoryAutomationStore {
    automations: DashMap<String, Automation>,
}

impl MemoryAutomationStore {
    pub fn new() -> Self {
        info!("Automation store initialized (in-memory, development mode)");
        Self {
            automations: DashMap::new(),
        }
    }
}

impl Default for MemoryAutomationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationRepository for MemoryAutomationStore {
    async fn save(&self, automation: &Automation) -> CdpResult<()> {
        self.automations
            .insert(automation.id.clone(), automation.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CdpResult<Automation> {
        self.automations
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CdpError::not_found("automation", id))
    }

    async fn list(&self, tenant_id: &str) -> CdpResult<Vec<Automation>> {
        let mut automations: Vec<Automation> = self
            .automations
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .collect();
        automations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(automations)
    }

    async fn delete(&self, id: &str) -> CdpResult<()> {
        self.automations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CdpError::not_found("automation", id))
    }

    async fn get_by_trigger(
        &self,
        tenant_id: &str,
        trigger_type: TriggerType,
    ) -> CdpResult<Vec<Automation>> {
        let mut automations: Vec<Automation> = self
            .automations
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.trigger_type == trigger_type)
            .map(|r| r.value().clone())
            .collect();
        automations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(automations)
    }

    async fn record_stats(&self, id: &str, delta: &AutomationStats) -> CdpResult<()> {
        let mut entry = self
            .automations
            .get_mut(id)
            .ok_or_else(|| CdpError::not_found("automation", id))?;
        entry.stats.accumulate(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_core::automation::SegmentKind;

    fn event_at(session: &str, event_type: EventType, at: DateTime<Utc>) -> Event {
        let mut event = Event::new("t1", Some("c1".into()), session, event_type);
        event.timestamp = at;
        event
    }

    #[tokio::test]
    async fn test_abandoned_carts_query() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        let old = now - Duration::hours(2);

        // idle cart
        store.save(&event_at("s-idle", EventType::AddToCart, old)).await.unwrap();
        // purchased later
        store.save(&event_at("s-bought", EventType::AddToCart, old)).await.unwrap();
        store
            .save(&event_at("s-bought", EventType::Purchase, old + Duration::minutes(5)))
            .await
            .unwrap();
        // already marked
        store.save(&event_at("s-marked", EventType::AddToCart, old)).await.unwrap();
        store.save(&event_at("s-marked", EventType::CartAbandoned, now)).await.unwrap();
        // too recent
        store.save(&event_at("s-fresh", EventType::AddToCart, now)).await.unwrap();

        let carts = store
            .get_abandoned_carts("t1", Duration::hours(1), now)
            .await
            .unwrap();
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].session_id, "s-idle");

        let other_tenant = store
            .get_abandoned_carts("t2", Duration::hours(1), now)
            .await
            .unwrap();
        assert!(other_tenant.is_empty());
    }

    #[tokio::test]
    async fn test_customer_events_newest_first_with_limit() {
        let store = MemoryEventStore::new();
        let now = Utc::now();
        for minutes in [30, 10, 20] {
            store
                .save(&event_at("s1", EventType::PageView, now - Duration::minutes(minutes)))
                .await
                .unwrap();
        }
        let events = store.get_by_customer("c1", 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, now - Duration::minutes(10));
        assert_eq!(events[1].timestamp, now - Duration::minutes(20));
    }

    #[tokio::test]
    async fn test_customer_search_pages() {
        let store = MemoryCustomerStore::new();
        for i in 0..5 {
            let profile = CustomerProfile::new("t1", format!("c{}", i))
                .with_email(format!("user{}@example.com", i));
            store.save(&profile).await.unwrap();
        }
        store
            .save(&CustomerProfile::new("t2", "c9").with_email("user9@example.com"))
            .await
            .unwrap();

        let (page, total) = store.search("t1", "EXAMPLE", 2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "c2");

        let (page, total) = store.search("t1", "user4", 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, "c4");

        let found = store.get_by_email("t1", "USER3@example.com").await.unwrap();
        assert_eq!(found.id, "c3");
        assert!(store.get_by_id("t2", "c1").await.is_err());
    }

    #[tokio::test]
    async fn test_segment_membership_counts() {
        let store = MemorySegmentStore::new();
        let mut segment = Segment::new("t1", "VIP", SegmentKind::Static);
        segment.id = "seg-1".to_string();
        store.save(&segment).await.unwrap();

        store.add_member("seg-1", "c1").await.unwrap();
        store.add_member("seg-1", "c1").await.unwrap();
        store.add_member("seg-1", "c2").await.unwrap();
        assert_eq!(store.get_by_id("seg-1").await.unwrap().member_count, 2);

        store.remove_member("seg-1", "c1").await.unwrap();
        assert_eq!(store.members("seg-1"), vec!["c2".to_string()]);
        assert_eq!(store.get_by_id("seg-1").await.unwrap().member_count, 1);

        assert!(matches!(
            store.add_member("missing", "c1").await,
            Err(CdpError::NotFound { kind: "segment", .. })
        ));
    }

    #[tokio::test]
    async fn test_record_stats_keeps_config_edits() {
        let store = MemoryAutomationStore::new();
        let mut automation = Automation::new("t1", "welcome", TriggerType::Welcome, vec![]);
        automation.id = "a1".to_string();
        store.save(&automation).await.unwrap();

        // An edit saved after the executor loaded its copy must survive.
        automation.is_active = false;
        store.save(&automation).await.unwrap();

        let delta = AutomationStats {
            total_triggered: 1,
            total_sent: 2,
            ..Default::default()
        };
        store.record_stats("a1", &delta).await.unwrap();
        store.record_stats("a1", &delta).await.unwrap();

        let stored = store.get_by_id("a1").await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.stats.total_triggered, 2);
        assert_eq!(stored.stats.total_sent, 4);
        assert!(store.record_stats("missing", &delta).await.is_err());
    }
}
