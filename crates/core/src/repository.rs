//! Persistence contracts the engine depends on. Implementations live outside
//! the core (Postgres in production, in-memory stores in the pipeline crate).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::automation::{Automation, AutomationStats, Segment, TriggerType};
use crate::error::CdpResult;
use crate::event::{Event, EventType};
use crate::profile::CustomerProfile;

/// Upper bound on rows returned by one abandoned-cart query.
pub const ABANDONED_CART_BATCH: usize = 100;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn save(&self, event: &Event) -> CdpResult<()>;

    /// Most recent events of a customer, newest first.
    async fn get_by_customer(&self, customer_id: &str, limit: usize) -> CdpResult<Vec<Event>>;

    /// Events of one type with `from <= timestamp <= to`, newest first.
    async fn get_by_type(
        &self,
        tenant_id: &str,
        event_type: EventType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CdpResult<Vec<Event>>;

    /// `add_to_cart` events older than `now - older_than` whose session has no
    /// later purchase and no `cart_abandoned` marker. At most
    /// [`ABANDONED_CART_BATCH`] rows.
    async fn get_abandoned_carts(
        &self,
        tenant_id: &str,
        older_than: Duration,
        now: DateTime<Utc>,
    ) -> CdpResult<Vec<Event>>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Upsert, last write wins.
    async fn save(&self, profile: &CustomerProfile) -> CdpResult<()>;

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> CdpResult<CustomerProfile>;

    async fn get_by_email(&self, tenant_id: &str, email: &str) -> CdpResult<CustomerProfile>;

    /// Returns one page of matches and the total match count.
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> CdpResult<(Vec<CustomerProfile>, usize)>;
}

#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn save(&self, segment: &Segment) -> CdpResult<()>;
    async fn get_by_id(&self, id: &str) -> CdpResult<Segment>;
    async fn list(&self, tenant_id: &str) -> CdpResult<Vec<Segment>>;
    async fn delete(&self, id: &str) -> CdpResult<()>;
    async fn add_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()>;
    async fn remove_member(&self, segment_id: &str, customer_id: &str) -> CdpResult<()>;
}

#[async_trait]
pub trait AutomationRepository: Send + Sync {
    async fn save(&self, automation: &Automation) -> CdpResult<()>;
    async fn get_by_id(&self, id: &str) -> CdpResult<Automation>;
    async fn list(&self, tenant_id: &str) -> CdpResult<Vec<Automation>>;
    async fn delete(&self, id: &str) -> CdpResult<()>;
    async fn get_by_trigger(
        &self,
        tenant_id: &str,
        trigger_type: TriggerType,
    ) -> CdpResult<Vec<Automation>>;
    /// Atomically add `delta` onto the stored automation's stats, leaving
    /// every other field as it is in the store.
    async fn record_stats(&self, id: &str, delta: &AutomationStats) -> CdpResult<()>;
}
