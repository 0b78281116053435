//! Event processor: folds one event into its customer's profile, rescores the
//! profile, and hands matched automations to the execution queue.

use std::sync::Arc;

use cdp_automation::{ExecutionQueue, TriggerMatcher};
use cdp_core::event::{Event, EventType};
use cdp_core::profile::{push_recent, CustomerProfile, MAX_FAVORITES};
use cdp_core::repository::CustomerRepository;
use cdp_core::shard::WriterLocks;
use cdp_core::worker::{run_consumer, ShutdownSignal};
use cdp_scoring::{LifecycleClassifier, RfmScorer};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Apply the counter effects of `event` to `profile`. Event types without a
/// counter (add_to_cart among them) only touch the activity timestamps.
pub fn apply_event(profile: &mut CustomerProfile, event: &Event) {
    profile.last_activity = event.timestamp;

    match event.event_type {
        EventType::ProductView => {
            profile.products_viewed += 1;
            if let Some(category) = event.property_str("category_id") {
                push_recent(&mut profile.favorite_categories, category, MAX_FAVORITES);
            }
            if let Some(brand) = event.property_str("brand_id") {
                push_recent(&mut profile.favorite_brands, brand, MAX_FAVORITES);
            }
        }
        EventType::Search => profile.search_count += 1,
        EventType::CartAbandoned => profile.cart_abandons += 1,
        EventType::Purchase => {
            profile.total_orders += 1;
            if let Some(amount) = event.property_f64("amount") {
                profile.total_spent += amount;
            }
            profile.last_order_date = Some(event.timestamp);
            profile.days_since_order = 0;
            profile.average_order_value = profile.total_spent / profile.total_orders as f64;
        }
        EventType::WishlistAdd => profile.wishlist_items += 1,
        EventType::WishlistRemove => {
            profile.wishlist_items = profile.wishlist_items.saturating_sub(1)
        }
        EventType::Review => profile.reviews_written += 1,
        EventType::Return => profile.returns_count += 1,
        _ => {}
    }
}

pub struct EventProcessor {
    customers: Arc<dyn CustomerRepository>,
    locks: Arc<WriterLocks>,
    scorer: RfmScorer,
    classifier: LifecycleClassifier,
    matcher: TriggerMatcher,
    executions: Arc<ExecutionQueue>,
}

impl EventProcessor {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        locks: Arc<WriterLocks>,
        matcher: TriggerMatcher,
        executions: Arc<ExecutionQueue>,
    ) -> Self {
        Self {
            customers,
            locks,
            scorer: RfmScorer::new(),
            classifier: LifecycleClassifier::new(),
            matcher,
            executions,
        }
    }

    pub async fn process(&self, event: &Event) {
        self.process_at(event, Utc::now()).await
    }

    /// Profile update and trigger matching for one event, with scoring
    /// evaluated at `now`.
    pub async fn process_at(&self, event: &Event, now: DateTime<Utc>) {
        if let Some(customer_id) = event.customer() {
            self.update_profile(event, customer_id, now).await;
        }

        // Writer lock released: inline executions may take it for tag actions.
        for execution in self.matcher.match_event(event).await {
            if let Err(e) = self.executions.submit(execution).await {
                debug!(error = %e, event_id = %event.id, "Execution not queued");
            }
        }
        metrics::counter!("events.processed").increment(1);
    }

    async fn update_profile(&self, event: &Event, customer_id: &str, now: DateTime<Utc>) {
        let _guard = self.locks.lock(customer_id).await;

        let mut profile = match self.customers.get_by_id(&event.tenant_id, customer_id).await {
            Ok(profile) => profile,
            Err(e) => {
                metrics::counter!("events.profile_skipped").increment(1);
                warn!(
                    error = %e,
                    event_id = %event.id,
                    customer_id,
                    "Profile unavailable, skipping update"
                );
                return;
            }
        };

        apply_event(&mut profile, event);
        profile.updated_at = now;
        let score = self.scorer.apply(&mut profile, now);
        let stage = self.classifier.apply(&mut profile, now);

        if let Err(e) = self.customers.save(&profile).await {
            metrics::counter!("events.profile_save_errors").increment(1);
            warn!(error = %e, customer_id, "Profile save failed");
            return;
        }

        debug!(
            customer_id,
            event_type = %event.event_type,
            rfm = score.combined,
            segment = %score.segment,
            lifecycle = %stage,
            "Profile updated"
        );
    }

    /// Consumer loop for one event shard.
    pub async fn run(self: Arc<Self>, shard: usize, rx: mpsc::Receiver<Event>, shutdown: ShutdownSignal) {
        run_consumer("events", shard, rx, shutdown, |event| {
            let processor = self.clone();
            async move {
                processor.process(&event).await;
            }
        })
        .await;
    }
}
