//! Periodic cart-abandonment scan for one tenant.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cdp_core::event::{Event, EventType};
use cdp_core::repository::EventRepository;
use cdp_core::worker::{wait_for_shutdown, ShutdownSignal};
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ingest::EventIngestor;

/// Source tag on events synthesized by the scanner.
pub const SCANNER_SOURCE: &str = "scanner";

pub struct CartAbandonmentScanner {
    tenant_id: String,
    events: Arc<dyn EventRepository>,
    ingestor: Arc<EventIngestor>,
    interval: Duration,
    abandon_after: Duration,
}

impl CartAbandonmentScanner {
    pub fn new(
        tenant_id: impl Into<String>,
        events: Arc<dyn EventRepository>,
        ingestor: Arc<EventIngestor>,
        interval: Duration,
        abandon_after: Duration,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            events,
            ingestor,
            interval: interval.max(Duration::from_secs(1)),
            abandon_after,
        }
    }

    /// Emit one cart_abandoned event per idle session. Returns the number of
    /// events tracked.
    pub async fn scan_once(&self, now: DateTime<Utc>) -> usize {
        let older_than = match chrono::Duration::from_std(self.abandon_after) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, tenant_id = %self.tenant_id, "Abandon threshold out of range");
                return 0;
            }
        };

        let carts = match self
            .events
            .get_abandoned_carts(&self.tenant_id, older_than, now)
            .await
        {
            Ok(carts) => carts,
            Err(e) => {
                metrics::counter!("scanner.query_errors").increment(1);
                warn!(error = %e, tenant_id = %self.tenant_id, "Abandoned cart query failed");
                return 0;
            }
        };

        let mut sessions = HashSet::new();
        let mut emitted = 0;
        for cart in carts {
            if !sessions.insert(cart.session_id.clone()) {
                continue;
            }

            let mut abandoned = Event::new(
                cart.tenant_id,
                cart.customer_id,
                cart.session_id,
                EventType::CartAbandoned,
            )
            .with_source(SCANNER_SOURCE);
            abandoned.properties = cart.properties;

            match self.ingestor.track(abandoned).await {
                Ok(_) => emitted += 1,
                Err(e) => {
                    warn!(error = %e, tenant_id = %self.tenant_id, "Failed to track abandoned cart");
                }
            }
        }

        if emitted > 0 {
            metrics::counter!("scanner.carts_abandoned").increment(emitted as u64);
            info!(tenant_id = %self.tenant_id, emitted, "Abandoned carts detected");
        } else {
            debug!(tenant_id = %self.tenant_id, "No abandoned carts");
        }
        emitted
    }

    /// Scan every `interval` until shutdown. Ticks missed while a scan runs
    /// long are skipped.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            tenant_id = %self.tenant_id,
            interval_secs = self.interval.as_secs(),
            abandon_after_secs = self.abandon_after.as_secs(),
            "Cart abandonment scanner started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {
                    self.scan_once(Utc::now()).await;
                }
            }
        }

        info!(tenant_id = %self.tenant_id, "Cart abandonment scanner stopped");
    }
}
