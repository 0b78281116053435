//! Lifecycle stage classification from activity and order recency.

use cdp_core::profile::{CustomerProfile, LifecycleStage};
use chrono::{DateTime, Utc};

use crate::rfm::days_between;

pub const CHURNED_AFTER_DAYS: i64 = 180;
pub const AT_RISK_AFTER_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleClassifier;

impl LifecycleClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, profile: &CustomerProfile, now: DateTime<Utc>) -> LifecycleStage {
        if profile.total_orders == 0 {
            return LifecycleStage::New;
        }

        let idle_days = days_between(profile.last_activity, now);
        if idle_days > CHURNED_AFTER_DAYS {
            return LifecycleStage::Churned;
        }
        if idle_days > AT_RISK_AFTER_DAYS {
            return LifecycleStage::AtRisk;
        }

        // Active again after a long gap since the last order.
        let days_since_order = profile.last_order_date.map(|d| days_between(d, now));
        match days_since_order {
            Some(d) if d > AT_RISK_AFTER_DAYS && d <= CHURNED_AFTER_DAYS => {
                LifecycleStage::Reactivated
            }
            _ => LifecycleStage::Active,
        }
    }

    pub fn apply(&self, profile: &mut CustomerProfile, now: DateTime<Utc>) -> LifecycleStage {
        let stage = self.classify(profile, now);
        profile.lifecycle_stage = stage;
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(orders: u32, idle_days: i64, order_days: Option<i64>) -> (CustomerProfile, DateTime<Utc>) {
        let now = Utc::now();
        let mut p = CustomerProfile::new("t1", "c1");
        p.total_orders = orders;
        p.last_activity = now - Duration::days(idle_days);
        p.last_order_date = order_days.map(|d| now - Duration::days(d));
        (p, now)
    }

    #[test]
    fn test_no_orders_is_new_even_when_idle() {
        let (p, now) = profile(0, 400, None);
        assert_eq!(LifecycleClassifier::new().classify(&p, now), LifecycleStage::New);
    }

    #[test]
    fn test_idle_thresholds() {
        let classifier = LifecycleClassifier::new();
        let (p, now) = profile(3, 181, Some(200));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::Churned);
        let (p, now) = profile(3, 180, Some(200));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::AtRisk);
        let (p, now) = profile(3, 91, Some(91));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::AtRisk);
    }

    #[test]
    fn test_reactivated_window() {
        let classifier = LifecycleClassifier::new();
        let (p, now) = profile(2, 0, Some(120));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::Reactivated);
        let (p, now) = profile(2, 0, Some(180));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::Reactivated);
        let (p, now) = profile(2, 0, Some(90));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::Active);
        let (p, now) = profile(2, 0, Some(181));
        assert_eq!(classifier.classify(&p, now), LifecycleStage::Active);
    }

    #[test]
    fn test_apply_sets_stage() {
        let (mut p, now) = profile(1, 0, Some(1));
        p.lifecycle_stage = LifecycleStage::Churned;
        LifecycleClassifier::new().apply(&mut p, now);
        assert_eq!(p.lifecycle_stage, LifecycleStage::Active);
    }
}
