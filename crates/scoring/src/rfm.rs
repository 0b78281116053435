//! RFM scoring: recency, frequency and monetary buckets, combined score, and
//! the ordered segment rule table.

use cdp_core::profile::{CustomerProfile, RfmSegment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores derived from a profile's counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfmScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
    /// recency * 100 + frequency * 10 + monetary
    pub combined: u16,
    pub segment: RfmSegment,
    /// `None` when the customer never ordered.
    pub days_since_order: Option<i64>,
}

/// Inclusive bounds on each sub-score. 1..=5 means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfmCriteria {
    pub recency_min: u8,
    pub recency_max: u8,
    pub frequency_min: u8,
    pub frequency_max: u8,
    pub monetary_min: u8,
    pub monetary_max: u8,
}

impl RfmCriteria {
    const ANY: RfmCriteria = RfmCriteria {
        recency_min: 1,
        recency_max: 5,
        frequency_min: 1,
        frequency_max: 5,
        monetary_min: 1,
        monetary_max: 5,
    };

    const fn recency(self, min: u8, max: u8) -> Self {
        Self {
            recency_min: min,
            recency_max: max,
            ..self
        }
    }

    const fn frequency(self, min: u8, max: u8) -> Self {
        Self {
            frequency_min: min,
            frequency_max: max,
            ..self
        }
    }

    const fn monetary(self, min: u8, max: u8) -> Self {
        Self {
            monetary_min: min,
            monetary_max: max,
            ..self
        }
    }

    pub fn matches(&self, recency: u8, frequency: u8, monetary: u8) -> bool {
        (self.recency_min..=self.recency_max).contains(&recency)
            && (self.frequency_min..=self.frequency_max).contains(&frequency)
            && (self.monetary_min..=self.monetary_max).contains(&monetary)
    }
}

/// Segment rules in priority order; the first matching entry wins.
pub const SEGMENT_RULES: [(RfmSegment, RfmCriteria); 11] = [
    (
        RfmSegment::Champions,
        RfmCriteria::ANY.recency(4, 5).frequency(4, 5).monetary(4, 5),
    ),
    (
        RfmSegment::CantLose,
        RfmCriteria::ANY.recency(1, 2).frequency(4, 5).monetary(4, 5),
    ),
    (
        RfmSegment::LoyalCustomers,
        RfmCriteria::ANY.recency(3, 5).frequency(3, 5).monetary(3, 5),
    ),
    (
        RfmSegment::NewCustomers,
        RfmCriteria::ANY.recency(4, 5).frequency(1, 1).monetary(1, 2),
    ),
    (
        RfmSegment::Promising,
        RfmCriteria::ANY.recency(3, 5).frequency(1, 1).monetary(1, 1),
    ),
    (RfmSegment::PotentialLoyal, RfmCriteria::ANY.recency(3, 5)),
    (
        RfmSegment::NeedAttention,
        RfmCriteria::ANY.recency(2, 3).frequency(2, 5).monetary(2, 5),
    ),
    (
        RfmSegment::AtRisk,
        RfmCriteria::ANY.recency(1, 2).frequency(2, 5).monetary(2, 5),
    ),
    (
        RfmSegment::AboutToSleep,
        RfmCriteria::ANY.recency(2, 2).frequency(1, 2).monetary(1, 2),
    ),
    (
        RfmSegment::Lost,
        RfmCriteria::ANY.recency(1, 1).frequency(1, 1).monetary(1, 1),
    ),
    (
        RfmSegment::Hibernating,
        RfmCriteria::ANY.recency(1, 2).frequency(1, 2).monetary(1, 2),
    ),
];

/// Whole days from `earlier` to `now`, floored, never negative.
pub fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - earlier).num_days().max(0)
}

pub fn recency_score(days_since_order: Option<i64>) -> u8 {
    match days_since_order {
        None => 1,
        Some(d) if d <= 7 => 5,
        Some(d) if d <= 30 => 4,
        Some(d) if d <= 90 => 3,
        Some(d) if d <= 180 => 2,
        Some(_) => 1,
    }
}

pub fn frequency_score(total_orders: u32) -> u8 {
    match total_orders {
        20.. => 5,
        10..=19 => 4,
        5..=9 => 3,
        2..=4 => 2,
        _ => 1,
    }
}

pub fn monetary_score(total_spent: f64) -> u8 {
    if total_spent >= 50_000.0 {
        5
    } else if total_spent >= 20_000.0 {
        4
    } else if total_spent >= 5_000.0 {
        3
    } else if total_spent >= 1_000.0 {
        2
    } else {
        1
    }
}

/// First rule in [`SEGMENT_RULES`] whose bounds all hold, else `Other`.
pub fn classify_segment(recency: u8, frequency: u8, monetary: u8) -> RfmSegment {
    SEGMENT_RULES
        .iter()
        .find(|(_, criteria)| criteria.matches(recency, frequency, monetary))
        .map(|(segment, _)| *segment)
        .unwrap_or(RfmSegment::Other)
}

/// Stateless scorer over profile counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RfmScorer;

impl RfmScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, profile: &CustomerProfile, now: DateTime<Utc>) -> RfmScore {
        let days_since_order = profile.last_order_date.map(|d| days_between(d, now));
        let recency = recency_score(days_since_order);
        let frequency = frequency_score(profile.total_orders);
        let monetary = monetary_score(profile.total_spent);

        RfmScore {
            recency,
            frequency,
            monetary,
            combined: recency as u16 * 100 + frequency as u16 * 10 + monetary as u16,
            segment: classify_segment(recency, frequency, monetary),
            days_since_order,
        }
    }

    /// Recompute all RFM fields of `profile` from its counters.
    pub fn apply(&self, profile: &mut CustomerProfile, now: DateTime<Utc>) -> RfmScore {
        let score = self.score(profile, now);
        profile.recency_score = score.recency;
        profile.frequency_score = score.frequency;
        profile.monetary_score = score.monetary;
        profile.rfm_score = score.combined;
        profile.rfm_segment = score.segment;
        if let Some(days) = score.days_since_order {
            profile.days_since_order = days;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile_with(days_ago: Option<i64>, orders: u32, spent: f64) -> (CustomerProfile, DateTime<Utc>) {
        let now = Utc::now();
        let mut profile = CustomerProfile::new("t1", "c1");
        profile.last_order_date = days_ago.map(|d| now - Duration::days(d));
        profile.total_orders = orders;
        profile.total_spent = spent;
        (profile, now)
    }

    #[test]
    fn test_recency_buckets() {
        let scorer = RfmScorer::new();
        for (days, expected) in [(5, 5), (45, 3), (100, 2), (190, 1), (7, 5), (30, 4), (90, 3), (180, 2)] {
            let (profile, now) = profile_with(Some(days), 1, 10.0);
            assert_eq!(scorer.score(&profile, now).recency, expected, "days={}", days);
        }
        let (never, now) = profile_with(None, 0, 0.0);
        assert_eq!(scorer.score(&never, now).recency, 1);
    }

    #[test]
    fn test_future_order_counts_as_today() {
        let (profile, now) = profile_with(Some(-3), 1, 10.0);
        let score = RfmScorer::new().score(&profile, now);
        assert_eq!(score.days_since_order, Some(0));
        assert_eq!(score.recency, 5);
    }

    #[test]
    fn test_frequency_and_monetary_buckets() {
        assert_eq!(frequency_score(0), 1);
        assert_eq!(frequency_score(2), 2);
        assert_eq!(frequency_score(5), 3);
        assert_eq!(frequency_score(10), 4);
        assert_eq!(frequency_score(250), 5);

        assert_eq!(monetary_score(999.99), 1);
        assert_eq!(monetary_score(1_000.0), 2);
        assert_eq!(monetary_score(5_000.0), 3);
        assert_eq!(monetary_score(20_000.0), 4);
        assert_eq!(monetary_score(50_000.0), 5);
        assert_eq!(monetary_score(-10.0), 1);
    }

    #[test]
    fn test_sub_scores_always_in_range() {
        let scorer = RfmScorer::new();
        for days in [None, Some(0), Some(3), Some(60), Some(150), Some(10_000)] {
            for orders in [0, 1, 3, 7, 15, 1_000] {
                for spent in [0.0, 500.0, 3_000.0, 10_000.0, 30_000.0, 1e9] {
                    let (profile, now) = profile_with(days, orders, spent);
                    let s = scorer.score(&profile, now);
                    for v in [s.recency, s.frequency, s.monetary] {
                        assert!((1..=5).contains(&v));
                    }
                    assert_eq!(
                        s.combined,
                        s.recency as u16 * 100 + s.frequency as u16 * 10 + s.monetary as u16
                    );
                }
            }
        }
    }

    #[test]
    fn test_segment_priority_order() {
        assert_eq!(classify_segment(5, 5, 5), RfmSegment::Champions);
        assert_eq!(classify_segment(1, 5, 5), RfmSegment::CantLose);
        assert_eq!(classify_segment(2, 4, 4), RfmSegment::CantLose);
        assert_eq!(classify_segment(5, 3, 3), RfmSegment::LoyalCustomers);
        assert_eq!(classify_segment(5, 1, 1), RfmSegment::NewCustomers);
        assert_eq!(classify_segment(3, 1, 1), RfmSegment::Promising);
        assert_eq!(classify_segment(4, 2, 2), RfmSegment::PotentialLoyal);
        assert_eq!(classify_segment(2, 2, 2), RfmSegment::NeedAttention);
        assert_eq!(classify_segment(1, 3, 3), RfmSegment::AtRisk);
        assert_eq!(classify_segment(2, 1, 2), RfmSegment::AboutToSleep);
        assert_eq!(classify_segment(1, 1, 1), RfmSegment::Lost);
        assert_eq!(classify_segment(1, 2, 1), RfmSegment::Hibernating);
        assert_eq!(classify_segment(2, 1, 5), RfmSegment::Other);
    }

    #[test]
    fn test_segment_is_deterministic() {
        for r in 1..=5 {
            for f in 1..=5 {
                for m in 1..=5 {
                    let first = classify_segment(r, f, m);
                    for _ in 0..5 {
                        assert_eq!(classify_segment(r, f, m), first);
                    }
                }
            }
        }
    }

    #[test]
    fn test_apply_recomputes_from_counters() {
        let (mut profile, now) = profile_with(Some(3), 25, 60_000.0);
        profile.recency_score = 1;
        profile.rfm_segment = RfmSegment::Lost;

        let score = RfmScorer::new().apply(&mut profile, now);
        assert_eq!(score.combined, 555);
        assert_eq!(profile.rfm_score, 555);
        assert_eq!(profile.rfm_segment, RfmSegment::Champions);
        assert_eq!(profile.days_since_order, 3);
    }
}
