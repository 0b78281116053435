//! Unified customer profile: contact data, behavioral counters, derived RFM
//! scores and lifecycle state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Max entries kept in the favorite category/brand lists.
pub const MAX_FAVORITES: usize = 10;
/// Max tags per customer.
pub const MAX_TAGS: usize = 100;

/// Coarse activity classification of a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    #[default]
    New,
    Active,
    AtRisk,
    Churned,
    Reactivated,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::New => "new",
            LifecycleStage::Active => "active",
            LifecycleStage::AtRisk => "at_risk",
            LifecycleStage::Churned => "churned",
            LifecycleStage::Reactivated => "reactivated",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFM segment label assigned by the scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfmSegment {
    Champions,
    LoyalCustomers,
    PotentialLoyal,
    NewCustomers,
    Promising,
    NeedAttention,
    AboutToSleep,
    AtRisk,
    CantLose,
    Hibernating,
    Lost,
    #[default]
    Other,
}

impl RfmSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfmSegment::Champions => "champions",
            RfmSegment::LoyalCustomers => "loyal_customers",
            RfmSegment::PotentialLoyal => "potential_loyal",
            RfmSegment::NewCustomers => "new_customers",
            RfmSegment::Promising => "promising",
            RfmSegment::NeedAttention => "need_attention",
            RfmSegment::AboutToSleep => "about_to_sleep",
            RfmSegment::AtRisk => "at_risk",
            RfmSegment::CantLose => "cant_lose",
            RfmSegment::Hibernating => "hibernating",
            RfmSegment::Lost => "lost",
            RfmSegment::Other => "other",
        }
    }
}

impl fmt::Display for RfmSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One profile per (tenant_id, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,

    // Order metrics
    pub total_orders: u32,
    pub total_spent: f64,
    pub average_order_value: f64,
    pub last_order_date: Option<DateTime<Utc>>,
    pub days_since_order: i64,

    // RFM, recomputed from the counters above on every update
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    pub rfm_score: u16,
    pub rfm_segment: RfmSegment,

    // Behavior
    pub products_viewed: u32,
    pub search_count: u32,
    pub cart_abandons: u32,
    pub wishlist_items: u32,
    pub reviews_written: u32,
    pub returns_count: u32,

    // Preferences, most recent first
    pub favorite_categories: Vec<String>,
    pub favorite_brands: Vec<String>,
    /// email, sms, push, telegram
    #[serde(default)]
    pub preferred_channel: String,

    pub lifecycle_stage: LifecycleStage,
    pub customer_since: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    pub segments: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_attributes: HashMap<String, serde_json::Value>,

    pub updated_at: DateTime<Utc>,
}

impl CustomerProfile {
    /// Fresh profile with zeroed counters and the lowest RFM scores.
    pub fn new(tenant_id: impl Into<String>, id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            email: String::new(),
            phone: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            total_orders: 0,
            total_spent: 0.0,
            average_order_value: 0.0,
            last_order_date: None,
            days_since_order: 0,
            recency_score: 1,
            frequency_score: 1,
            monetary_score: 1,
            rfm_score: 111,
            rfm_segment: RfmSegment::Other,
            products_viewed: 0,
            search_count: 0,
            cart_abandons: 0,
            wishlist_items: 0,
            reviews_written: 0,
            returns_count: 0,
            favorite_categories: Vec::new(),
            favorite_brands: Vec::new(),
            preferred_channel: String::new(),
            lifecycle_stage: LifecycleStage::New,
            customer_since: now,
            last_activity: now,
            segments: Vec::new(),
            tags: Vec::new(),
            custom_attributes: HashMap::new(),
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.custom_attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn add_tag(&mut self, tag: &str) {
        push_recent(&mut self.tags, tag, MAX_TAGS);
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}

/// Insert `item` at the front of `list` unless already present, then cap the
/// list at `max_len`. Existing entries keep their position.
pub fn push_recent(list: &mut Vec<String>, item: &str, max_len: usize) {
    if item.is_empty() || list.iter().any(|v| v == item) {
        return;
    }
    list.insert(0, item.to_string());
    list.truncate(max_len);
}
