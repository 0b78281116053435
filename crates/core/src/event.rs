//! Behavioral events tracked from storefronts, mobile apps and the API.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of customer behavior captured by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    ProductView,
    CategoryView,
    Search,
    AddToCart,
    RemoveFromCart,
    CartAbandoned,
    CheckoutStarted,
    Purchase,
    WishlistAdd,
    WishlistRemove,
    Review,
    CouponApplied,
    EmailOpened,
    EmailClicked,
    PushClicked,
    Login,
    Signup,
    Return,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::ProductView => "product_view",
            EventType::CategoryView => "category_view",
            EventType::Search => "search",
            EventType::AddToCart => "add_to_cart",
            EventType::RemoveFromCart => "remove_from_cart",
            EventType::CartAbandoned => "cart_abandoned",
            EventType::CheckoutStarted => "checkout_started",
            EventType::Purchase => "purchase",
            EventType::WishlistAdd => "wishlist_add",
            EventType::WishlistRemove => "wishlist_remove",
            EventType::Review => "review",
            EventType::CouponApplied => "coupon_applied",
            EventType::EmailOpened => "email_opened",
            EventType::EmailClicked => "email_clicked",
            EventType::PushClicked => "push_clicked",
            EventType::Login => "login",
            EventType::Signup => "signup",
            EventType::Return => "return",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single customer event. Ingestion assigns `id` and `timestamp`; after
/// that the event is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// web, mobile, api, scanner
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl Event {
    /// Build an un-ingested event. `id` stays empty until TrackEvent runs.
    pub fn new(
        tenant_id: impl Into<String>,
        customer_id: Option<String>,
        session_id: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            id: String::new(),
            tenant_id: tenant_id.into(),
            customer_id,
            session_id: session_id.into(),
            event_type,
            properties: HashMap::new(),
            timestamp: Utc::now(),
            source: String::new(),
            user_agent: None,
            ip: None,
            url: None,
            referrer: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Customer id, treating an empty string as anonymous.
    pub fn customer(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// Numeric property, also accepting numbers sent as strings ("149.90").
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
