//! Marketing automations, their actions, and the segments they can target.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse category an event maps to for automation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    CartAbandoned,
    Welcome,
    Purchase,
    Birthday,
    Inactive,
    PriceDropWishlist,
    BackInStock,
    ReviewRequest,
    Winback,
    LoyaltyPoints,
    SegmentEnter,
    SegmentExit,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::CartAbandoned => "cart_abandoned",
            TriggerType::Welcome => "welcome",
            TriggerType::Purchase => "purchase",
            TriggerType::Birthday => "birthday",
            TriggerType::Inactive => "inactive",
            TriggerType::PriceDropWishlist => "price_drop_wishlist",
            TriggerType::BackInStock => "back_in_stock",
            TriggerType::ReviewRequest => "review_request",
            TriggerType::Winback => "winback",
            TriggerType::LoyaltyPoints => "loyalty_points",
            TriggerType::SegmentEnter => "segment_enter",
            TriggerType::SegmentExit => "segment_exit",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single automation step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendEmail,
    SendSms,
    SendPush,
    SendTelegram,
    AddTag,
    RemoveTag,
    AddToSegment,
    Delay,
    Webhook,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SendEmail => "send_email",
            ActionType::SendSms => "send_sms",
            ActionType::SendPush => "send_push",
            ActionType::SendTelegram => "send_telegram",
            ActionType::AddTag => "add_tag",
            ActionType::RemoveTag => "remove_tag",
            ActionType::AddToSegment => "add_to_segment",
            ActionType::Delay => "delay",
            ActionType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an automation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    pub position: i32,
}

impl AutomationAction {
    pub fn new(action_type: ActionType, position: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            config: HashMap::new(),
            position,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// String config value; missing or non-string yields "".
    pub fn config_str(&self, key: &str) -> &str {
        self.config.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn config_u64(&self, key: &str) -> Option<u64> {
        let value = self.config.get(key)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
    }
}

/// Running counters for an automation. Opens, clicks and conversions are
/// reported by channel callbacks outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationStats {
    pub total_triggered: u64,
    pub total_sent: u64,
    pub total_opened: u64,
    pub total_clicked: u64,
    pub total_converted: u64,
    pub revenue: f64,
}

impl AutomationStats {
    /// Add every counter of `delta` onto `self`.
    pub fn accumulate(&mut self, delta: &AutomationStats) {
        self.total_triggered += delta.total_triggered;
        self.total_sent += delta.total_sent;
        self.total_opened += delta.total_opened;
        self.total_clicked += delta.total_clicked;
        self.total_converted += delta.total_converted;
        self.revenue += delta.revenue;
    }

    pub fn is_empty(&self) -> bool {
        *self == AutomationStats::default()
    }
}

/// An automated marketing flow fired by a trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trigger_type: TriggerType,
    pub actions: Vec<AutomationAction>,
    pub is_active: bool,
    #[serde(default)]
    pub stats: AutomationStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        trigger_type: TriggerType,
        actions: Vec<AutomationAction>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: String::new(),
            trigger_type,
            actions,
            is_active: true,
            stats: AutomationStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Actions in execution order: ascending position, stable for ties.
    pub fn ordered_actions(&self) -> Vec<&AutomationAction> {
        let mut actions: Vec<&AutomationAction> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.position);
        actions
    }
}

/// Work item handed from the trigger matcher to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub automation_id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub trigger_data: HashMap<String, serde_json::Value>,
    /// Set on a continuation re-enqueued after a delay action; actions at or
    /// before this position already ran.
    #[serde(default)]
    pub resume_after: Option<i32>,
}

impl AutomationExecution {
    pub fn new(
        automation_id: impl Into<String>,
        tenant_id: impl Into<String>,
        customer_id: impl Into<String>,
        trigger_data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            automation_id: automation_id.into(),
            tenant_id: tenant_id.into(),
            customer_id: customer_id.into(),
            trigger_data,
            resume_after: None,
        }
    }

    /// Continuation that resumes after the action at `position`.
    pub fn resume_after(&self, position: i32) -> Self {
        Self {
            resume_after: Some(position),
            ..self.clone()
        }
    }
}

/// How a segment's membership is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Static,
    Dynamic,
    Rfm,
}

/// Rule-based membership criteria for dynamic segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentCriteria {
    pub conditions: Vec<SegmentCondition>,
    /// "and" / "or"
    #[serde(default)]
    pub logic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCondition {
    pub field: String,
    /// eq, ne, gt, lt, gte, lte, contains, in
    pub operator: String,
    pub value: serde_json::Value,
}

/// Named set of customers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: SegmentKind,
    #[serde(default)]
    pub criteria: SegmentCriteria,
    pub member_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>, kind: SegmentKind) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: String::new(),
            kind,
            criteria: SegmentCriteria::default(),
            member_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_actions_ignore_storage_order() {
        let automation = Automation::new(
            "t1",
            "out of order",
            TriggerType::Purchase,
            vec![
                AutomationAction::new(ActionType::AddTag, 3),
                AutomationAction::new(ActionType::SendEmail, 1),
                AutomationAction::new(ActionType::Delay, 2),
            ],
        );
        let positions: Vec<i32> = automation
            .ordered_actions()
            .iter()
            .map(|a| a.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_config_accessors() {
        let action = AutomationAction::new(ActionType::Delay, 0)
            .with_config("duration", serde_json::json!(1500.0))
            .with_config("tag", serde_json::json!("vip"));
        assert_eq!(action.config_u64("duration"), Some(1500));
        assert_eq!(action.config_str("tag"), "vip");
        assert_eq!(action.config_str("missing"), "");
    }

    #[test]
    fn test_action_wire_format() {
        let raw = serde_json::json!({
            "id": "a1",
            "type": "send_telegram",
            "config": {"content": "hi"},
            "position": 4
        });
        let action: AutomationAction = serde_json::from_value(raw).unwrap();
        assert_eq!(action.action_type, ActionType::SendTelegram);
        assert_eq!(action.position, 4);
    }

    #[test]
    fn test_stats_default_when_absent() {
        let raw = serde_json::json!({
            "id": "a1",
            "tenant_id": "t1",
            "name": "legacy",
            "trigger_type": "welcome",
            "actions": [],
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let automation: Automation = serde_json::from_value(raw).unwrap();
        assert_eq!(automation.stats, AutomationStats::default());

        let partial: AutomationStats =
            serde_json::from_value(serde_json::json!({"total_sent": 3})).unwrap();
        assert_eq!(partial.total_sent, 3);
        assert_eq!(partial.total_triggered, 0);
    }

    #[test]
    fn test_continuation_keeps_trigger_data() {
        let mut data = HashMap::new();
        data.insert("cart_id".to_string(), serde_json::json!("cart-9"));
        let exec = AutomationExecution::new("a1", "t1", "c1", data);
        let next = exec.resume_after(2);
        assert_eq!(next.resume_after, Some(2));
        assert_eq!(next.trigger_data["cart_id"], "cart-9");
        assert!(exec.resume_after.is_none());
    }
}
