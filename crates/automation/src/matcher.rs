//! Maps tracked events to automation triggers and builds execution items.

use std::sync::Arc;

use cdp_core::automation::{AutomationExecution, TriggerType};
use cdp_core::event::{Event, EventType};
use cdp_core::repository::AutomationRepository;
use tracing::{debug, warn};

/// Trigger fired by an event type, if any.
pub fn trigger_for(event_type: EventType) -> Option<TriggerType> {
    match event_type {
        EventType::CartAbandoned => Some(TriggerType::CartAbandoned),
        EventType::Signup => Some(TriggerType::Welcome),
        EventType::Purchase => Some(TriggerType::Purchase),
        _ => None,
    }
}

pub struct TriggerMatcher {
    automations: Arc<dyn AutomationRepository>,
}

impl TriggerMatcher {
    pub fn new(automations: Arc<dyn AutomationRepository>) -> Self {
        Self { automations }
    }

    /// One execution per active automation registered for the event's
    /// trigger. Anonymous events and lookup failures yield nothing.
    pub async fn match_event(&self, event: &Event) -> Vec<AutomationExecution> {
        let Some(trigger) = trigger_for(event.event_type) else {
            return Vec::new();
        };

        let Some(customer_id) = event.customer() else {
            debug!(
                event_id = %event.id,
                trigger = %trigger,
                "Anonymous event, no automation target"
            );
            return Vec::new();
        };

        let automations = match self
            .automations
            .get_by_trigger(&event.tenant_id, trigger)
            .await
        {
            Ok(list) => list,
            Err(e) => {
                metrics::counter!("automation.lookup_errors").increment(1);
                warn!(
                    error = %e,
                    tenant_id = %event.tenant_id,
                    trigger = %trigger,
                    "Automation lookup failed"
                );
                return Vec::new();
            }
        };

        let executions: Vec<AutomationExecution> = automations
            .iter()
            .filter(|a| a.is_active)
            .map(|a| {
                AutomationExecution::new(
                    a.id.clone(),
                    event.tenant_id.clone(),
                    customer_id,
                    event.properties.clone(),
                )
            })
            .collect();

        if !executions.is_empty() {
            metrics::counter!("automation.matched").increment(executions.len() as u64);
            debug!(
                event_id = %event.id,
                trigger = %trigger,
                count = executions.len(),
                "Automations matched"
            );
        }

        executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdp_core::automation::{ActionType, Automation, AutomationAction, AutomationStats};
    use cdp_core::error::{CdpError, CdpResult};

    struct FixedAutomations(Vec<Automation>);

    #[async_trait]
    impl AutomationRepository for FixedAutomations {
        async fn save(&self, _automation: &Automation) -> CdpResult<()> {
            Ok(())
        }
        async fn get_by_id(&self, id: &str) -> CdpResult<Automation> {
            Err(CdpError::not_found("automation", id))
        }
        async fn list(&self, _tenant_id: &str) -> CdpResult<Vec<Automation>> {
            Ok(self.0.clone())
        }
        async fn delete(&self, _id: &str) -> CdpResult<()> {
            Ok(())
        }
        async fn get_by_trigger(
            &self,
            tenant_id: &str,
            trigger_type: TriggerType,
        ) -> CdpResult<Vec<Automation>> {
            Ok(self
                .0
                .iter()
                .filter(|a| a.tenant_id == tenant_id && a.trigger_type == trigger_type)
                .cloned()
                .collect())
        }
        async fn record_stats(&self, _id: &str, _delta: &AutomationStats) -> CdpResult<()> {
            Ok(())
        }
    }

    fn automation(id: &str, trigger: TriggerType, active: bool) -> Automation {
        let mut a = Automation::new(
            "t1",
            id,
            trigger,
            vec![AutomationAction::new(ActionType::SendEmail, 0)],
        );
        a.id = id.to_string();
        a.is_active = active;
        a
    }

    #[test]
    fn test_trigger_mapping() {
        assert_eq!(trigger_for(EventType::CartAbandoned), Some(TriggerType::CartAbandoned));
        assert_eq!(trigger_for(EventType::Signup), Some(TriggerType::Welcome));
        assert_eq!(trigger_for(EventType::Purchase), Some(TriggerType::Purchase));
        assert_eq!(trigger_for(EventType::AddToCart), None);
        assert_eq!(trigger_for(EventType::ProductView), None);
    }

    #[tokio::test]
    async fn test_only_active_automations_match() {
        let matcher = TriggerMatcher::new(Arc::new(FixedAutomations(vec![
            automation("a-active", TriggerType::Purchase, true),
            automation("a-paused", TriggerType::Purchase, false),
            automation("a-welcome", TriggerType::Welcome, true),
        ])));

        let event = Event::new("t1", Some("c1".into()), "s1", EventType::Purchase)
            .with_property("amount", serde_json::json!(42));
        let executions = matcher.match_event(&event).await;

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].automation_id, "a-active");
        assert_eq!(executions[0].customer_id, "c1");
        assert_eq!(executions[0].trigger_data["amount"], 42);
    }

    #[tokio::test]
    async fn test_anonymous_and_untriggered_events_match_nothing() {
        let matcher = TriggerMatcher::new(Arc::new(FixedAutomations(vec![automation(
            "a1",
            TriggerType::Welcome,
            true,
        )])));

        let anonymous = Event::new("t1", None, "s1", EventType::Signup);
        assert!(matcher.match_event(&anonymous).await.is_empty());

        let view = Event::new("t1", Some("c1".into()), "s1", EventType::PageView);
        assert!(matcher.match_event(&view).await.is_empty());
    }
}
