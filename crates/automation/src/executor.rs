//! Runs automation actions for one customer in position order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cdp_core::automation::{ActionType, AutomationAction, AutomationExecution, AutomationStats};
use cdp_core::error::{CdpError, CdpResult};
use cdp_core::profile::CustomerProfile;
use cdp_core::repository::{AutomationRepository, CustomerRepository, SegmentRepository};
use cdp_core::sender::{MessageSender, Senders};
use cdp_core::shard::WriterLocks;
use cdp_core::worker::{run_consumer, ShutdownSignal};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::delay::DelayScheduler;

/// Outcome of one pass over an execution's actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub automation_id: String,
    pub customer_id: String,
    /// Action types that ran successfully, in execution order.
    pub executed: Vec<ActionType>,
    /// Action types that failed and were skipped.
    pub failed: Vec<ActionType>,
    /// Messages handed to a channel sender.
    pub sent: u64,
    /// Position of the delay action the rest of the run was deferred at.
    pub deferred_at: Option<i32>,
    /// Automation or customer missing, or automation inactive.
    pub skipped: bool,
}

pub struct AutomationExecutor {
    automations: Arc<dyn AutomationRepository>,
    customers: Arc<dyn CustomerRepository>,
    segments: Arc<dyn SegmentRepository>,
    senders: Senders,
    locks: Arc<WriterLocks>,
    delays: Arc<DelayScheduler>,
}

impl AutomationExecutor {
    pub fn new(
        automations: Arc<dyn AutomationRepository>,
        customers: Arc<dyn CustomerRepository>,
        segments: Arc<dyn SegmentRepository>,
        senders: Senders,
        locks: Arc<WriterLocks>,
        delays: Arc<DelayScheduler>,
    ) -> Self {
        info!(senders = ?senders, "Automation executor initialized");
        Self {
            automations,
            customers,
            segments,
            senders,
            locks,
            delays,
        }
    }

    /// Execute the actions of `execution` in ascending position. A failing
    /// action is logged and skipped; a delay action defers the remainder to
    /// the delay scheduler and ends this pass.
    pub async fn execute(&self, execution: &AutomationExecution) -> ExecutionReport {
        let mut report = ExecutionReport {
            automation_id: execution.automation_id.clone(),
            customer_id: execution.customer_id.clone(),
            ..Default::default()
        };

        let automation = match self.automations.get_by_id(&execution.automation_id).await {
            Ok(a) if a.is_active => a,
            Ok(_) => {
                debug!(automation_id = %execution.automation_id, "Automation inactive, skipping");
                report.skipped = true;
                return report;
            }
            Err(e) => {
                debug!(error = %e, automation_id = %execution.automation_id, "Automation unavailable, skipping");
                report.skipped = true;
                return report;
            }
        };

        let mut customer = match self
            .customers
            .get_by_id(&execution.tenant_id, &execution.customer_id)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    error = %e,
                    automation_id = %execution.automation_id,
                    customer_id = %execution.customer_id,
                    "Customer unavailable, skipping automation"
                );
                report.skipped = true;
                return report;
            }
        };

        metrics::counter!("automation.executions").increment(1);

        for action in automation.ordered_actions() {
            if execution.resume_after.is_some_and(|after| action.position <= after) {
                continue;
            }

            if action.action_type == ActionType::Delay {
                let delay_ms = action.config_u64("duration").unwrap_or(0);
                if delay_ms > 0 {
                    self.delays.schedule(
                        execution.resume_after(action.position),
                        Duration::from_millis(delay_ms),
                    );
                    report.deferred_at = Some(action.position);
                    break;
                }
                report.executed.push(ActionType::Delay);
                continue;
            }

            match self
                .execute_action(action, &mut customer, &execution.trigger_data)
                .await
            {
                Ok(delivered) => {
                    metrics::counter!("automation.actions_executed").increment(1);
                    report.executed.push(action.action_type);
                    if delivered {
                        report.sent += 1;
                    }
                }
                Err(e) => {
                    metrics::counter!("automation.actions_failed").increment(1);
                    warn!(
                        error = %e,
                        automation_id = %automation.id,
                        customer_id = %customer.id,
                        action = %action.action_type,
                        position = action.position,
                        "Automation action failed, continuing"
                    );
                    report.failed.push(action.action_type);
                }
            }
        }

        let delta = AutomationStats {
            total_triggered: u64::from(execution.resume_after.is_none()),
            total_sent: report.sent,
            ..Default::default()
        };
        if !delta.is_empty() {
            if let Err(e) = self.automations.record_stats(&automation.id, &delta).await {
                warn!(error = %e, automation_id = %automation.id, "Failed to record automation stats");
            }
        }

        debug!(
            automation_id = %automation.id,
            customer_id = %customer.id,
            executed = report.executed.len(),
            failed = report.failed.len(),
            deferred = report.deferred_at.is_some(),
            "Automation pass finished"
        );
        report
    }

    /// Consumer loop for one execution shard.
    pub async fn run(
        self: Arc<Self>,
        shard: usize,
        rx: mpsc::Receiver<AutomationExecution>,
        shutdown: ShutdownSignal,
    ) {
        run_consumer("executions", shard, rx, shutdown, |execution| {
            let executor = self.clone();
            async move {
                executor.execute(&execution).await;
            }
        })
        .await;
    }

    async fn execute_action(
        &self,
        action: &AutomationAction,
        customer: &mut CustomerProfile,
        data: &HashMap<String, serde_json::Value>,
    ) -> CdpResult<bool> {
        match action.action_type {
            ActionType::SendEmail => {
                let Some(sender) = configured(&self.senders.email, action.action_type) else {
                    return Ok(false);
                };
                if customer.email.is_empty() {
                    return Err(CdpError::action(action.action_type, "customer has no email"));
                }
                deliver(
                    sender,
                    action.action_type,
                    &customer.email,
                    action.config_str("subject"),
                    action.config_str("content"),
                    data,
                )
                .await
            }
            ActionType::SendSms => {
                let Some(sender) = configured(&self.senders.sms, action.action_type) else {
                    return Ok(false);
                };
                if customer.phone.is_empty() {
                    return Err(CdpError::action(action.action_type, "customer has no phone"));
                }
                deliver(
                    sender,
                    action.action_type,
                    &customer.phone,
                    "",
                    action.config_str("content"),
                    data,
                )
                .await
            }
            ActionType::SendPush => {
                let Some(sender) = configured(&self.senders.push, action.action_type) else {
                    return Ok(false);
                };
                deliver(
                    sender,
                    action.action_type,
                    &customer.id,
                    action.config_str("title"),
                    action.config_str("content"),
                    data,
                )
                .await
            }
            ActionType::SendTelegram => {
                let Some(sender) = configured(&self.senders.telegram, action.action_type) else {
                    return Ok(false);
                };
                let Some(chat_id) = customer.attribute_str("telegram_id").filter(|id| !id.is_empty())
                else {
                    return Ok(false);
                };
                deliver(
                    sender,
                    action.action_type,
                    chat_id,
                    "",
                    action.config_str("content"),
                    data,
                )
                .await
            }
            ActionType::Webhook => {
                let Some(sender) = configured(&self.senders.webhook, action.action_type) else {
                    return Ok(false);
                };
                let url = action.config_str("url");
                if url.is_empty() {
                    return Err(CdpError::action(action.action_type, "missing url"));
                }
                let body = serde_json::to_string(data)?;
                deliver(
                    sender,
                    action.action_type,
                    url,
                    action.config_str("event"),
                    &body,
                    data,
                )
                .await
            }
            ActionType::AddTag | ActionType::RemoveTag => {
                let tag = action.config_str("tag");
                if tag.is_empty() {
                    return Err(CdpError::action(action.action_type, "missing tag"));
                }
                self.mutate_tags(customer, action.action_type, tag).await?;
                Ok(false)
            }
            ActionType::AddToSegment => {
                let segment_id = action.config_str("segment_id");
                if segment_id.is_empty() {
                    return Err(CdpError::action(action.action_type, "missing segment_id"));
                }
                self.segments.add_member(segment_id, &customer.id).await?;
                Ok(false)
            }
            // Handled by `execute`; reaching here means a zero-length delay.
            ActionType::Delay => Ok(false),
        }
    }

    /// Reload-mutate-save under the customer's writer lock so a concurrent
    /// event update is never overwritten with stale counters.
    async fn mutate_tags(
        &self,
        customer: &mut CustomerProfile,
        action_type: ActionType,
        tag: &str,
    ) -> CdpResult<()> {
        let _guard = self.locks.lock(&customer.id).await;
        let mut fresh = self
            .customers
            .get_by_id(&customer.tenant_id, &customer.id)
            .await?;
        match action_type {
            ActionType::AddTag => fresh.add_tag(tag),
            _ => fresh.remove_tag(tag),
        }
        fresh.updated_at = Utc::now();
        self.customers.save(&fresh).await?;
        *customer = fresh;
        Ok(())
    }
}

/// The channel's sender, or `None` (logged) when the channel is not
/// configured and the action should be a no-op.
fn configured(
    sender: &Option<Arc<dyn MessageSender>>,
    action_type: ActionType,
) -> Option<&Arc<dyn MessageSender>> {
    if sender.is_none() {
        debug!(action = %action_type, "No sender configured, action is a no-op");
    }
    sender.as_ref()
}

async fn deliver(
    sender: &Arc<dyn MessageSender>,
    action_type: ActionType,
    recipient: &str,
    subject: &str,
    content: &str,
    data: &HashMap<String, serde_json::Value>,
) -> CdpResult<bool> {
    sender
        .send(recipient, subject, content, data)
        .await
        .map_err(|e| CdpError::action(action_type, e.to_string()))?;
    Ok(true)
}
