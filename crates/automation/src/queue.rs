//! Bounded, sharded hand-off from the event processor to the executor.

use std::sync::Arc;

use cdp_core::automation::AutomationExecution;
use cdp_core::config::OverflowPolicy;
use cdp_core::error::{CdpError, CdpResult};
use cdp_core::shard::ShardRouter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::executor::AutomationExecutor;

pub type ExecutionSenders = Vec<mpsc::Sender<AutomationExecution>>;
pub type ExecutionReceivers = Vec<mpsc::Receiver<AutomationExecution>>;

/// One bounded channel per shard, each holding `capacity` items.
pub fn execution_channels(shards: usize, capacity: usize) -> (ExecutionSenders, ExecutionReceivers) {
    (0..shards.max(1))
        .map(|_| mpsc::channel(capacity.max(1)))
        .unzip()
}

pub struct ExecutionQueue {
    senders: ExecutionSenders,
    router: ShardRouter,
    policy: OverflowPolicy,
    executor: Arc<AutomationExecutor>,
}

impl ExecutionQueue {
    pub fn new(
        senders: ExecutionSenders,
        policy: OverflowPolicy,
        executor: Arc<AutomationExecutor>,
    ) -> Self {
        let router = ShardRouter::new(senders.len());
        Self {
            senders,
            router,
            policy,
            executor,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Enqueue without blocking. A full shard either runs the execution on the
    /// caller's task or drops it, depending on the overflow policy. A closed
    /// shard (shutdown in progress) always runs inline.
    pub async fn submit(&self, execution: AutomationExecution) -> CdpResult<()> {
        let shard = self.router.shard_for(&execution.customer_id);
        match self.senders[shard].try_send(execution) {
            Ok(()) => {
                metrics::counter!("automation.enqueued").increment(1);
                Ok(())
            }
            Err(TrySendError::Full(execution)) => match self.policy {
                OverflowPolicy::Inline => {
                    metrics::counter!("automation.inline_fallback").increment(1);
                    debug!(
                        automation_id = %execution.automation_id,
                        shard,
                        "Execution queue full, running inline"
                    );
                    self.executor.execute(&execution).await;
                    Ok(())
                }
                OverflowPolicy::Drop => {
                    metrics::counter!("automation.dropped").increment(1);
                    warn!(
                        automation_id = %execution.automation_id,
                        customer_id = %execution.customer_id,
                        shard,
                        "Execution queue full, dropping execution"
                    );
                    Err(CdpError::QueueFullDrop { queue: "executions" })
                }
            },
            Err(TrySendError::Closed(execution)) => {
                metrics::counter!("automation.inline_fallback").increment(1);
                debug!(
                    automation_id = %execution.automation_id,
                    shard,
                    "Execution queue closed, running inline"
                );
                self.executor.execute(&execution).await;
                Ok(())
            }
        }
    }
}
