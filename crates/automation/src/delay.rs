//! Delayed re-enqueue for automation continuations.
//!
//! A delay action hands the rest of its execution to the [`DelayScheduler`],
//! which keeps continuations in a min-heap keyed by due time and pushes each
//! one back onto its execution shard once due. The executor never sleeps.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use cdp_core::automation::AutomationExecution;
use cdp_core::shard::ShardRouter;
use cdp_core::worker::{wait_for_shutdown, ShutdownSignal};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct Scheduled {
    due: Instant,
    seq: u64,
    execution: AutomationExecution,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

pub struct DelayScheduler {
    heap: Mutex<BinaryHeap<Reverse<Scheduled>>>,
    seq: AtomicU64,
    wakeup: Notify,
    router: ShardRouter,
    shards: Vec<mpsc::Sender<AutomationExecution>>,
}

impl DelayScheduler {
    /// `shards` are the execution queue senders continuations go back to.
    pub fn new(router: ShardRouter, shards: Vec<mpsc::Sender<AutomationExecution>>) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            wakeup: Notify::new(),
            router,
            shards,
        }
    }

    /// Queue `execution` to be re-enqueued after `delay`.
    pub fn schedule(&self, execution: AutomationExecution, delay: Duration) {
        let entry = Scheduled {
            due: Instant::now() + delay,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            execution,
        };
        debug!(
            automation_id = %entry.execution.automation_id,
            customer_id = %entry.execution.customer_id,
            delay_ms = delay.as_millis() as u64,
            "Continuation scheduled"
        );
        self.heap.lock().push(Reverse(entry));
        metrics::counter!("automation.delays_scheduled").increment(1);
        self.wakeup.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.heap.lock().len()
    }

    fn next_due(&self) -> Option<Instant> {
        self.heap.lock().peek().map(|Reverse(s)| s.due)
    }

    fn take_due(&self, now: Instant) -> Vec<AutomationExecution> {
        let mut heap = self.heap.lock();
        let mut due = Vec::new();
        while heap.peek().is_some_and(|Reverse(s)| s.due <= now) {
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(entry.execution);
            }
        }
        due
    }

    /// Timer loop. Runs until shutdown; pending continuations are discarded
    /// at that point.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        info!("Delay scheduler started");

        loop {
            let next_due = self.next_due();
            let sleep = async {
                match next_due {
                    Some(due) => tokio::time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = self.wakeup.notified() => continue,
                _ = sleep => {}
            }

            for execution in self.take_due(Instant::now()) {
                let shard = self.router.shard_for(&execution.customer_id);
                let automation_id = execution.automation_id.clone();
                if self.shards[shard].send(execution).await.is_err() {
                    warn!(automation_id = %automation_id, shard, "Execution queue closed, continuation lost");
                } else {
                    metrics::counter!("automation.delays_resumed").increment(1);
                }
            }
        }

        let discarded = self.pending();
        if discarded > 0 {
            warn!(discarded, "Delay scheduler stopped with pending continuations");
        }
        info!("Delay scheduler stopped");
    }
}
