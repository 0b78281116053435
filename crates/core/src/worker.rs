//! Single-consumer drain loop shared by the event and execution shards.

use std::future::Future;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Sender half of the process-wide shutdown signal.
pub type ShutdownSender = watch::Sender<bool>;
/// Receiver half of the process-wide shutdown signal.
pub type ShutdownSignal = watch::Receiver<bool>;

pub fn shutdown_channel() -> (ShutdownSender, ShutdownSignal) {
    watch::channel(false)
}

/// Resolves once shutdown was requested or the sender was dropped.
pub async fn wait_for_shutdown(signal: &mut ShutdownSignal) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}

/// Drain `rx` one item at a time until shutdown. On shutdown the receiver is
/// closed and already-buffered items are still handled before returning.
pub async fn run_consumer<T, F, Fut>(
    queue: &'static str,
    shard: usize,
    mut rx: mpsc::Receiver<T>,
    mut shutdown: ShutdownSignal,
    mut handle: F,
) where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ()>,
{
    info!(queue, shard, "Consumer started");

    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            item = rx.recv() => match item {
                Some(item) => handle(item).await,
                None => {
                    info!(queue, shard, "Queue closed, consumer exiting");
                    return;
                }
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(item) = rx.recv().await {
        handle(item).await;
        drained += 1;
    }
    debug!(queue, shard, drained, "Drained buffered items");
    info!(queue, shard, "Consumer stopped");
}
