//! Push-based change feed for order records.
//!
//! Every order write publishes the full post-write snapshot. Subscribers
//! filter by order id; dropping the subscription unsubscribes.

use std::sync::Arc;

use futures_util::Stream;
use kadai_schemas::Order;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Arc<Order>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a snapshot. Having no subscribers is not an error.
    pub fn publish(&self, order: Order) {
        let _ = self.tx.send(Arc::new(order));
    }

    /// Every order change, unfiltered (admin lists).
    pub fn subscribe_all(&self) -> broadcast::Receiver<Arc<Order>> {
        self.tx.subscribe()
    }

    /// Changes to one order (tracking views).
    pub fn subscribe(&self, order_id: &str) -> OrderSubscription {
        OrderSubscription {
            order_id: order_id.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

pub struct OrderSubscription {
    order_id: String,
    rx: broadcast::Receiver<Arc<Order>>,
}

impl OrderSubscription {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Next snapshot of the watched order. `None` once the feed is gone.
    ///
    /// A lagging receiver skips the snapshots it missed; the next write still
    /// carries the full record.
    pub async fn next(&mut self) -> Option<Arc<Order>> {
        loop {
            match self.rx.recv().await {
                Ok(o) if o.id == self.order_id => return Some(o),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(order_id = %self.order_id, skipped = n, "order subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<Order>> + Send + 'static {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|o| (o, sub))
        })
    }
}
