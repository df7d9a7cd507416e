//! Live delivery-location relay.
//!
//! Every position a [`PositionSource`] yields becomes one unconditional write
//! of the order's `delivery_location` through a [`LocationSink`]. No batching,
//! no throttling, no dedup. The loop runs until it is stopped, the source ends,
//! or the source reports a geolocation error.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use kadai_db::DocumentStore;
use kadai_schemas::GeoPoint;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    #[error("You denied the request for Geolocation. Please enable it in your settings.")]
    PermissionDenied,
    #[error("Location information is unavailable.")]
    PositionUnavailable,
    #[error("The request to get user location timed out.")]
    Timeout,
    #[error("An unknown error occurred while tracking.")]
    Unknown,
}

impl GeoError {
    /// Maps the numeric codes used by device geolocation APIs.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeoError::PermissionDenied,
            2 => GeoError::PositionUnavailable,
            3 => GeoError::Timeout,
            _ => GeoError::Unknown,
        }
    }
}

#[async_trait]
pub trait PositionSource: Send {
    /// `None` once the source has nothing more to give.
    async fn next_position(&mut self) -> Option<Result<GeoPoint, GeoError>>;
}

#[async_trait]
impl PositionSource for mpsc::Receiver<Result<GeoPoint, GeoError>> {
    async fn next_position(&mut self) -> Option<Result<GeoPoint, GeoError>> {
        self.recv().await
    }
}

#[async_trait]
pub trait LocationSink: Send + Sync {
    async fn write_location(&self, order_id: &str, at: GeoPoint) -> anyhow::Result<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> LocationSink for Arc<S> {
    async fn write_location(&self, order_id: &str, at: GeoPoint) -> anyhow::Result<()> {
        self.set_delivery_location(order_id, at)
            .await
            .map(|_| ())
            .with_context(|| format!("write delivery location for order {order_id}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Stopped,
    SourceEnded,
    Failed(GeoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub writes: u64,
    pub failed_writes: u64,
}

pub struct RelayHandle {
    order_id: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<RelayReport>,
}

impl RelayHandle {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Ask the loop to stop. A write already in flight completes; nothing on
    /// the order record is cleared.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> anyhow::Result<RelayReport> {
        self.task.await.context("relay task panicked")
    }
}

/// Starts relaying positions for `order_id`. Dropping the handle without
/// calling [`RelayHandle::stop`] also stops the loop.
pub fn spawn_relay<P, S>(order_id: impl Into<String>, mut source: P, sink: S) -> RelayHandle
where
    P: PositionSource + 'static,
    S: LocationSink + 'static,
{
    let order_id = order_id.into();
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task_order = order_id.clone();

    let task = tokio::spawn(async move {
        let order_id = task_order;
        let mut writes = 0u64;
        let mut failed_writes = 0u64;
        info!(order_id = %order_id, "location relay started");

        let outcome = loop {
            if *stop_rx.borrow() {
                break RelayOutcome::Stopped;
            }
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    // Sender gone counts as a stop request.
                    if changed.is_err() || *stop_rx.borrow() {
                        break RelayOutcome::Stopped;
                    }
                }
                next = source.next_position() => match next {
                    None => break RelayOutcome::SourceEnded,
                    Some(Err(e)) => {
                        warn!(order_id = %order_id, error = %e, "geolocation failed");
                        break RelayOutcome::Failed(e);
                    }
                    Some(Ok(at)) => match sink.write_location(&order_id, at).await {
                        Ok(()) => {
                            writes += 1;
                            debug!(order_id = %order_id, lat = at.lat, lng = at.lng, "location written");
                        }
                        Err(e) => {
                            failed_writes += 1;
                            warn!(order_id = %order_id, error = %format!("{e:#}"), "location write failed");
                        }
                    },
                },
            }
        };

        info!(order_id = %order_id, ?outcome, writes, failed_writes, "location relay finished");
        RelayReport {
            outcome,
            writes,
            failed_writes,
        }
    });

    RelayHandle {
        order_id,
        stop_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicU64,
        fail_first: bool,
    }

    #[async_trait]
    impl LocationSink for CountingSink {
        async fn write_location(&self, _order_id: &str, _at: GeoPoint) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("backend unavailable");
            }
            Ok(())
        }
    }

    fn pt(lat: f64) -> GeoPoint {
        GeoPoint { lat, lng: 77.6 }
    }

    #[test]
    fn codes_map_to_messages() {
        assert_eq!(
            GeoError::from_code(1).to_string(),
            "You denied the request for Geolocation. Please enable it in your settings."
        );
        assert_eq!(GeoError::from_code(3), GeoError::Timeout);
        assert_eq!(GeoError::from_code(42), GeoError::Unknown);
    }

    #[tokio::test]
    async fn every_position_is_one_write() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_relay("o-1", rx, CountingSink::default());
        for i in 0..3 {
            tx.send(Ok(pt(12.0 + i as f64))).await.unwrap();
        }
        drop(tx);
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, RelayOutcome::SourceEnded);
        assert_eq!(report.writes, 3);
    }

    #[tokio::test]
    async fn sink_error_does_not_end_the_loop() {
        let (tx, rx) = mpsc::channel(8);
        let sink = CountingSink {
            fail_first: true,
            ..Default::default()
        };
        let handle = spawn_relay("o-1", rx, sink);
        tx.send(Ok(pt(1.0))).await.unwrap();
        tx.send(Ok(pt(2.0))).await.unwrap();
        drop(tx);
        let report = handle.join().await.unwrap();
        assert_eq!(report.writes, 1);
        assert_eq!(report.failed_writes, 1);
    }

    #[tokio::test]
    async fn geolocation_error_aborts() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_relay("o-1", rx, CountingSink::default());
        tx.send(Err(GeoError::PermissionDenied)).await.unwrap();
        tx.send(Ok(pt(1.0))).await.unwrap();
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, RelayOutcome::Failed(GeoError::PermissionDenied));
        assert_eq!(report.writes, 0);
    }

    #[tokio::test]
    async fn stop_ends_an_idle_relay() {
        let (_tx, rx) = mpsc::channel::<Result<GeoPoint, GeoError>>(8);
        let handle = spawn_relay("o-1", rx, CountingSink::default());
        handle.stop();
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, RelayOutcome::Stopped);
    }
}
