//! Admin review queues, transition application and the customer order views.

use std::sync::{Arc, Mutex};

use futures_util::{Stream, StreamExt};
use kadai_audit::{AuditWriter, TransitionEntry};
use kadai_db::{DocumentStore, OrderFilter, StoreError};
use kadai_lifecycle::{
    allowed_actions, next_status, tracking_is_live, AdminAction, Audience, OrderQueue,
    OrderStatus, TransitionError,
};
use kadai_schemas::{GeoPoint, Order};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum OrderActionError {
    #[error(transparent)]
    Illegal(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the customer tracking page renders.
///
/// `courier` is only filled in while the order is out for delivery; a stored
/// `delivery_location` on any other status stays hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: String,
    pub status: OrderStatus,
    pub status_label: String,
    pub live: bool,
    pub destination: Option<GeoPoint>,
    pub courier: Option<GeoPoint>,
}

impl TrackingView {
    pub fn from_order(order: &Order) -> Self {
        let live = tracking_is_live(order.status);
        Self {
            order_id: order.id.clone(),
            status: order.status,
            status_label: order.status.label(Audience::Customer).to_string(),
            live,
            destination: order.location,
            courier: if live { order.delivery_location } else { None },
        }
    }

    /// Both markers are known, so a map can be drawn.
    pub fn map_ready(&self) -> bool {
        self.live && self.courier.is_some()
    }
}

pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    audit: Option<Arc<Mutex<AuditWriter>>>,
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>, audit: Option<Arc<Mutex<AuditWriter>>>) -> Self {
        Self { store, audit }
    }

    // -----------------------------------------------------------------------
    // Admin
    // -----------------------------------------------------------------------

    /// Newest first.
    pub async fn list_queue(&self, queue: OrderQueue) -> Result<Vec<Order>, StoreError> {
        self.store.list_orders(&OrderFilter::queue(queue)).await
    }

    /// The order together with the actions its current status offers.
    pub async fn actions_for(&self, order_id: &str) -> Result<(Order, Vec<AdminAction>), StoreError> {
        let order = self.store.get_order(order_id).await?;
        let actions = allowed_actions(order.status);
        Ok((order, actions))
    }

    /// Applies one admin action.
    ///
    /// The status write only lands if the stored status is still the one the
    /// next status was computed from. The audit record is appended after the
    /// write; an audit failure is logged and does not undo the transition.
    pub async fn apply_action(
        &self,
        order_id: &str,
        action: AdminAction,
        actor: &str,
    ) -> Result<Order, OrderActionError> {
        let current = self.store.get_order(order_id).await?;
        let from = current.status;
        let to = next_status(from, action)?;
        let updated = self.store.update_order_status(order_id, from, to).await?;

        info!(
            order_id = %order_id,
            action = %action,
            from = %from,
            to = %to,
            actor = %actor,
            "order transition applied"
        );

        if let Some(audit) = self.audit.clone() {
            let entry = TransitionEntry {
                order_id: order_id.to_string(),
                actor: actor.to_string(),
                action,
                from,
                to,
            };
            // File lock and write block; keep them off the async workers.
            let appended = tokio::task::spawn_blocking(move || {
                let mut writer = match audit.lock() {
                    Ok(w) => w,
                    Err(poisoned) => poisoned.into_inner(),
                };
                writer.append(entry)
            })
            .await;
            match appended {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(order_id = %order_id, error = %format!("{e:#}"), "audit append failed");
                }
                Err(e) => error!(order_id = %order_id, error = %e, "audit append task failed"),
            }
        }
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Customer
    // -----------------------------------------------------------------------

    /// Newest first.
    pub async fn customer_orders(&self, owner: &str) -> Result<Vec<Order>, StoreError> {
        self.store.list_orders(&OrderFilter::owner(owner)).await
    }

    /// Another customer's order reads as not found.
    pub async fn customer_order(&self, owner: &str, order_id: &str) -> Result<Order, StoreError> {
        let order = self.store.get_order(order_id).await?;
        if order.user_id != owner {
            return Err(StoreError::order_not_found(order_id));
        }
        Ok(order)
    }

    pub async fn tracking(&self, owner: &str, order_id: &str) -> Result<TrackingView, StoreError> {
        self.customer_order(owner, order_id)
            .await
            .map(|o| TrackingView::from_order(&o))
    }

    /// Current view followed by a fresh view on every change to the record.
    /// The stream ends when the change feed closes; dropping it unsubscribes.
    pub async fn watch_tracking(
        &self,
        owner: &str,
        order_id: &str,
    ) -> Result<impl Stream<Item = TrackingView> + Send + 'static, StoreError> {
        // Subscribe before the read so no change slips between the two.
        let sub = self.store.subscribe(order_id);
        let initial = self.tracking(owner, order_id).await?;
        let updates = sub
            .into_stream()
            .map(|order| TrackingView::from_order(&order));
        Ok(futures_util::stream::iter([initial]).chain(updates))
    }
}
