//! Order lifecycle state machine.
//!
//! # Design
//!
//! Every status change is an [`AdminAction`], and every action is exactly one
//! edge of [`TRANSITIONS`]. There is no way to name a target status directly:
//! callers pick an action, and [`next_status`] either returns the edge's
//! target or a [`TransitionError`].
//!
//! # State diagram
//!
//! ```text
//!   (payment-proof flow)                       (direct flow)
//!           │                                        │
//!           ▼                                        ▼
//!   AwaitingPaymentVerification ──ApprovePayment──► Pending ──Approve──► Approved
//!           │                                        │                     │
//!     RejectPayment                               Reject                Dispatch
//!           ▼                                        ▼                     ▼
//!   PaymentRejected (term.)                  Rejected (term.)       OutForDelivery
//!                                                                          │
//!                                                                    MarkDelivered
//!                                                                          ▼
//!                                                                  Delivered (term.)
//! ```

use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

// ---------------------------------------------------------------------------
// AdminAction
// ---------------------------------------------------------------------------

/// An admin button. Each variant corresponds to exactly one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    /// Payment proof checked and accepted.
    ApprovePayment,
    /// Payment proof checked and refused.
    RejectPayment,
    /// Accept the order for fulfillment.
    Approve,
    /// Decline the order.
    Reject,
    /// Hand the order to delivery.
    Dispatch,
    /// Delivery confirmed.
    MarkDelivered,
}

/// The authoritative transition table: `(action, from, to)`.
pub const TRANSITIONS: [(AdminAction, OrderStatus, OrderStatus); 6] = [
    (
        AdminAction::ApprovePayment,
        OrderStatus::AwaitingPaymentVerification,
        OrderStatus::Pending,
    ),
    (
        AdminAction::RejectPayment,
        OrderStatus::AwaitingPaymentVerification,
        OrderStatus::PaymentRejected,
    ),
    (AdminAction::Approve, OrderStatus::Pending, OrderStatus::Approved),
    (AdminAction::Reject, OrderStatus::Pending, OrderStatus::Rejected),
    (
        AdminAction::Dispatch,
        OrderStatus::Approved,
        OrderStatus::OutForDelivery,
    ),
    (
        AdminAction::MarkDelivered,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ),
];

impl AdminAction {
    pub const ALL: [AdminAction; 6] = [
        AdminAction::ApprovePayment,
        AdminAction::RejectPayment,
        AdminAction::Approve,
        AdminAction::Reject,
        AdminAction::Dispatch,
        AdminAction::MarkDelivered,
    ];

    fn edge(&self) -> (OrderStatus, OrderStatus) {
        TRANSITIONS
            .iter()
            .find(|(a, _, _)| a == self)
            .map(|(_, from, to)| (*from, *to))
            // Every variant has a row; the table test below pins this.
            .unwrap_or((OrderStatus::Delivered, OrderStatus::Delivered))
    }

    /// The only status this action may be applied from.
    pub fn from_status(&self) -> OrderStatus {
        self.edge().0
    }

    /// The status this action produces.
    pub fn to_status(&self) -> OrderStatus {
        self.edge().1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::ApprovePayment => "approve_payment",
            AdminAction::RejectPayment => "reject_payment",
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::Dispatch => "dispatch",
            AdminAction::MarkDelivered => "mark_delivered",
        }
    }
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown admin action: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Returned when an action is not an outgoing edge of the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    /// The status the order was in.
    pub from: OrderStatus,
    /// The action that was refused.
    pub action: AdminAction,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal order transition: {} + {} (allowed: {})",
            self.from,
            self.action,
            allowed_actions(self.from)
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Table lookups
// ---------------------------------------------------------------------------

/// Actions offered for an order in `status`, in table order.
/// Terminal states return an empty list.
pub fn allowed_actions(status: OrderStatus) -> Vec<AdminAction> {
    TRANSITIONS
        .iter()
        .filter(|(_, from, _)| *from == status)
        .map(|(a, _, _)| *a)
        .collect()
}

/// Apply `action` to `current`.
///
/// # Errors
/// [`TransitionError`] when `action` does not start at `current`.
pub fn next_status(
    current: OrderStatus,
    action: AdminAction,
) -> Result<OrderStatus, TransitionError> {
    if action.from_status() == current {
        Ok(action.to_status())
    } else {
        Err(TransitionError {
            from: current,
            action,
        })
    }
}

/// The action whose edge is exactly `from → to`, if any.
pub fn action_between(from: OrderStatus, to: OrderStatus) -> Option<AdminAction> {
    TRANSITIONS
        .iter()
        .find(|(_, f, t)| *f == from && *t == to)
        .map(|(a, _, _)| *a)
}

// ---------------------------------------------------------------------------
// CheckoutFlow
// ---------------------------------------------------------------------------

/// Checkout variant; decides the initial status of the created order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutFlow {
    /// No payment step.
    Direct,
    /// A payment screenshot is uploaded and verified manually.
    PaymentProof,
}

impl CheckoutFlow {
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            CheckoutFlow::Direct => OrderStatus::Pending,
            CheckoutFlow::PaymentProof => OrderStatus::AwaitingPaymentVerification,
        }
    }

    pub fn requires_payment_proof(&self) -> bool {
        matches!(self, CheckoutFlow::PaymentProof)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
