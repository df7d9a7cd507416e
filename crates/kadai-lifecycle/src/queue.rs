use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

/// Status predicates behind the order list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderQueue {
    /// Payment verification queue: awaiting verification or payment rejected.
    Payments,
    /// Everything that is not in the payment queue.
    Fulfillment,
    /// No status filter (customer "My Orders" scopes by owner instead).
    #[default]
    All,
}

impl OrderQueue {
    const PAYMENT_STATES: [OrderStatus; 2] = [
        OrderStatus::AwaitingPaymentVerification,
        OrderStatus::PaymentRejected,
    ];

    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            OrderQueue::Payments => Self::PAYMENT_STATES.contains(&status),
            OrderQueue::Fulfillment => !Self::PAYMENT_STATES.contains(&status),
            OrderQueue::All => true,
        }
    }

    /// Statuses this queue admits, in [`OrderStatus::ALL`] order.
    pub fn statuses(&self) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|s| self.matches(*s))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderQueue::Payments => "payments",
            OrderQueue::Fulfillment => "fulfillment",
            OrderQueue::All => "all",
        }
    }
}

impl std::str::FromStr for OrderQueue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payments" => Ok(OrderQueue::Payments),
            "fulfillment" => Ok(OrderQueue::Fulfillment),
            "all" => Ok(OrderQueue::All),
            other => Err(format!("unknown order queue: {other:?}")),
        }
    }
}

/// The customer tracking view renders the live map only while the order is
/// out for delivery. Location writes are accepted in any status.
pub fn tracking_is_live(status: OrderStatus) -> bool {
    status == OrderStatus::OutForDelivery
}
