use serde::{Deserialize, Serialize};

/// All valid states an order can occupy.
///
/// Serialized as the snake_case strings stored in the `status` field of the
/// order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed with a payment proof that still needs a manual check.
    AwaitingPaymentVerification,
    /// Payment proof rejected. **Terminal.**
    PaymentRejected,
    /// Placed (or payment confirmed); awaiting the fulfillment decision.
    Pending,
    /// Fulfillment accepted.
    Approved,
    /// Fulfillment declined. **Terminal.**
    Rejected,
    /// Handed to delivery; the location relay is meaningful in this state.
    OutForDelivery,
    /// Fulfillment complete. **Terminal.**
    Delivered,
}

/// Who is looking at a status label. The storefront and the admin console
/// word the payment states differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Admin,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::AwaitingPaymentVerification,
        OrderStatus::PaymentRejected,
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPaymentVerification => "awaiting_payment_verification",
            OrderStatus::PaymentRejected => "payment_rejected",
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Returns `true` if no admin action leaves this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentRejected | OrderStatus::Rejected | OrderStatus::Delivered
        )
    }

    pub fn label(&self, audience: Audience) -> &'static str {
        match (self, audience) {
            (OrderStatus::AwaitingPaymentVerification, Audience::Customer) => "Awaiting Payment",
            (OrderStatus::AwaitingPaymentVerification, Audience::Admin) => "Awaiting Verification",
            (OrderStatus::PaymentRejected, _) => "Payment Rejected",
            (OrderStatus::Pending, _) => "Pending",
            (OrderStatus::Approved, _) => "Approved",
            (OrderStatus::Rejected, _) => "Rejected",
            (OrderStatus::OutForDelivery, _) => "Out for Delivery",
            (OrderStatus::Delivered, _) => "Delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the seven status values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid order status: {:?}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_value() {
        for st in OrderStatus::ALL {
            assert_eq!(st.as_str().parse::<OrderStatus>().unwrap(), st);
        }
    }

    #[test]
    fn unknown_string_is_rejected() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, ParseStatusError("shipped".to_string()));
    }

    #[test]
    fn serde_uses_record_strings() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        let back: OrderStatus = serde_json::from_str("\"awaiting_payment_verification\"").unwrap();
        assert_eq!(back, OrderStatus::AwaitingPaymentVerification);
        assert!(serde_json::from_str::<OrderStatus>("\"cancelled\"").is_err());
    }

    #[test]
    fn exactly_three_terminal_states() {
        let terminal: Vec<_> = OrderStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 3);
    }

    #[test]
    fn payment_label_differs_by_audience() {
        let st = OrderStatus::AwaitingPaymentVerification;
        assert_eq!(st.label(Audience::Customer), "Awaiting Payment");
        assert_eq!(st.label(Audience::Admin), "Awaiting Verification");
    }
}
