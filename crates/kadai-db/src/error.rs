use kadai_lifecycle::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Product,
    Order,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecordKind::Product => "product",
            RecordKind::Order => "order",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// The compare-and-swap status write found a different current status.
    #[error("status conflict: expected {expected}, found {actual}")]
    StatusConflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("document store unavailable: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn product_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Product,
            id: id.to_string(),
        }
    }

    pub fn order_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Order,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
