//! Integer minor-unit money.
//!
//! Every price and total in the workspace is an `i64` count of minor units
//! (paise; 100 per rupee). `f64` rupee amounts appear only at the edge:
//!
//! | Direction          | Function            |
//! |--------------------|---------------------|
//! | internal → display | [`minor_to_price`]  |
//! | user input → internal | [`price_to_minor`] |

use crate::OrderItem;

/// 1 rupee = 100 paise.
pub const MINOR_PER_UNIT: i64 = 100;

// ---------------------------------------------------------------------------
// PricingError
// ---------------------------------------------------------------------------

/// Errors returned by [`price_to_minor`] when the input is not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Input was `NaN` or infinite.
    NotFinite,
    /// Input would overflow `i64` after scaling by [`MINOR_PER_UNIT`].
    OutOfRange,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::NotFinite => write!(f, "price_to_minor: non-finite input (NaN or Inf)"),
            PricingError::OutOfRange => {
                write!(f, "price_to_minor: price out of i64 range after scaling")
            }
        }
    }
}

impl std::error::Error for PricingError {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn minor_to_price(minor: i64) -> f64 {
    minor as f64 / MINOR_PER_UNIT as f64
}

/// Convert a rupee amount typed by a person into minor units, rounding to the
/// nearest paisa.
///
/// # Errors
/// [`PricingError::NotFinite`] for `NaN`/`Inf`, [`PricingError::OutOfRange`]
/// when the scaled value does not fit `i64`.
pub fn price_to_minor(price: f64) -> Result<i64, PricingError> {
    if !price.is_finite() {
        return Err(PricingError::NotFinite);
    }
    let scaled = price * MINOR_PER_UNIT as f64;
    if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(PricingError::OutOfRange);
    }
    Ok(scaled.round() as i64)
}

/// Σ price × quantity, saturating instead of wrapping.
pub fn order_total(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .fold(0_i64, |acc, it| acc.saturating_add(it.line_total()))
}

/// `"₹12.50"` style rendering for CLI output.
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let unit = MINOR_PER_UNIT as u64;
    format!("{sign}₹{}.{:02}", abs / unit, abs % unit)
}
