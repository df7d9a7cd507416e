//! kadai-shop
//!
//! Storefront workflows on top of the document and object stores:
//!
//! - [`cart`]: session-local carts keyed by customer id.
//! - [`checkout`]: validated order placement.
//! - [`catalog`]: catalog reader and admin catalog writer.
//! - [`orders`]: admin queues, transitions with audit, customer views.
//! - [`relay`]: the delivery-location relay loop.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod relay;
mod validation;

pub use cart::{Cart, CartItem, CartStore, CheckoutGuard};
pub use catalog::{validate_product, CatalogError, CatalogService, ProductForm};
pub use checkout::{validate_checkout, CheckoutError, CheckoutService, CustomerDetails};
pub use orders::{OrderActionError, OrderService, TrackingView};
pub use relay::{
    spawn_relay, GeoError, LocationSink, PositionSource, RelayHandle, RelayOutcome, RelayReport,
};
pub use validation::{FieldError, ImageUpload, ValidationErrors};
