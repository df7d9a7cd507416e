//! kadai-lifecycle
//!
//! The order lifecycle as one closed status set and one transition table.
//! Every view and every admin action in the workspace consults this crate;
//! nothing else is allowed to decide what status an order may move to.
//!
//! - [`OrderStatus`]: the seven-value closed set.
//! - [`AdminAction`]: one action per edge of the transition table.
//! - [`CheckoutFlow`]: which status a freshly created order starts in.
//! - [`OrderQueue`]: status predicates behind the admin list views.

mod queue;
mod state_machine;
mod status;

pub use queue::{tracking_is_live, OrderQueue};
pub use state_machine::{
    action_between, allowed_actions, next_status, AdminAction, CheckoutFlow, TransitionError,
    TRANSITIONS,
};
pub use status::{Audience, OrderStatus, ParseStatusError};
