//! Order lifecycle tracking.

mod lifecycle;

pub use lifecycle::{OrderBook, OrderLifecycle};
