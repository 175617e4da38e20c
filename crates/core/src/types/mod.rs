//! Core types for Marketbag.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod order;
pub mod price;
pub mod session;

pub use cart::{CartLine, CartSnapshot, PersistedCart, PersistedLine};
pub use id::*;
pub use order::{InvalidStatusFlags, Order, OrderLine, OrderStatus};
pub use price::Price;
pub use session::{Session, User};
