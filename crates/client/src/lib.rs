//! Marketbag Client - cart/order synchronization core.
//!
//! This crate keeps a user's shopping cart consistent across three divergent
//! sources of truth:
//!
//! - a durable on-device key-value cache ([`storage`]),
//! - an in-memory reactive snapshot consumed by presentation layers
//!   ([`cart::CartStore`]),
//! - the remote cart/order backend ([`services`]).
//!
//! The [`cart::CartSynchronizer`] owns every cart mutation and serializes
//! read-modify-write cycles against the durable cache per user, so two
//! overlapping increments can never lose an update. The
//! [`orders::OrderLifecycle`] drives orders through the new → paid →
//! delivered state machine against the server-authoritative order service.
//!
//! Everything is wired together by a [`context::StoreContext`] created at
//! login and torn down at sign-out; there is no ambient global state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod context;
pub mod error;
pub mod orders;
pub mod services;
pub mod session;
pub mod storage;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

mod http;

pub use cart::{CartStore, CartSynchronizer};
pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use context::{ContextError, StoreContext};
pub use error::{
    ApiError, CacheError, CartError, CatalogError, OrderError, RemoteCartError, RemoteOrderError,
};
pub use orders::{OrderBook, OrderLifecycle};
