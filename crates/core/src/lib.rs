//! Marketbag Core - Shared types library.
//!
//! This crate provides common types used across all Marketbag components:
//! - `client` - Cart/order synchronization core for the mobile storefront
//! - `integration-tests` - Cross-module scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no durable
//! storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, cart and order data, sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
