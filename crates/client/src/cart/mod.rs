//! Cart state: the reactive store and the synchronizer that drives it.

mod store;
mod sync;

pub use store::{CartAction, CartStore, reduce};
pub use sync::CartSynchronizer;
