//! Single-threaded reactive primitives the viewers are built on.
//!
//! - [`Observable`] holds a value and notifies subscribers on change.
//! - [`Subscription`] keeps a callback registered until dropped.
//! - [`BatchScope`] defers and coalesces notifications.

pub mod batch;
pub mod observable;

pub use batch::BatchScope;
pub use observable::{Observable, Subscription};
