//! Customer and action entities.
//!
//! A [`Customer`] owns its [`Action`]s; an action points back at its
//! customer through a weak reference. Entity operations translate into
//! native tab/window calls through the [`Context`](crate::context::Context)
//! they are given, and never remove themselves from the registry: that only
//! happens once the browser reports the tab as gone.

mod action;
mod customer;

pub use action::Action;
pub use customer::Customer;
