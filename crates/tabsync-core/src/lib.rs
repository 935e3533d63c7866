//! tabsync core - shared types for tab/window synchronization
//!
//! This crate provides the identifier codec, native handle types and the
//! page matcher shared between the protocol and the coordinator.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod ids;
pub mod page;

// Re-exports for convenience
pub use ids::{decode, encode, EntityId, TabId, WindowId, ID_SEPARATOR};
pub use page::{PageMatch, PageMatcher, ACTION_ID_PARAM, CUSTOMER_ID_PARAM};
