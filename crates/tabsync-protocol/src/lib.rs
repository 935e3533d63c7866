//! tabsync protocol - page <-> coordinator messages
//!
//! This crate provides the inbound request and outbound notification types
//! relayed by the bridging content script, and parsing for raw page messages.

pub mod message;
pub mod parse;

pub use message::{Metadata, Notification, Request, MAIN_TARGET};
pub use parse::{parse_request, parse_request_value, ProtocolError};
