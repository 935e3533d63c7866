//! tabsync coordinator - tab/window registry and focus synchronization
//!
//! This crate keeps customer tabs and their action tabs in sync:
//! - `registry` - bidirectional id/tab map of live customers and actions
//! - `entity` - customer and action focus/open/close operations
//! - `action_window` - the single secondary window hosting all actions
//! - `coordinator` - event and request handlers, and the actor running them
//! - `browser` - native tab/window capabilities and an in-memory browser
//! - `keepalive` - periodic background visits of a target URL
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     tabsync coordinator                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ BrowserEvent /  │────▶│      CoordinatorActor       │   │
//! │  │ Request         │     │   (one task per input)      │   │
//! │  └─────────────────┘     └──────────────┬──────────────┘   │
//! │                                         │                   │
//! │                                         ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ TabController / │◀────│ Context: TabMap, entities,  │   │
//! │  │WindowController │     │ ActionWindow, Keepalive     │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod action_window;
pub mod browser;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod entity;
pub mod keepalive;
pub mod registry;
