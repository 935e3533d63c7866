//! Coordinator actor commands and errors.
//!
//! - `CoordinatorCommand`: inputs sent to the actor
//! - `CoordinatorError`: errors surfaced to the sender of a request

use thiserror::Error;
use tokio::sync::oneshot;

use tabsync_protocol::{ProtocolError, Request};

use crate::browser::{BrowserError, BrowserEvent};
use crate::registry::RegistryDump;

// ============================================================================
// Coordinator Commands
// ============================================================================

/// Inputs sent to the coordinator actor.
///
/// Events are fire-and-forget. Requests and queries answer through a
/// oneshot channel.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// A native browser lifecycle event.
    Event(BrowserEvent),

    /// A request relayed from a page.
    Request {
        request: Request,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Snapshot of the registry.
    Dump {
        respond_to: oneshot::Sender<RegistryDump>,
    },

    /// Answers once every handler started before it has finished.
    Flush { respond_to: oneshot::Sender<()> },
}

// ============================================================================
// Coordinator Errors
// ============================================================================

/// Errors returned to the sender of a request.
///
/// Lookup misses are never errors; handlers treat them as races and return
/// `Ok`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    /// A native tab/window operation failed.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// A `send` request named a recipient other than `main`.
    #[error("unimplemented target: {0}")]
    UnimplementedTarget(String),

    /// The raw request could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The actor has shut down.
    #[error("coordinator channel closed")]
    ChannelClosed,
}
