//! Event coordinator.
//!
//! Turns native browser events and page requests into registry, entity and
//! action-window operations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   CoordinatorCommand   ┌──────────────────┐
//! │ native events    │───────────────────────▶│ CoordinatorActor │
//! │ page requests    │     (mpsc channel)     └────────┬─────────┘
//! └──────────────────┘                                 │ one task per input
//!                                                      ▼
//!                                             ┌──────────────────┐
//!                                             │   Coordinator    │──▶ Context
//!                                             │    handlers      │   (registry,
//!                                             └──────────────────┘    action window)
//! ```
//!
//! Tests that need deterministic ordering call [`Coordinator`] handlers
//! directly; the actor is for running against a live event source.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod actor;
mod commands;
mod handle;
mod handlers;

pub use actor::CoordinatorActor;
pub use commands::{CoordinatorCommand, CoordinatorError};
pub use handle::CoordinatorHandle;
pub use handlers::Coordinator;

use crate::context::Context;

/// Channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawns the coordinator actor over `context` and returns a handle to it.
///
/// The actor stops when `cancel_token` is cancelled or every handle is
/// dropped.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tabsyncd::browser::MemoryBrowser;
/// use tabsyncd::config::Config;
/// use tabsyncd::context::Context;
/// use tabsyncd::coordinator::spawn_coordinator;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let browser = Arc::new(MemoryBrowser::new());
///     let context = Arc::new(Context::from_browser(browser, Config::default()));
///     let handle = spawn_coordinator(context, CancellationToken::new());
///
///     let customers = handle.dump().await;
/// }
/// ```
pub fn spawn_coordinator(
    context: Arc<Context>,
    cancel_token: CancellationToken,
) -> CoordinatorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = CoordinatorActor::new(cmd_rx, Coordinator::from_shared(context), cancel_token);
    tokio::spawn(actor.run());

    CoordinatorHandle::new(cmd_tx)
}
