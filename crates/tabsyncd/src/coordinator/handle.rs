//! Client interface for the coordinator actor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `CoordinatorError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use tabsync_protocol::{parse_request, Request};

use super::commands::{CoordinatorCommand, CoordinatorError};
use crate::browser::BrowserEvent;
use crate::registry::RegistryDump;

/// Handle for feeding the coordinator actor.
///
/// Cheap to clone; share it with the native event source and the message
/// relay.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    pub fn new(sender: mpsc::Sender<CoordinatorCommand>) -> Self {
        Self { sender }
    }

    /// Queues a native event. Returns once it is accepted, not handled.
    pub async fn event(&self, event: BrowserEvent) -> Result<(), CoordinatorError> {
        self.sender
            .send(CoordinatorCommand::Event(event))
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Sends a request and waits for its handler to finish.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::UnimplementedTarget` for a `send` to anything but `main`
    /// - `CoordinatorError::Browser` if a native call failed
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn request(&self, request: Request) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Request {
                request,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Parses a raw page message and sends it as a request.
    pub async fn request_json(&self, text: &str) -> Result<(), CoordinatorError> {
        let request = parse_request(text)?;
        self.request(request).await
    }

    /// Snapshot of all registered customers and actions.
    pub async fn dump(&self) -> Result<RegistryDump, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Dump { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Waits until every handler queued before this call has finished.
    pub async fn flush(&self) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Flush { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
