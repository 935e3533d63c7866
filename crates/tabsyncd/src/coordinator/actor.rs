//! Coordinator actor - receives inputs and runs one handler task per input.
//!
//! Handlers are not run to completion one after another: each input gets its
//! own task, so handlers interleave at their await points the way browser
//! callbacks do. The actor only keeps track of the tasks it started.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Handler failures are logged and never stop the loop
//! - Reply send failures are ignored (the caller dropped its receiver)

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::CoordinatorCommand;
use super::handlers::Coordinator;

/// The coordinator actor.
pub struct CoordinatorActor {
    receiver: mpsc::Receiver<CoordinatorCommand>,
    coordinator: Coordinator,
    /// In-flight handler tasks
    tasks: JoinSet<()>,
    cancel_token: CancellationToken,
}

impl CoordinatorActor {
    pub fn new(
        receiver: mpsc::Receiver<CoordinatorCommand>,
        coordinator: Coordinator,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            coordinator,
            tasks: JoinSet::new(),
            cancel_token,
        }
    }

    /// Runs the actor loop until cancelled or every handle is dropped.
    ///
    /// On exit all keepalive timers are stopped. Handler tasks still in
    /// flight are aborted.
    pub async fn run(mut self) {
        info!("Coordinator starting");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Coordinator cancelled");
                    break;
                }
                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Handler task failed");
                    }
                }
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.coordinator.context().keepalive().shutdown();
        let dropped = self.tasks.len();
        self.tasks.shutdown().await;
        info!(dropped, "Coordinator stopped");
    }

    async fn handle_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::Event(event) => {
                let coordinator = self.coordinator.clone();
                self.tasks.spawn(async move {
                    coordinator.dispatch_event(event).await;
                });
            }
            CoordinatorCommand::Request {
                request,
                respond_to,
            } => {
                let coordinator = self.coordinator.clone();
                self.tasks.spawn(async move {
                    let result = coordinator.dispatch_request(request).await;
                    let _ = respond_to.send(result);
                });
            }
            CoordinatorCommand::Dump { respond_to } => {
                let dump = self.coordinator.context().registry().dump();
                let _ = respond_to.send(dump);
            }
            CoordinatorCommand::Flush { respond_to } => {
                self.drain().await;
                let _ = respond_to.send(());
            }
        }
    }

    /// Waits for every in-flight handler.
    async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Handler task failed");
            }
        }
    }
}
