//! The shared secondary window that hosts every action tab.
//!
//! At most one action window exists at a time. It is created lazily on the
//! first open, placed on the second monitor and maximized, and forgotten
//! when the browser reports it closed.
//!
//! Window creation is a critical section: the existence check and the
//! create call happen under one async lock, so concurrent opens end up in a
//! single window.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use tabsync_core::WindowId;

use crate::browser::{
    BrowserError, TabController, TabCreate, TabInfo, WindowController, WindowCreate, WindowState,
    WindowUpdate,
};

/// Default delay before minimizing, letting a preceding focus change settle.
pub const DEFAULT_MINIMIZE_SETTLE: Duration = Duration::from_millis(200);

/// Controller for the single action window.
#[derive(Debug)]
pub struct ActionWindow {
    handle: Mutex<Option<WindowId>>,
    creating: AsyncMutex<()>,
    settle: Duration,
}

impl Default for ActionWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMIZE_SETTLE)
    }
}

impl ActionWindow {
    pub fn new(settle: Duration) -> Self {
        Self {
            handle: Mutex::new(None),
            creating: AsyncMutex::new(()),
            settle,
        }
    }

    /// Handle of the action window, if one exists.
    pub fn id(&self) -> Option<WindowId> {
        *self.handle.lock()
    }

    /// Opens `url` in the action window, creating the window if needed.
    ///
    /// Returns the tab the URL was loaded in.
    pub async fn open(
        &self,
        tabs: &dyn TabController,
        windows: &dyn WindowController,
        url: &str,
    ) -> Result<TabInfo, BrowserError> {
        let _creating = self.creating.lock().await;

        if let Some(window) = self.id() {
            match tabs.create(TabCreate::in_window(url, window)).await {
                Ok(tab) => {
                    windows.update(tab.window, WindowUpdate::focus()).await?;
                    return Ok(tab);
                }
                // Closed while its removal event is still in flight
                Err(BrowserError::WindowNotFound(_)) => {
                    debug!(window = %window, "Action window vanished, recreating");
                    self.clear_if(window);
                }
                Err(e) => return Err(e),
            }
        }

        let screen = windows.primary_screen().await?;
        let created = windows
            .create(WindowCreate {
                url: url.to_string(),
                left: screen.width,
                width: screen.width.saturating_mul(2),
                height: screen.height,
            })
            .await?;
        *self.handle.lock() = Some(created.id);
        info!(window = %created.id, "Action window created");

        windows
            .update(created.id, WindowUpdate::state(WindowState::Maximized))
            .await?;

        tabs.in_window(created.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::Rejected(format!("window {} has no tab", created.id)))
    }

    /// Minimizes the action window after the settle delay.
    pub async fn minimize(&self, windows: &dyn WindowController) -> Result<(), BrowserError> {
        let Some(window) = self.id() else {
            return Ok(());
        };

        tokio::time::sleep(self.settle).await;

        // Closed or replaced while settling
        if self.id() != Some(window) {
            return Ok(());
        }

        debug!(window = %window, "Minimizing action window");
        windows
            .update(window, WindowUpdate::state(WindowState::Minimized))
            .await
    }

    /// The active tab of the action window, if the window exists.
    pub async fn current(&self, tabs: &dyn TabController) -> Result<Option<TabInfo>, BrowserError> {
        let Some(window) = self.id() else {
            return Ok(None);
        };

        match tabs.active_in(window).await {
            Err(BrowserError::WindowNotFound(_)) => Ok(None),
            result => result,
        }
    }

    /// Forgets the action window.
    pub fn clear(&self) {
        *self.handle.lock() = None;
    }

    /// Forgets the action window if it is `window`. Returns true if cleared.
    pub fn clear_if(&self, window: WindowId) -> bool {
        let mut handle = self.handle.lock();
        if *handle == Some(window) {
            *handle = None;
            true
        } else {
            false
        }
    }
}
