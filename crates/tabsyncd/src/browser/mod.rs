//! Native browser capabilities.
//!
//! The coordinator never talks to a browser directly. It depends on the
//! [`TabController`] and [`WindowController`] traits; the extension binding
//! implements them against the real tabs/windows APIs and tests use
//! [`MemoryBrowser`].
//!
//! Native events flow the other way as [`BrowserEvent`] values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tabsync_core::{TabId, WindowId};
use tabsync_protocol::Notification;

pub mod memory;

pub use memory::{BrowserCall, MemoryBrowser};

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a native tab/window operation.
///
/// Most of these are races (the tab was closed while a request was in
/// flight) and are swallowed at the coordinator's handler boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    /// The tab does not exist (anymore).
    #[error("tab not found: {0}")]
    TabNotFound(TabId),

    /// The window does not exist (anymore).
    #[error("window not found: {0}")]
    WindowNotFound(WindowId),

    /// The browser refused the operation.
    #[error("browser rejected request: {0}")]
    Rejected(String),
}

// ============================================================================
// Native Records
// ============================================================================

/// Snapshot of a native tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window: WindowId,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Native window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Snapshot of a native window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub state: WindowState,
    pub focused: bool,
}

/// Primary screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Options for creating a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabCreate {
    pub url: String,
    /// Target window; the browser picks one when `None`
    pub window: Option<WindowId>,
    pub active: bool,
}

impl TabCreate {
    /// Active tab in the given window.
    pub fn in_window(url: impl Into<String>, window: WindowId) -> Self {
        Self {
            url: url.into(),
            window: Some(window),
            active: true,
        }
    }

    /// Inactive tab in the browser's current window.
    pub fn background(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            window: None,
            active: false,
        }
    }
}

/// Options for creating a window with a single tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCreate {
    pub url: String,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// Partial window update; unset fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowUpdate {
    pub focused: Option<bool>,
    pub state: Option<WindowState>,
}

impl WindowUpdate {
    /// Focus the window (restores it if minimized).
    pub fn focus() -> Self {
        Self {
            focused: Some(true),
            state: None,
        }
    }

    /// Change the window state.
    pub fn state(state: WindowState) -> Self {
        Self {
            focused: None,
            state: Some(state),
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Native tab operations.
#[async_trait]
pub trait TabController: Send + Sync {
    /// Looks up a tab.
    async fn get(&self, tab: TabId) -> Result<TabInfo, BrowserError>;

    /// The active tab of a window, if it has any.
    async fn active_in(&self, window: WindowId) -> Result<Option<TabInfo>, BrowserError>;

    /// All tabs of a window in tab-strip order.
    async fn in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, BrowserError>;

    /// Creates a tab.
    async fn create(&self, options: TabCreate) -> Result<TabInfo, BrowserError>;

    /// Makes a tab the active tab of its window. Does not focus the window.
    async fn activate(&self, tab: TabId) -> Result<(), BrowserError>;

    /// Removes the given tabs as one request.
    async fn remove(&self, tabs: &[TabId]) -> Result<(), BrowserError>;

    /// Simulates a user click on the page body.
    async fn click(&self, tab: TabId) -> Result<(), BrowserError>;

    /// Delivers a notification to the page loaded in a tab.
    async fn send(&self, tab: TabId, notification: Notification) -> Result<(), BrowserError>;
}

/// Native window operations.
#[async_trait]
pub trait WindowController: Send + Sync {
    /// Looks up a window.
    async fn get(&self, window: WindowId) -> Result<WindowInfo, BrowserError>;

    /// Creates a window with one tab loading `options.url`.
    async fn create(&self, options: WindowCreate) -> Result<WindowInfo, BrowserError>;

    /// Applies a partial update to a window.
    async fn update(&self, window: WindowId, update: WindowUpdate) -> Result<(), BrowserError>;

    /// Dimensions of the primary screen.
    async fn primary_screen(&self) -> Result<ScreenSize, BrowserError>;
}

// ============================================================================
// Events
// ============================================================================

/// Native lifecycle events delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// A tab navigated or changed. `url` is set only when it changed.
    TabUpdated {
        tab: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    /// A tab became the active tab of its window.
    TabActivated { tab: TabId, window: WindowId },

    /// Window focus moved. `None` means no browser window has focus.
    WindowFocusChanged {
        #[serde(default)]
        window: Option<WindowId>,
    },

    /// A tab was closed.
    TabRemoved { tab: TabId },

    /// A window was closed.
    WindowRemoved { window: WindowId },
}

impl BrowserEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TabUpdated { .. } => "tab_updated",
            Self::TabActivated { .. } => "tab_activated",
            Self::WindowFocusChanged { .. } => "window_focus_changed",
            Self::TabRemoved { .. } => "tab_removed",
            Self::WindowRemoved { .. } => "window_removed",
        }
    }
}
