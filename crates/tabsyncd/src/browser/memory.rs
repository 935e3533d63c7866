//! In-memory browser.
//!
//! Implements both capability traits over plain data so the coordinator can
//! be driven without a real browser. Every API call the coordinator makes is
//! recorded as a [`BrowserCall`], and the lifecycle events a real browser
//! would fire are optionally forwarded into a channel.
//!
//! Each trait method yields once before touching state, so concurrent
//! callers interleave at the same points they would against a real browser.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use tabsync_core::{TabId, WindowId};
use tabsync_protocol::Notification;

use super::{
    BrowserError, BrowserEvent, ScreenSize, TabController, TabCreate, TabInfo, WindowController,
    WindowCreate, WindowInfo, WindowState, WindowUpdate,
};

/// Default primary screen size.
pub const DEFAULT_SCREEN: ScreenSize = ScreenSize {
    width: 1920,
    height: 1080,
};

/// A native API call made against the memory browser.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCall {
    CreateTab(TabCreate),
    ActivateTab(TabId),
    RemoveTabs(Vec<TabId>),
    Click(TabId),
    Send {
        tab: TabId,
        notification: Notification,
    },
    CreateWindow(WindowCreate),
    UpdateWindow {
        window: WindowId,
        update: WindowUpdate,
    },
}

#[derive(Debug)]
struct WindowRecord {
    info: WindowInfo,
    /// State to return to when a minimized window is focused
    restore: WindowState,
}

#[derive(Debug)]
struct State {
    next_tab: u64,
    next_window: u64,
    /// Tabs in creation order
    tabs: Vec<TabInfo>,
    windows: BTreeMap<WindowId, WindowRecord>,
    focused: Option<WindowId>,
    screen: ScreenSize,
    calls: Vec<BrowserCall>,
}

/// In-memory implementation of [`TabController`] and [`WindowController`].
#[derive(Debug)]
pub struct MemoryBrowser {
    state: Mutex<State>,
    events: Option<mpsc::UnboundedSender<BrowserEvent>>,
}

impl Default for MemoryBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBrowser {
    /// Creates an empty browser that emits no events.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_tab: 1,
                next_window: 1,
                tabs: Vec::new(),
                windows: BTreeMap::new(),
                focused: None,
                screen: DEFAULT_SCREEN,
                calls: Vec::new(),
            }),
            events: None,
        }
    }

    /// Creates an empty browser that forwards lifecycle events.
    pub fn with_events() -> (Self, mpsc::UnboundedReceiver<BrowserEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut browser = Self::new();
        browser.events = Some(tx);
        (browser, rx)
    }

    // ========================================================================
    // Seeding and user actions (not recorded as calls)
    // ========================================================================

    /// Sets the primary screen size.
    pub fn set_screen(&self, screen: ScreenSize) {
        self.state.lock().screen = screen;
    }

    /// Adds an empty, focused window.
    pub fn insert_window(&self) -> WindowId {
        let mut state = self.state.lock();
        let id = WindowId(state.next_window);
        state.next_window += 1;
        state.windows.insert(
            id,
            WindowRecord {
                info: WindowInfo {
                    id,
                    state: WindowState::Normal,
                    focused: false,
                },
                restore: WindowState::Normal,
            },
        );
        set_focus(&mut state, Some(id));
        id
    }

    /// Adds a tab with a chosen id to an existing window.
    ///
    /// Used to mirror tabs that exist before the coordinator starts.
    pub fn insert_tab(
        &self,
        id: TabId,
        window: WindowId,
        url: &str,
        active: bool,
    ) -> Result<TabInfo, BrowserError> {
        let mut state = self.state.lock();
        if !state.windows.contains_key(&window) {
            return Err(BrowserError::WindowNotFound(window));
        }
        if state.tabs.iter().any(|t| t.id == id) {
            return Err(BrowserError::Rejected(format!("tab {id} already exists")));
        }
        state.next_tab = state.next_tab.max(id.0 + 1);
        let info = push_tab(&mut state, id, window, url, active);
        Ok(info)
    }

    /// Navigates a tab the way a user would, emitting `TabUpdated`.
    pub fn navigate(&self, tab: TabId, url: &str) -> Result<(), BrowserError> {
        {
            let mut state = self.state.lock();
            let record = state
                .tabs
                .iter_mut()
                .find(|t| t.id == tab)
                .ok_or(BrowserError::TabNotFound(tab))?;
            record.url = Some(url.to_string());
        }
        self.emit(BrowserEvent::TabUpdated {
            tab,
            url: Some(url.to_string()),
        });
        Ok(())
    }

    /// Closes a tab the way a user would.
    pub fn close_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        let events = {
            let mut state = self.state.lock();
            remove_tabs(&mut state, &[tab])?
        };
        self.emit_all(events);
        Ok(())
    }

    /// Closes a window and all of its tabs the way a user would.
    pub fn close_window(&self, window: WindowId) -> Result<(), BrowserError> {
        let events = {
            let mut state = self.state.lock();
            if !state.windows.contains_key(&window) {
                return Err(BrowserError::WindowNotFound(window));
            }
            let tabs: Vec<TabId> = state
                .tabs
                .iter()
                .filter(|t| t.window == window)
                .map(|t| t.id)
                .collect();
            let mut events = remove_tabs(&mut state, &tabs)?;
            if state.windows.remove(&window).is_some() {
                if state.focused == Some(window) {
                    state.focused = None;
                }
                events.push(BrowserEvent::WindowRemoved { window });
            }
            events
        };
        self.emit_all(events);
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// All recorded API calls in order.
    pub fn calls(&self) -> Vec<BrowserCall> {
        self.state.lock().calls.clone()
    }

    /// Returns and clears the recorded API calls.
    pub fn take_calls(&self) -> Vec<BrowserCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    /// Notifications sent to pages, in order, including sends to tabs that
    /// no longer exist.
    pub fn notifications(&self) -> Vec<(TabId, Notification)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BrowserCall::Send { tab, notification } => Some((*tab, notification.clone())),
                _ => None,
            })
            .collect()
    }

    /// Snapshot of a tab.
    pub fn tab(&self, tab: TabId) -> Option<TabInfo> {
        self.state.lock().tabs.iter().find(|t| t.id == tab).cloned()
    }

    /// Snapshot of a window.
    pub fn window(&self, window: WindowId) -> Option<WindowInfo> {
        self.state.lock().windows.get(&window).map(|w| w.info.clone())
    }

    /// Number of open windows.
    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Number of open tabs.
    pub fn tab_count(&self) -> usize {
        self.state.lock().tabs.len()
    }

    /// The focused window, if any.
    pub fn focused_window(&self) -> Option<WindowId> {
        self.state.lock().focused
    }

    fn record(&self, call: BrowserCall) {
        trace!(?call, "Browser call");
        self.state.lock().calls.push(call);
    }

    fn emit(&self, event: BrowserEvent) {
        if let Some(events) = &self.events {
            // Receiver dropped means nobody is listening
            let _ = events.send(event);
        }
    }

    fn emit_all(&self, events: Vec<BrowserEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

// ============================================================================
// State helpers
// ============================================================================

fn push_tab(state: &mut State, id: TabId, window: WindowId, url: &str, active: bool) -> TabInfo {
    if active {
        for tab in state.tabs.iter_mut().filter(|t| t.window == window) {
            tab.active = false;
        }
    }
    let info = TabInfo {
        id,
        window,
        active,
        url: Some(url.to_string()),
    };
    state.tabs.push(info.clone());
    info
}

/// Moves focus, returning the focus event if it changed.
fn set_focus(state: &mut State, window: Option<WindowId>) -> Option<BrowserEvent> {
    if state.focused == window {
        return None;
    }
    if let Some(previous) = state.focused.and_then(|id| state.windows.get_mut(&id)) {
        previous.info.focused = false;
    }
    if let Some(next) = window.and_then(|id| state.windows.get_mut(&id)) {
        next.info.focused = true;
    }
    state.focused = window;
    Some(BrowserEvent::WindowFocusChanged { window })
}

fn remove_tabs(state: &mut State, tabs: &[TabId]) -> Result<Vec<BrowserEvent>, BrowserError> {
    if let Some(missing) = tabs.iter().find(|id| !state.tabs.iter().any(|t| t.id == **id)) {
        return Err(BrowserError::TabNotFound(*missing));
    }

    let mut events = Vec::new();
    for id in tabs {
        let Some(position) = state.tabs.iter().position(|t| t.id == *id) else {
            continue;
        };
        let removed = state.tabs.remove(position);
        events.push(BrowserEvent::TabRemoved { tab: removed.id });

        // Closing the active tab activates the last remaining tab of the window
        if removed.active {
            if let Some(next) = state.tabs.iter_mut().rev().find(|t| t.window == removed.window) {
                next.active = true;
                events.push(BrowserEvent::TabActivated {
                    tab: next.id,
                    window: next.window,
                });
            }
        }

        // Browsers close a window together with its last tab
        let empty = !state.tabs.iter().any(|t| t.window == removed.window);
        if empty && state.windows.remove(&removed.window).is_some() {
            if state.focused == Some(removed.window) {
                state.focused = None;
            }
            events.push(BrowserEvent::WindowRemoved {
                window: removed.window,
            });
        }
    }
    Ok(events)
}

// ============================================================================
// Capabilities
// ============================================================================

#[async_trait]
impl TabController for MemoryBrowser {
    async fn get(&self, tab: TabId) -> Result<TabInfo, BrowserError> {
        tokio::task::yield_now().await;
        self.tab(tab).ok_or(BrowserError::TabNotFound(tab))
    }

    async fn active_in(&self, window: WindowId) -> Result<Option<TabInfo>, BrowserError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        if !state.windows.contains_key(&window) {
            return Err(BrowserError::WindowNotFound(window));
        }
        Ok(state
            .tabs
            .iter()
            .find(|t| t.window == window && t.active)
            .cloned())
    }

    async fn in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, BrowserError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        if !state.windows.contains_key(&window) {
            return Err(BrowserError::WindowNotFound(window));
        }
        Ok(state
            .tabs
            .iter()
            .filter(|t| t.window == window)
            .cloned()
            .collect())
    }

    async fn create(&self, options: TabCreate) -> Result<TabInfo, BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::CreateTab(options.clone()));

        let info = {
            let mut state = self.state.lock();
            let window = match options.window.or(state.focused) {
                Some(window) if state.windows.contains_key(&window) => window,
                Some(window) => return Err(BrowserError::WindowNotFound(window)),
                None => {
                    return Err(BrowserError::Rejected(
                        "no window to create tab in".to_string(),
                    ))
                }
            };
            let id = TabId(state.next_tab);
            state.next_tab += 1;
            push_tab(&mut state, id, window, &options.url, options.active)
        };

        self.emit(BrowserEvent::TabUpdated {
            tab: info.id,
            url: info.url.clone(),
        });
        if info.active {
            self.emit(BrowserEvent::TabActivated {
                tab: info.id,
                window: info.window,
            });
        }
        Ok(info)
    }

    async fn activate(&self, tab: TabId) -> Result<(), BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::ActivateTab(tab));

        let event = {
            let mut state = self.state.lock();
            let target = state
                .tabs
                .iter()
                .find(|t| t.id == tab)
                .map(|t| (t.window, t.active))
                .ok_or(BrowserError::TabNotFound(tab))?;
            let (window, already_active) = target;
            if already_active {
                None
            } else {
                for record in state.tabs.iter_mut().filter(|t| t.window == window) {
                    record.active = record.id == tab;
                }
                Some(BrowserEvent::TabActivated { tab, window })
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
        Ok(())
    }

    async fn remove(&self, tabs: &[TabId]) -> Result<(), BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::RemoveTabs(tabs.to_vec()));

        let events = {
            let mut state = self.state.lock();
            remove_tabs(&mut state, tabs)?
        };
        self.emit_all(events);
        Ok(())
    }

    async fn click(&self, tab: TabId) -> Result<(), BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::Click(tab));
        self.tab(tab).map(|_| ()).ok_or(BrowserError::TabNotFound(tab))
    }

    async fn send(&self, tab: TabId, notification: Notification) -> Result<(), BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::Send { tab, notification });
        self.tab(tab).map(|_| ()).ok_or(BrowserError::TabNotFound(tab))
    }
}

#[async_trait]
impl WindowController for MemoryBrowser {
    async fn get(&self, window: WindowId) -> Result<WindowInfo, BrowserError> {
        tokio::task::yield_now().await;
        self.window(window).ok_or(BrowserError::WindowNotFound(window))
    }

    async fn create(&self, options: WindowCreate) -> Result<WindowInfo, BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::CreateWindow(options.clone()));

        let (info, tab, focus_event) = {
            let mut state = self.state.lock();
            let id = WindowId(state.next_window);
            state.next_window += 1;
            state.windows.insert(
                id,
                WindowRecord {
                    info: WindowInfo {
                        id,
                        state: WindowState::Normal,
                        focused: false,
                    },
                    restore: WindowState::Normal,
                },
            );
            let tab_id = TabId(state.next_tab);
            state.next_tab += 1;
            let tab = push_tab(&mut state, tab_id, id, &options.url, true);
            let focus_event = set_focus(&mut state, Some(id));
            let info = state
                .windows
                .get(&id)
                .map(|w| w.info.clone())
                .ok_or(BrowserError::WindowNotFound(id))?;
            (info, tab, focus_event)
        };

        self.emit(BrowserEvent::TabUpdated {
            tab: tab.id,
            url: tab.url.clone(),
        });
        self.emit(BrowserEvent::TabActivated {
            tab: tab.id,
            window: tab.window,
        });
        if let Some(event) = focus_event {
            self.emit(event);
        }
        Ok(info)
    }

    async fn update(&self, window: WindowId, update: WindowUpdate) -> Result<(), BrowserError> {
        tokio::task::yield_now().await;
        self.record(BrowserCall::UpdateWindow { window, update });

        let focus_event = {
            let mut state = self.state.lock();
            let record = state
                .windows
                .get_mut(&window)
                .ok_or(BrowserError::WindowNotFound(window))?;

            if let Some(next) = update.state {
                if next != WindowState::Minimized {
                    record.restore = next;
                }
                record.info.state = next;
            }

            if update.focused == Some(true) {
                if record.info.state == WindowState::Minimized {
                    record.info.state = record.restore;
                }
                set_focus(&mut state, Some(window))
            } else if update.state == Some(WindowState::Minimized)
                && state.focused == Some(window)
            {
                set_focus(&mut state, None)
            } else {
                None
            }
        };

        if let Some(event) = focus_event {
            self.emit(event);
        }
        Ok(())
    }

    async fn primary_screen(&self) -> Result<ScreenSize, BrowserError> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_window_opens_single_active_tab() {
        let browser = MemoryBrowser::new();
        let window = WindowController::create(
            &browser,
            WindowCreate {
                url: "https://x/".to_string(),
                left: 1920,
                width: 3840,
                height: 1080,
            },
        )
        .await
        .unwrap();

        let tabs = browser.in_window(window.id).await.unwrap();
        assert_eq!(tabs.len(), 1);
        assert!(tabs[0].active);
        assert_eq!(browser.focused_window(), Some(window.id));
    }

    #[tokio::test]
    async fn test_activate_switches_active_tab() {
        let browser = MemoryBrowser::new();
        let window = browser.insert_window();
        browser.insert_tab(TabId(1), window, "https://a/", true).unwrap();
        browser.insert_tab(TabId(2), window, "https://b/", false).unwrap();

        browser.activate(TabId(2)).await.unwrap();

        let active = browser.active_in(window).await.unwrap().unwrap();
        assert_eq!(active.id, TabId(2));
        assert!(!browser.tab(TabId(1)).unwrap().active);
    }

    #[tokio::test]
    async fn test_activate_emits_only_on_change() {
        let (browser, mut events) = MemoryBrowser::with_events();
        let window = browser.insert_window();
        browser.insert_tab(TabId(1), window, "https://a/", true).unwrap();

        browser.activate(TabId(1)).await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_removing_last_tab_closes_window() {
        let (browser, mut events) = MemoryBrowser::with_events();
        let window = browser.insert_window();
        browser.insert_tab(TabId(5), window, "https://a/", true).unwrap();

        browser.remove(&[TabId(5)]).await.unwrap();

        assert_eq!(events.try_recv().unwrap(), BrowserEvent::TabRemoved { tab: TabId(5) });
        assert_eq!(events.try_recv().unwrap(), BrowserEvent::WindowRemoved { window });
        assert_eq!(browser.window_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_tab_fails_without_side_effects() {
        let browser = MemoryBrowser::new();
        let window = browser.insert_window();
        browser.insert_tab(TabId(1), window, "https://a/", true).unwrap();

        let err = browser.remove(&[TabId(1), TabId(9)]).await.unwrap_err();
        assert_eq!(err, BrowserError::TabNotFound(TabId(9)));
        assert_eq!(browser.tab_count(), 1);
    }

    #[tokio::test]
    async fn test_focus_restores_minimized_window() {
        let browser = MemoryBrowser::new();
        let window = browser.insert_window();
        browser
            .update(window, WindowUpdate::state(WindowState::Maximized))
            .await
            .unwrap();
        browser
            .update(window, WindowUpdate::state(WindowState::Minimized))
            .await
            .unwrap();
        assert_eq!(browser.focused_window(), None);

        browser.update(window, WindowUpdate::focus()).await.unwrap();

        let info = browser.window(window).unwrap();
        assert_eq!(info.state, WindowState::Maximized);
        assert!(info.focused);
    }

    #[tokio::test]
    async fn test_send_to_missing_tab_fails() {
        let browser = MemoryBrowser::new();
        let err = browser
            .send(TabId(3), Notification::select("1", "2"))
            .await
            .unwrap_err();
        assert_eq!(err, BrowserError::TabNotFound(TabId(3)));
        // Attempted sends are still recorded
        assert_eq!(browser.notifications().len(), 1);
    }
}
