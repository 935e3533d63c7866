//! Shared coordinator state.
//!
//! Everything the event handlers touch lives in one [`Context`]: the
//! registry, the action window, the browser capabilities, the page matcher,
//! the keepalive timers and the main tab. The context is built once and
//! shared behind an `Arc`, so several coordinators can run side by side in
//! one process (tests do this).
//!
//! The registry lock is synchronous. Never hold the guard across an
//! `.await`; bind what you need with `let` and drop it first.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use tabsync_core::{PageMatcher, TabId};

use crate::action_window::ActionWindow;
use crate::browser::{TabController, WindowController};
use crate::config::Config;
use crate::keepalive::Keepalive;
use crate::registry::TabMap;

/// State shared by all handlers of one coordinator.
pub struct Context {
    tabs: Arc<dyn TabController>,
    windows: Arc<dyn WindowController>,
    registry: Mutex<TabMap>,
    action_window: ActionWindow,
    matcher: PageMatcher,
    keepalive: Keepalive,
    main_tab: Mutex<Option<TabId>>,
    config: Config,
}

impl Context {
    pub fn new(
        tabs: Arc<dyn TabController>,
        windows: Arc<dyn WindowController>,
        config: Config,
    ) -> Self {
        Self {
            keepalive: Keepalive::new(Arc::clone(&tabs), config.keepalive),
            action_window: ActionWindow::new(config.minimize_settle()),
            matcher: config.pages.clone(),
            registry: Mutex::new(TabMap::new()),
            main_tab: Mutex::new(None),
            tabs,
            windows,
            config,
        }
    }

    /// Builds a context over one browser implementing both capabilities.
    pub fn from_browser<B>(browser: Arc<B>, config: Config) -> Self
    where
        B: TabController + WindowController + 'static,
    {
        let tabs: Arc<dyn TabController> = browser.clone();
        let windows: Arc<dyn WindowController> = browser;
        Self::new(tabs, windows, config)
    }

    pub fn tabs(&self) -> &dyn TabController {
        self.tabs.as_ref()
    }

    pub fn windows(&self) -> &dyn WindowController {
        self.windows.as_ref()
    }

    /// Locks the registry.
    pub fn registry(&self) -> MutexGuard<'_, TabMap> {
        self.registry.lock()
    }

    pub fn action_window(&self) -> &ActionWindow {
        &self.action_window
    }

    pub fn matcher(&self) -> &PageMatcher {
        &self.matcher
    }

    pub fn keepalive(&self) -> &Keepalive {
        &self.keepalive
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The tab `send` requests are relayed to.
    pub fn main_tab(&self) -> Option<TabId> {
        *self.main_tab.lock()
    }

    pub fn set_main_tab(&self, tab: TabId) {
        *self.main_tab.lock() = Some(tab);
    }

    /// Forgets the main tab if it is `tab`. Returns true if cleared.
    pub fn clear_main_tab(&self, tab: TabId) -> bool {
        let mut main_tab = self.main_tab.lock();
        if *main_tab == Some(tab) {
            *main_tab = None;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("registry", &*self.registry.lock())
            .field("action_window", &self.action_window)
            .field("main_tab", &self.main_tab())
            .finish_non_exhaustive()
    }
}
