//! Customer entity - a main-window tab that owns zero or more actions.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use tabsync_core::{encode, TabId, WindowId};
use tabsync_protocol::Metadata;

use super::Action;
use crate::browser::{BrowserError, WindowState, WindowUpdate};
use crate::context::Context;
use crate::registry::Entity;

/// A customer tab and the actions it owns.
#[derive(Debug)]
pub struct Customer {
    id: String,
    tab: TabId,
    /// Owned actions in registration order, unique per tab
    actions: Mutex<Vec<Arc<Action>>>,
}

impl Customer {
    pub fn new(id: impl Into<String>, tab: TabId) -> Self {
        Self {
            id: id.into(),
            tab,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Snapshot of the owned actions.
    pub fn actions(&self) -> Vec<Arc<Action>> {
        self.actions.lock().clone()
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().len()
    }

    /// The owned action living in `tab`.
    pub fn action_by_tab(&self, tab: TabId) -> Option<Arc<Action>> {
        self.actions.lock().iter().find(|a| a.tab() == tab).cloned()
    }

    /// The owned action with the given action id.
    pub fn find_action(&self, action_id: &str) -> Option<Arc<Action>> {
        self.actions.lock().iter().find(|a| a.id() == action_id).cloned()
    }

    /// Creates an action owned by this customer.
    ///
    /// The caller is responsible for also registering it in the registry.
    pub fn register(
        self: &Arc<Self>,
        action_id: &str,
        window: WindowId,
        tab: TabId,
    ) -> Arc<Action> {
        self.register_named(action_id, window, tab, None)
    }

    /// Like [`Customer::register`], with a human-readable tab name.
    pub fn register_named(
        self: &Arc<Self>,
        action_id: &str,
        window: WindowId,
        tab: TabId,
        name: Option<String>,
    ) -> Arc<Action> {
        let action = Arc::new(Action::new(action_id, Arc::downgrade(self), window, tab, name));

        let mut actions = self.actions.lock();
        match actions.iter_mut().find(|a| a.tab() == tab) {
            Some(slot) => *slot = Arc::clone(&action),
            None => actions.push(Arc::clone(&action)),
        }
        action
    }

    /// Drops the owned action living in `tab`. Idempotent.
    pub fn deregister(&self, tab: TabId) -> Option<Arc<Action>> {
        let mut actions = self.actions.lock();
        let position = actions.iter().position(|a| a.tab() == tab)?;
        Some(actions.remove(position))
    }

    /// Closes one owned action, or the whole customer.
    ///
    /// If `tab` names one of this customer's actions only that action is
    /// closed. Otherwise every action and the customer tab are removed in one
    /// request, each action carrying `metadata`.
    pub async fn close(
        &self,
        ctx: &Context,
        tab: Option<TabId>,
        metadata: Option<Metadata>,
    ) -> Result<(), BrowserError> {
        if let Some(action) = tab.and_then(|tab| self.action_by_tab(tab)) {
            return action.close(ctx, metadata).await;
        }

        let mut tabs: Vec<TabId> = self
            .actions()
            .iter()
            .map(|action| {
                action.attach_metadata(metadata.clone());
                action.tab()
            })
            .collect();
        tabs.push(self.tab);

        info!(customer = %self.id, tabs = tabs.len(), "Closing customer");
        ctx.tabs().remove(&tabs).await
    }

    /// Brings the action window in line with this customer.
    ///
    /// Tab activation never moves window focus, so after syncing the action
    /// window the customer's own tab is reactivated and the action window's
    /// focus is left as it is.
    pub async fn focus(&self, ctx: &Context) -> Result<(), BrowserError> {
        let Some(current) = ctx.action_window().current(ctx.tabs()).await? else {
            return Ok(());
        };

        // Action window shows something unrelated
        let Some(current_action) = ctx.registry().action(current.id) else {
            debug!(customer = %self.id, tab = %current.id, "Action window shows unregistered tab");
            return Ok(());
        };

        if self.action_count() == 0 {
            return ctx.action_window().minimize(ctx.windows()).await;
        }

        let window = ctx.windows().get(current.window).await?;
        if window.state == WindowState::Minimized {
            ctx.windows().update(window.id, WindowUpdate::focus()).await?;
        }

        if !current_action.belongs_to(self) {
            if let Some(first) = self.actions().first() {
                ctx.tabs().activate(first.tab()).await?;
            }
        }

        ctx.tabs().activate(self.tab).await
    }

    /// Opens `url` as action `action_id` of this customer.
    ///
    /// Without a url or action id this only activates the customer tab. An
    /// existing action with the same id is activated instead of reopened.
    pub async fn open(
        self: &Arc<Self>,
        ctx: &Context,
        url: Option<&str>,
        action_id: Option<&str>,
        name: Option<String>,
    ) -> Result<Option<Arc<Action>>, BrowserError> {
        let (Some(url), Some(action_id)) = (url, action_id) else {
            ctx.tabs().activate(self.tab).await?;
            return Ok(None);
        };

        if let Some(existing) = self.find_action(action_id) {
            ctx.tabs().activate(existing.tab()).await?;
            return Ok(Some(existing));
        }

        let tab = ctx
            .action_window()
            .open(ctx.tabs(), ctx.windows(), url)
            .await?;

        // The customer may have been closed while the tab was being created
        if !ctx.registry().holds_customer(self) {
            debug!(customer = %self.id, tab = %tab.id, "Customer gone before action opened");
            return Ok(None);
        }

        // A concurrent open of the same id may have won the race
        if let Some(existing) = self.find_action(action_id) {
            if existing.tab() != tab.id {
                debug!(
                    customer = %self.id,
                    action = action_id,
                    tab = %tab.id,
                    "Action opened twice, dropping duplicate tab"
                );
                ctx.tabs().remove(&[tab.id]).await?;
                ctx.tabs().activate(existing.tab()).await?;
                return Ok(Some(existing));
            }
        }

        // The navigation handler may already have registered the new tab
        let registered = ctx.registry().action(tab.id);
        let action = match registered {
            Some(action) => action,
            None => {
                let action = self.register_named(action_id, tab.window, tab.id, name);
                ctx.registry().set(
                    encode(&self.id, Some(action_id)),
                    tab.id,
                    Entity::Action(Arc::clone(&action)),
                );
                action
            }
        };

        info!(
            customer = %self.id,
            action = action.id(),
            name = action.name().unwrap_or(""),
            tab = %tab.id,
            "Action opened"
        );

        action.focus(ctx).await?;
        Ok(Some(action))
    }
}
