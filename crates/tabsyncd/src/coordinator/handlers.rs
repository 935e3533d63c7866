//! Event and request handlers.
//!
//! Each handler reads the registry, suspends on native calls, and re-reads
//! the registry after every suspension: another handler may have run in
//! between. A lookup miss aborts the handler quietly.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tabsync_core::{EntityId, TabId, WindowId};
use tabsync_protocol::{Metadata, Notification, Request, MAIN_TARGET};

use super::commands::CoordinatorError;
use crate::browser::{BrowserError, BrowserEvent};
use crate::context::Context;
use crate::entity::{Action, Customer};
use crate::registry::Entity;

/// Event coordinator over a shared [`Context`].
///
/// Cheap to clone. Every clone drives the same registry.
#[derive(Debug, Clone)]
pub struct Coordinator {
    ctx: Arc<Context>,
}

impl Coordinator {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn from_shared(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    // ========================================================================
    // Handler boundary
    // ========================================================================

    /// Runs the handler for `event`, logging instead of returning failures.
    pub async fn dispatch_event(&self, event: BrowserEvent) {
        let kind = event.kind();
        if let Err(e) = self.handle_event(event).await {
            warn!(event = kind, error = %e, "Event handler failed");
        }
    }

    /// Runs the handler for `request`, logging failures.
    pub async fn dispatch_request(&self, request: Request) -> Result<(), CoordinatorError> {
        let kind = request.kind();
        let result = self.handle_request(request).await;
        if let Err(e) = &result {
            warn!(request = kind, error = %e, "Request handler failed");
        }
        result
    }

    /// Handles one native lifecycle event.
    pub async fn handle_event(&self, event: BrowserEvent) -> Result<(), BrowserError> {
        debug!(event = event.kind(), "Handling event");
        match event {
            BrowserEvent::TabUpdated { tab, url } => match url {
                Some(url) => self.tab_updated(tab, &url).await,
                None => Ok(()),
            },
            BrowserEvent::TabActivated { tab, .. } => self.tab_activated(tab).await,
            BrowserEvent::WindowFocusChanged { window } => match window {
                Some(window) => self.window_focus_changed(window).await,
                None => Ok(()),
            },
            BrowserEvent::TabRemoved { tab } => self.tab_removed(tab).await,
            BrowserEvent::WindowRemoved { window } => {
                self.window_removed(window);
                Ok(())
            }
        }
    }

    /// Handles one page request.
    pub async fn handle_request(&self, request: Request) -> Result<(), CoordinatorError> {
        debug!(request = request.kind(), "Handling request");
        let target = request.entity_id();
        match request {
            Request::Open { url, name, .. } => self.open(url, target, name).await?,
            Request::Close { rest, .. } => {
                if let Some(target) = target {
                    self.close(target, rest).await?;
                }
            }
            Request::Ping { target, interval } => self.ping(target, interval),
            Request::Update { prev_id, next_id } => self.update(&prev_id, &next_id),
            Request::Send { target, data } => self.send(&target, data).await?,
        }
        Ok(())
    }

    // ========================================================================
    // Events
    // ========================================================================

    async fn tab_updated(&self, tab: TabId, url: &str) -> Result<(), BrowserError> {
        let page = self.ctx.matcher().classify(url);

        if page.is_main_page {
            debug!(tab = %tab, "Main tab registered");
            self.ctx.set_main_tab(tab);
        }

        if let Some(customer_id) = page.customer() {
            self.register_customer(tab, customer_id);
        }

        if let Some((customer_id, action_id)) = page.action() {
            self.register_action(tab, customer_id, action_id).await?;
        }

        Ok(())
    }

    fn register_customer(&self, tab: TabId, customer_id: &str) {
        let mut registry = self.ctx.registry();
        if registry.customer(tab).is_some() {
            return;
        }

        let customer = Arc::new(Customer::new(customer_id, tab));
        registry.set(customer_id, tab, Entity::Customer(customer));
        info!(customer = customer_id, tab = %tab, "Customer registered");
    }

    async fn register_action(
        &self,
        tab: TabId,
        customer_id: &str,
        action_id: &str,
    ) -> Result<(), BrowserError> {
        let known = {
            let registry = self.ctx.registry();
            registry.customer(customer_id).is_some() && registry.action(tab).is_none()
        };
        if !known {
            return Ok(());
        }

        let info = self.ctx.tabs().get(tab).await?;

        // Re-resolve: the customer or tab may have changed while suspended
        let mut registry = self.ctx.registry();
        let Some(customer) = registry.customer(customer_id) else {
            debug!(customer = customer_id, tab = %tab, "Customer gone before action registered");
            return Ok(());
        };
        if registry.action(tab).is_some() {
            return Ok(());
        }
        if let Some(existing) = customer.find_action(action_id) {
            debug!(
                customer = customer_id,
                action = action_id,
                tab = %tab,
                registered = %existing.tab(),
                "Action already registered in another tab"
            );
            return Ok(());
        }

        let action = customer.register(action_id, info.window, tab);
        registry.set(action.composite_id(), tab, Entity::Action(Arc::clone(&action)));
        info!(
            customer = customer_id,
            action = action_id,
            window = %info.window,
            tab = %tab,
            "Action registered"
        );
        Ok(())
    }

    async fn tab_activated(&self, tab: TabId) -> Result<(), BrowserError> {
        let entity = self.ctx.registry().get(tab);
        match entity {
            None => Ok(()),
            Some(Entity::Customer(customer)) => customer.focus(&self.ctx).await,
            Some(Entity::Action(action)) => {
                if let Err(e) = action.focus(&self.ctx).await {
                    debug!(action = %action.composite_id(), error = %e, "Action focus failed");
                }
                let Some(owner) = action.customer() else {
                    return Ok(());
                };
                self.ctx
                    .tabs()
                    .send(owner.tab(), Notification::select(owner.id(), action.id()))
                    .await
            }
        }
    }

    async fn window_focus_changed(&self, window: WindowId) -> Result<(), BrowserError> {
        let active = match self.ctx.tabs().active_in(window).await {
            Ok(Some(active)) => active,
            Ok(None) | Err(BrowserError::WindowNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let customer = self.ctx.registry().customer(active.id);
        match customer {
            Some(customer) => customer.focus(&self.ctx).await,
            None => Ok(()),
        }
    }

    async fn tab_removed(&self, tab: TabId) -> Result<(), BrowserError> {
        if self.ctx.clear_main_tab(tab) {
            debug!(tab = %tab, "Main tab removed");
        }

        let entity = self.ctx.registry().get(tab);
        match entity {
            None => Ok(()),
            Some(Entity::Action(action)) => self.action_removed(tab, action).await,
            Some(Entity::Customer(customer)) => {
                self.customer_removed(customer).await;
                Ok(())
            }
        }
    }

    async fn action_removed(&self, tab: TabId, action: Arc<Action>) -> Result<(), BrowserError> {
        let entity = Entity::Action(Arc::clone(&action));
        let registered_id = self.ctx.registry().remove_entity(&entity);
        let id = registered_id.unwrap_or_else(|| action.composite_id());

        let owner = action.customer();
        if let Some(owner) = &owner {
            owner.deregister(tab);
        }
        info!(action = %id, tab = %tab, "Action removed");

        if let Err(e) = self.resync_action_window(owner.as_deref()).await {
            debug!(action = %id, error = %e, "Action window resync failed");
        }

        let Some(owner) = owner else {
            return Ok(());
        };

        let notification = Notification::closed(id.as_str(), action.take_metadata());
        if let Err(e) = self.ctx.tabs().send(owner.tab(), notification).await {
            // Customer tab closed in the same batch
            debug!(action = %id, error = %e, "Closed notification not delivered");
        }

        // The customer shared this tab and is gone with it
        if owner.tab() == tab {
            self.customer_removed(owner).await;
        }
        Ok(())
    }

    /// Minimizes the action window if it now shows another customer's action.
    async fn resync_action_window(&self, owner: Option<&Customer>) -> Result<(), BrowserError> {
        let Some(current) = self.ctx.action_window().current(self.ctx.tabs()).await? else {
            return Ok(());
        };

        let current_owner = self
            .ctx
            .registry()
            .action(current.id)
            .and_then(|action| action.customer());

        let other_customer = match (current_owner, owner) {
            (Some(current_owner), Some(owner)) => current_owner.id() != owner.id(),
            _ => false,
        };
        if other_customer {
            self.ctx.action_window().minimize(self.ctx.windows()).await?;
        }
        Ok(())
    }

    async fn customer_removed(&self, customer: Arc<Customer>) {
        let actions = customer.actions();
        if !actions.is_empty() {
            info!(
                customer = customer.id(),
                actions = actions.len(),
                "Closing actions of removed customer"
            );
        }
        for action in actions {
            if let Err(e) = action.close(&self.ctx, None).await {
                debug!(action = %action.composite_id(), error = %e, "Cascade close failed");
            }
        }

        let entity = Entity::Customer(Arc::clone(&customer));
        let mut registry = self.ctx.registry();
        if registry.remove_entity(&entity).is_none() {
            registry.remove_id(customer.id(), &entity);
        }
        info!(customer = customer.id(), tab = %customer.tab(), "Customer removed");
    }

    fn window_removed(&self, window: WindowId) {
        if self.ctx.action_window().clear_if(window) {
            info!(window = %window, "Action window closed");
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    async fn open(
        &self,
        url: Option<String>,
        target: Option<EntityId>,
        name: Option<String>,
    ) -> Result<(), BrowserError> {
        let Some(target) = target else {
            let Some(url) = url else {
                debug!("Open request without url or id");
                return Ok(());
            };
            let tab = self
                .ctx
                .action_window()
                .open(self.ctx.tabs(), self.ctx.windows(), &url)
                .await?;
            info!(tab = %tab.id, url = %url, "Opened external page");
            return Ok(());
        };

        let EntityId {
            customer_id,
            action_id,
        } = target;
        let customer = self.ctx.registry().customer(customer_id.as_str());
        let Some(customer) = customer else {
            debug!(customer = %customer_id, "Open for unknown customer");
            return Ok(());
        };

        customer
            .open(&self.ctx, url.as_deref(), action_id.as_deref(), name)
            .await?;
        Ok(())
    }

    async fn close(&self, target: EntityId, rest: Metadata) -> Result<(), BrowserError> {
        let EntityId {
            customer_id,
            action_id,
        } = target;
        let customer = self.ctx.registry().customer(customer_id.as_str());
        let Some(customer) = customer else {
            debug!(customer = %customer_id, "Close for unknown customer");
            return Ok(());
        };

        let action_tab = match action_id {
            Some(action_id) => match customer.find_action(&action_id) {
                Some(action) => Some(action.tab()),
                None => {
                    debug!(
                        customer = %customer_id,
                        action = %action_id,
                        "Close for unknown action"
                    );
                    return Ok(());
                }
            },
            None => None,
        };

        customer.close(&self.ctx, action_tab, Some(rest)).await
    }

    fn ping(&self, target: Option<String>, interval: Option<i64>) {
        match target {
            Some(target) => self
                .ctx
                .keepalive()
                .schedule(&target, interval.unwrap_or(0)),
            None => debug!("Ping acknowledged"),
        }
    }

    fn update(&self, prev_id: &str, next_id: &str) {
        if self.ctx.registry().rename(prev_id, next_id) {
            info!(prev = prev_id, next = next_id, "Id renamed");
        } else {
            debug!(prev = prev_id, "Rename of unknown id");
        }
    }

    async fn send(&self, target: &str, data: serde_json::Value) -> Result<(), CoordinatorError> {
        if target != MAIN_TARGET {
            return Err(CoordinatorError::UnimplementedTarget(target.to_string()));
        }

        let Some(main_tab) = self.ctx.main_tab() else {
            debug!("No main tab to relay to");
            return Ok(());
        };

        self.ctx
            .tabs()
            .send(main_tab, Notification::send(data))
            .await?;
        Ok(())
    }
}
