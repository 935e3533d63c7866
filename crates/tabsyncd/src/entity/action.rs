//! Action entity - one tab in the action window.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use tabsync_core::{encode, TabId, WindowId};
use tabsync_protocol::Metadata;

use super::Customer;
use crate::browser::{BrowserError, WindowUpdate};
use crate::context::Context;

/// A secondary-window tab owned by a customer.
#[derive(Debug)]
pub struct Action {
    id: String,
    customer: Weak<Customer>,
    window: WindowId,
    tab: TabId,
    name: Option<String>,
    /// Attached at close time, echoed on the `closed` notification
    metadata: Mutex<Option<Metadata>>,
}

impl Action {
    pub(crate) fn new(
        id: impl Into<String>,
        customer: Weak<Customer>,
        window: WindowId,
        tab: TabId,
        name: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            customer,
            window,
            tab,
            name,
            metadata: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Human-readable tab name given when the action was opened.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The owning customer, if it is still alive.
    pub fn customer(&self) -> Option<Arc<Customer>> {
        self.customer.upgrade()
    }

    /// Returns true if this action is owned by `customer`.
    pub fn belongs_to(&self, customer: &Customer) -> bool {
        self.customer
            .upgrade()
            .is_some_and(|owner| std::ptr::eq(Arc::as_ptr(&owner), customer))
    }

    /// Composite id (`customerId:actionId`), or the bare action id if the
    /// customer is gone.
    pub fn composite_id(&self) -> String {
        match self.customer() {
            Some(customer) => encode(customer.id(), Some(&self.id)),
            None => self.id.clone(),
        }
    }

    /// Attaches close metadata. `None` keeps whatever is already attached.
    pub fn attach_metadata(&self, metadata: Option<Metadata>) {
        if let Some(metadata) = metadata {
            *self.metadata.lock() = Some(metadata);
        }
    }

    /// Takes the attached metadata, leaving none behind.
    pub fn take_metadata(&self) -> Option<Metadata> {
        self.metadata.lock().take()
    }

    /// Activates the customer's tab, then focuses this action's window.
    pub async fn focus(&self, ctx: &Context) -> Result<(), BrowserError> {
        if let Some(customer) = self.customer() {
            ctx.tabs().activate(customer.tab()).await?;
        }
        ctx.windows().update(self.window, WindowUpdate::focus()).await
    }

    /// Requests removal of this action's tab.
    ///
    /// Registry and customer cleanup happen when the browser reports the tab
    /// as removed, which also covers tabs the user closes directly.
    pub async fn close(
        &self,
        ctx: &Context,
        metadata: Option<Metadata>,
    ) -> Result<(), BrowserError> {
        self.attach_metadata(metadata);
        debug!(action = %self.composite_id(), tab = %self.tab, "Closing action");
        ctx.tabs().remove(&[self.tab]).await
    }
}
