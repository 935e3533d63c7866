//! Tab/window registry.
//!
//! The registry indexes every live customer and action twice: by its
//! logical id (`"42"`, `"42:7"`) and by its native tab handle. It does not
//! own entity lifetimes; the coordinator inserts and removes entries as it
//! reacts to browser events.
//!
//! # Key policy
//!
//! ```text
//!   EntityKey::Id("42")    ─┐
//!                           ├──▶ Entity::Customer(Arc<Customer>)
//!   EntityKey::Tab(10)     ─┘
//! ```
//!
//! - `set` is last-write-wins per key.
//! - `delete` removes only keys that still point at the same entity, so a
//!   displaced entity never takes another entity's key with it.

use std::sync::Arc;

use serde::Serialize;

use tabsync_core::{TabId, WindowId};

use crate::entity::{Action, Customer};

mod tab_map;

pub use tab_map::TabMap;

/// Lookup key: a logical id or a native tab handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Id(String),
    Tab(TabId),
}

impl From<&str> for EntityKey {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<&String> for EntityKey {
    fn from(id: &String) -> Self {
        Self::Id(id.clone())
    }
}

impl From<TabId> for EntityKey {
    fn from(tab: TabId) -> Self {
        Self::Tab(tab)
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Tab(tab) => write!(f, "tab {tab}"),
        }
    }
}

/// A registered entity.
#[derive(Debug, Clone)]
pub enum Entity {
    Customer(Arc<Customer>),
    Action(Arc<Action>),
}

impl Entity {
    /// Native tab handle of the entity.
    pub fn tab(&self) -> TabId {
        match self {
            Self::Customer(customer) => customer.tab(),
            Self::Action(action) => action.tab(),
        }
    }

    /// Returns true if both values refer to the same entity.
    pub fn same(&self, other: &Entity) -> bool {
        match (self, other) {
            (Self::Customer(a), Self::Customer(b)) => Arc::ptr_eq(a, b),
            (Self::Action(a), Self::Action(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Action(_) => "action",
        }
    }
}

// ============================================================================
// Dump
// ============================================================================

/// Serializable snapshot of all registered customers and their actions.
pub type RegistryDump = Vec<CustomerDump>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerDump {
    pub id: String,
    pub tab: TabId,
    pub actions: Vec<ActionDump>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDump {
    pub id: String,
    pub window: WindowId,
    pub tab: TabId,
}
