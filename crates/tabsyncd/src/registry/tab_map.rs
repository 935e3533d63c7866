//! The bidirectional id/tab map.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tabsync_core::TabId;

use super::{ActionDump, CustomerDump, Entity, EntityKey, RegistryDump};
use crate::entity::{Action, Customer};

/// Bidirectional map from logical id and tab handle to entity.
///
/// The tab-side entry also remembers the logical id the entity was
/// registered under, so deleting by tab removes the right id key even after
/// a rename.
#[derive(Debug, Default)]
pub struct TabMap {
    ids: HashMap<String, Entity>,
    tabs: HashMap<TabId, (String, Entity)>,
}

impl TabMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity under its logical id and tab handle.
    ///
    /// Existing entries under either key are overwritten.
    pub fn set(&mut self, id: impl Into<String>, tab: TabId, entity: Entity) {
        let id = id.into();
        debug!(id = %id, tab = %tab, kind = entity.kind(), "Tab registered");
        self.ids.insert(id.clone(), entity.clone());
        self.tabs.insert(tab, (id, entity));
    }

    /// Looks up an entity by id or tab.
    pub fn get(&self, key: impl Into<EntityKey>) -> Option<Entity> {
        match key.into() {
            EntityKey::Id(id) => self.ids.get(&id).cloned(),
            EntityKey::Tab(tab) => self.tabs.get(&tab).map(|(_, entity)| entity.clone()),
        }
    }

    /// Looks up a customer. Absent if the key names an action.
    pub fn customer(&self, key: impl Into<EntityKey>) -> Option<Arc<Customer>> {
        match self.get(key) {
            Some(Entity::Customer(customer)) => Some(customer),
            _ => None,
        }
    }

    /// Looks up an action. Absent if the key names a customer.
    pub fn action(&self, key: impl Into<EntityKey>) -> Option<Arc<Action>> {
        match self.get(key) {
            Some(Entity::Action(action)) => Some(action),
            _ => None,
        }
    }

    pub fn has(&self, key: impl Into<EntityKey>) -> bool {
        match key.into() {
            EntityKey::Id(id) => self.ids.contains_key(&id),
            EntityKey::Tab(tab) => self.tabs.contains_key(&tab),
        }
    }

    /// Returns true if `customer` is still registered under its tab.
    pub fn holds_customer(&self, customer: &Arc<Customer>) -> bool {
        self.customer(customer.tab())
            .is_some_and(|registered| Arc::ptr_eq(&registered, customer))
    }

    /// Removes the entity found under `key` from both of its keys.
    ///
    /// Returns the logical id it was registered under together with the
    /// entity. No-op for unknown keys.
    pub fn delete(&mut self, key: impl Into<EntityKey>) -> Option<(String, Entity)> {
        let key = key.into();
        let entity = self.get(key.clone())?;

        let removed = self.remove_entity(&entity);
        let lookup_id = match key {
            EntityKey::Id(id) => {
                // Lookup key may differ from the tab-side id after overwrites
                if self.ids.get(&id).is_some_and(|e| e.same(&entity)) {
                    self.ids.remove(&id);
                }
                Some(id)
            }
            EntityKey::Tab(_) => None,
        };

        let id = removed.or(lookup_id)?;
        Some((id, entity))
    }

    /// Removes whichever keys still point at `entity`.
    ///
    /// Returns the logical id recorded for its tab, if that entry was still
    /// its own.
    pub fn remove_entity(&mut self, entity: &Entity) -> Option<String> {
        let tab = entity.tab();
        let owns_tab = self
            .tabs
            .get(&tab)
            .is_some_and(|(_, registered)| registered.same(entity));
        let id = if owns_tab {
            self.tabs.remove(&tab).map(|(id, _)| id)
        } else {
            None
        };

        if let Some(id) = &id {
            if self.ids.get(id).is_some_and(|e| e.same(entity)) {
                self.ids.remove(id);
            }
        }

        debug!(
            id = id.as_deref().unwrap_or("-"),
            tab = %tab,
            kind = entity.kind(),
            "Tab deregistered"
        );
        id
    }

    /// Removes the id key if it still points at `entity`.
    ///
    /// Used for entities whose tab key was taken over by another entity.
    pub fn remove_id(&mut self, id: &str, entity: &Entity) -> bool {
        if self.ids.get(id).is_some_and(|e| e.same(entity)) {
            self.ids.remove(id);
            debug!(id, kind = entity.kind(), "Displaced id deregistered");
            true
        } else {
            false
        }
    }

    /// Moves a logical id to a new name, keeping the tab key.
    ///
    /// Returns false if `prev` is not registered.
    pub fn rename(&mut self, prev: &str, next: &str) -> bool {
        let Some(entity) = self.ids.remove(prev) else {
            return false;
        };

        if let Some((id, registered)) = self.tabs.get_mut(&entity.tab()) {
            if registered.same(&entity) {
                *id = next.to_string();
            }
        }

        debug!(prev, next, kind = entity.kind(), "Tab id renamed");
        self.ids.insert(next.to_string(), entity);
        true
    }

    /// Registered customers, one per tab.
    pub fn customers(&self) -> Vec<Arc<Customer>> {
        self.tabs
            .values()
            .filter_map(|(_, entity)| match entity {
                Entity::Customer(customer) => Some(Arc::clone(customer)),
                Entity::Action(_) => None,
            })
            .collect()
    }

    /// Registered actions, one per tab.
    pub fn actions(&self) -> Vec<Arc<Action>> {
        self.tabs
            .values()
            .filter_map(|(_, entity)| match entity {
                Entity::Action(action) => Some(Arc::clone(action)),
                Entity::Customer(_) => None,
            })
            .collect()
    }

    /// Number of registered tab handles.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// True when neither ids nor tabs are registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.tabs.is_empty()
    }

    /// Snapshot of every customer with its actions, ordered by tab.
    pub fn dump(&self) -> RegistryDump {
        let mut customers = self.customers();
        customers.sort_by_key(|customer| customer.tab());

        customers
            .iter()
            .map(|customer| CustomerDump {
                id: customer.id().to_string(),
                tab: customer.tab(),
                actions: customer
                    .actions()
                    .iter()
                    .map(|action| ActionDump {
                        id: action.id().to_string(),
                        window: action.window(),
                        tab: action.tab(),
                    })
                    .collect(),
            })
            .collect()
    }
}
