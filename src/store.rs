//! Persistence of components and addresses.
//!
//! The [`Store`] trait is the seam to whatever database hosts the data. Both
//! dedup keys are uniqueness constraints of the store itself: an insert that
//! would duplicate `(parent, kind, long_name)` or `raw` fails with
//! [`Error::Conflict`], and the provided `find_or_insert_*` methods turn that
//! into a re-fetch so concurrent writers converge on one row.

use crate::error::{Error, Result};
use crate::types::{
    Address, AddressId, Component, ComponentId, ComponentKey, NewAddress, NewComponent,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// How a find-or-insert call obtained its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The row was inserted by this call
    Created,
    /// The row already existed
    Existing,
    /// Another writer inserted the row between our lookup and insert
    LostRace,
}

impl Origin {
    /// Whether this call inserted the row.
    pub fn is_created(self) -> bool {
        self == Origin::Created
    }
}

/// What a cascading component deletion removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deletion {
    /// Every removed component, the requested one first
    pub components: Vec<ComponentId>,
    /// Addresses that lost at least one root component
    pub addresses: Vec<AddressId>,
}

/// Storage backend for components and addresses.
pub trait Store: Send + Sync {
    /// Look up a component by its dedup key.
    fn find_component(&self, key: &ComponentKey) -> Result<Option<Component>>;

    /// Insert a component, failing with [`Error::Conflict`] if its key is taken.
    fn insert_component(&self, new: NewComponent) -> Result<Component>;

    /// Fetch a component by id.
    fn component(&self, id: ComponentId) -> Result<Component>;

    /// Components whose parent is `id`.
    fn children(&self, id: ComponentId) -> Result<Vec<Component>>;

    /// Delete a component together with every descendant.
    fn delete_component(&self, id: ComponentId) -> Result<Deletion>;

    /// Look up an address by its raw string.
    fn find_address(&self, raw: &str) -> Result<Option<Address>>;

    /// Insert an address, failing with [`Error::Conflict`] if `raw` is taken.
    fn insert_address(&self, new: NewAddress) -> Result<Address>;

    /// Fetch an address by id.
    fn address(&self, id: AddressId) -> Result<Address>;

    /// Overwrite a stored address.
    fn update_address(&self, address: &Address) -> Result<()>;

    /// Every stored address, ordered by id.
    fn addresses(&self) -> Result<Vec<Address>>;

    /// Find a component by key or insert it, resolving insert races.
    fn find_or_insert_component(&self, new: NewComponent) -> Result<(Component, Origin)> {
        let key = new.key();
        if let Some(existing) = self.find_component(&key)? {
            return Ok((existing, Origin::Existing));
        }
        match self.insert_component(new) {
            Ok(created) => Ok((created, Origin::Created)),
            Err(e) if e.is_conflict() => self
                .find_component(&key)?
                .map(|c| (c, Origin::LostRace))
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Find an address by raw string or insert it, resolving insert races.
    fn find_or_insert_address(&self, new: NewAddress) -> Result<(Address, Origin)> {
        if let Some(existing) = self.find_address(&new.raw)? {
            return Ok((existing, Origin::Existing));
        }
        let raw = new.raw.clone();
        match self.insert_address(new) {
            Ok(created) => Ok((created, Origin::Created)),
            Err(e) if e.is_conflict() => self
                .find_address(&raw)?
                .map(|a| (a, Origin::LostRace))
                .ok_or(e),
            Err(e) => Err(e),
        }
    }
}

/// Follow `parent` links from `id` up to the top of the chain.
///
/// The returned chain starts with `id` itself. A chain that loops back on
/// itself is cut at the first repeated node.
pub fn ancestors<S: Store + ?Sized>(store: &S, id: ComponentId) -> Result<Vec<Component>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id);

    while let Some(current) = next {
        if !seen.insert(current) {
            tracing::warn!("Component chain from {} loops at {}", id, current);
            break;
        }
        let component = store.component(current)?;
        next = component.parent;
        chain.push(component);
    }

    Ok(chain)
}

/// Number of nodes in the chain from `id` to its topmost ancestor.
pub fn depth<S: Store + ?Sized>(store: &S, id: ComponentId) -> Result<usize> {
    Ok(ancestors(store, id)?.len())
}

#[derive(Debug, Default)]
struct Inner {
    components: BTreeMap<ComponentId, Component>,
    component_keys: HashMap<ComponentKey, ComponentId>,
    children: HashMap<ComponentId, BTreeSet<ComponentId>>,
    addresses: BTreeMap<AddressId, Address>,
    raw_index: HashMap<String, AddressId>,
    next_component: u64,
    next_address: u64,
}

/// In-process [`Store`] backed by maps behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored components.
    pub fn component_count(&self) -> usize {
        self.inner.lock().components.len()
    }

    /// Number of stored addresses.
    pub fn address_count(&self) -> usize {
        self.inner.lock().addresses.len()
    }
}

impl Store for MemoryStore {
    fn find_component(&self, key: &ComponentKey) -> Result<Option<Component>> {
        let inner = self.inner.lock();
        Ok(inner
            .component_keys
            .get(key)
            .and_then(|id| inner.components.get(id))
            .cloned())
    }

    fn insert_component(&self, new: NewComponent) -> Result<Component> {
        let mut inner = self.inner.lock();
        let key = new.key();
        if let Some(id) = inner.component_keys.get(&key) {
            return Err(Error::conflict(format!(
                "component '{}' already stored as {}",
                key.long_name, id
            )));
        }
        if let Some(parent) = new.parent {
            if !inner.components.contains_key(&parent) {
                return Err(Error::not_found(format!("parent {parent} does not exist")));
            }
        }

        inner.next_component += 1;
        let id = ComponentId(inner.next_component);
        let component = Component {
            id,
            parent: new.parent,
            kind: new.kind,
            long_name: new.long_name,
            short_name: new.short_name,
        };
        if let Some(parent) = component.parent {
            inner.children.entry(parent).or_default().insert(id);
        }
        inner.component_keys.insert(key, id);
        inner.components.insert(id, component.clone());
        Ok(component)
    }

    fn component(&self, id: ComponentId) -> Result<Component> {
        self.inner
            .lock()
            .components
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{id} does not exist")))
    }

    fn children(&self, id: ComponentId) -> Result<Vec<Component>> {
        let inner = self.inner.lock();
        if !inner.components.contains_key(&id) {
            return Err(Error::not_found(format!("{id} does not exist")));
        }
        Ok(inner
            .children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| inner.components.get(child))
            .cloned()
            .collect())
    }

    fn delete_component(&self, id: ComponentId) -> Result<Deletion> {
        let mut inner = self.inner.lock();
        let parent = match inner.components.get(&id) {
            Some(target) => target.parent,
            None => return Err(Error::not_found(format!("{id} does not exist"))),
        };
        if let Some(parent) = parent {
            if let Some(siblings) = inner.children.get_mut(&parent) {
                siblings.remove(&id);
            }
        }

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(children) = inner.children.remove(&current) {
                pending.extend(children);
            }
            if let Some(component) = inner.components.remove(&current) {
                inner.component_keys.remove(&component.key());
                removed.push(current);
            }
        }

        let removed_set: HashSet<ComponentId> = removed.iter().copied().collect();
        let mut affected = Vec::new();
        for address in inner.addresses.values_mut() {
            let before = address.components.len();
            address.components.retain(|c| !removed_set.contains(c));
            if address.components.len() != before {
                affected.push(address.id);
            }
        }

        Ok(Deletion {
            components: removed,
            addresses: affected,
        })
    }

    fn find_address(&self, raw: &str) -> Result<Option<Address>> {
        let inner = self.inner.lock();
        Ok(inner
            .raw_index
            .get(raw)
            .and_then(|id| inner.addresses.get(id))
            .cloned())
    }

    fn insert_address(&self, new: NewAddress) -> Result<Address> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.raw_index.get(&new.raw) {
            return Err(Error::conflict(format!(
                "address '{}' already stored as {}",
                new.raw, id
            )));
        }

        inner.next_address += 1;
        let id = AddressId(inner.next_address);
        let address = new.with_id(id);
        inner.raw_index.insert(address.raw.clone(), id);
        inner.addresses.insert(id, address.clone());
        Ok(address)
    }

    fn address(&self, id: AddressId) -> Result<Address> {
        self.inner
            .lock()
            .addresses
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{id} does not exist")))
    }

    fn update_address(&self, address: &Address) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(old_raw) = inner.addresses.get(&address.id).map(|a| a.raw.clone()) else {
            return Err(Error::not_found(format!("{} does not exist", address.id)));
        };

        if old_raw != address.raw {
            if let Some(other) = inner.raw_index.get(&address.raw) {
                return Err(Error::conflict(format!(
                    "address '{}' already stored as {}",
                    address.raw, other
                )));
            }
            inner.raw_index.remove(&old_raw);
            inner.raw_index.insert(address.raw.clone(), address.id);
        }
        inner.addresses.insert(address.id, address.clone());
        Ok(())
    }

    fn addresses(&self) -> Result<Vec<Address>> {
        Ok(self.inner.lock().addresses.values().cloned().collect())
    }
}
