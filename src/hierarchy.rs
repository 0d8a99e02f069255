//! Reconstruction of a component hierarchy from a geocoder's flat list.
//!
//! Geocoders return address components as an unordered list of tagged names
//! with no containment information. [`HierarchyBuilder`] links each entry to
//! the broader region containing it, using the containment table of the
//! [`KindRegistry`], and stores the result with deduplication on
//! `(parent, kind, long_name)` so that "Australia" is one row no matter how
//! many addresses mention it.
//!
//! # Direction of links and "roots"
//!
//! `parent` points *up*, towards broader regions: a street number's parent is
//! its route, a route's parent its locality, and so on up to a country. The
//! components an address holds on to are the *most specific* entries, the ones
//! that are nobody's parent. They are called the roots of the address's
//! component set because every other component is reachable from them by
//! following `parent`. Geographically they are leaves.
//!
//! # Parent resolution
//!
//! For an entry that is not a country, the builder looks at the kinds the
//! entry carries and expands them one level at a time through the containment
//! table, skipping kinds already seen. The first expanded kind that some other
//! entry carries wins; within a level, candidates are tried in registry order
//! of the originating kind and then in the order the table lists parents. If
//! the expansion runs dry, the entry hangs directly off the country. When
//! several entries carry the country kind, the first one is the default parent
//! and the others stay parentless.
//!
//! # Example
//!
//! ```rust
//! use address_rs::{ComponentItem, HierarchyBuilder, Kind, KindRegistry, MemoryStore};
//!
//! let registry = KindRegistry::standard();
//! let store = MemoryStore::new();
//! let builder = HierarchyBuilder::new(&registry, &store);
//!
//! let roots = builder.build_hierarchy(&[
//!     ComponentItem::new(Kind::COUNTRY | Kind::POLITICAL, "Australia", "AU"),
//!     ComponentItem::new(Kind::ADMIN_AREA_1 | Kind::POLITICAL, "Victoria", "VIC"),
//!     ComponentItem::new(Kind::LOCALITY | Kind::POLITICAL, "Northcote", "Northcote"),
//! ])?;
//!
//! assert_eq!(roots.len(), 1);
//! assert_eq!(roots[0].long_name, "Northcote");
//! # Ok::<(), address_rs::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::kinds::{Kind, KindRegistry, UnknownKindPolicy};
use crate::stats::IngestStats;
use crate::store::Store;
use crate::types::{Component, ComponentId, ComponentItem, NewComponent, PayloadComponent};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Turn provider components into builder items.
///
/// Entries left with no recognised kind are skipped.
///
/// # Errors
///
/// Returns [`Error::UnknownKind`] for an unknown tag when `policy` is
/// [`UnknownKindPolicy::Fail`].
pub fn items_from_payload(
    registry: &KindRegistry,
    components: &[PayloadComponent],
    policy: UnknownKindPolicy,
) -> Result<Vec<ComponentItem>> {
    let mut items = Vec::with_capacity(components.len());
    for component in components {
        let kind = registry.resolve_keys(&component.types, policy)?;
        if kind.is_empty() {
            tracing::debug!(
                "Skipping component '{}' with no recognised kind ({:?})",
                component.long_name,
                component.types
            );
            continue;
        }
        items.push(ComponentItem::new(
            kind,
            component.long_name.trim(),
            component.short_name.trim(),
        ));
    }
    Ok(items)
}

/// Parent links between the items of one build, by item index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    parents: Vec<Option<usize>>,
    roots: Vec<usize>,
    country: usize,
}

impl Resolution {
    /// Index of the parent of item `index`.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Items that are nobody's parent, in input order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Index of the country every unplaced item falls back to.
    pub fn country(&self) -> usize {
        self.country
    }

    /// Number of nodes from item `index` to the top of its chain.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut next = Some(index);
        while let Some(current) = next {
            depth += 1;
            next = self.parent(current);
            if depth > self.parents.len() {
                break;
            }
        }
        depth
    }

    /// Longest chain among the roots.
    pub fn height(&self) -> usize {
        self.roots.iter().map(|r| self.depth(*r)).max().unwrap_or(0)
    }
}

/// Stored result of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    /// Most specific components, deduplicated, in input order
    pub roots: Vec<Component>,
    /// Every stored component, in input order
    pub components: Vec<Component>,
    /// Longest parent chain among the roots, in nodes
    pub height: usize,
}

/// Builds and stores component hierarchies.
#[derive(Debug)]
pub struct HierarchyBuilder<'a, S: Store + ?Sized> {
    registry: &'a KindRegistry,
    store: &'a S,
    stats: Option<&'a IngestStats>,
}

impl<'a, S: Store + ?Sized> HierarchyBuilder<'a, S> {
    /// Create a builder over a registry and a store.
    pub fn new(registry: &'a KindRegistry, store: &'a S) -> Self {
        Self {
            registry,
            store,
            stats: None,
        }
    }

    /// Report component creation and reuse to `stats`.
    pub fn with_stats(mut self, stats: &'a IngestStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Work out parent links without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentInput`] if an item has no name or no item
    /// carries the country kind.
    pub fn resolve(&self, items: &[ComponentItem]) -> Result<Resolution> {
        if let Some(index) = items.iter().position(ComponentItem::is_nameless) {
            return Err(Error::inconsistent_input(format!(
                "component {index} has neither a long nor a short name"
            )));
        }
        let country = items
            .iter()
            .position(|item| item.kind.contains(Kind::COUNTRY))
            .ok_or_else(|| Error::inconsistent_input("no country component"))?;

        let mut table: HashMap<Kind, Vec<usize>> = HashMap::new();
        for (index, item) in items.iter().enumerate() {
            for bit in self.registry.bits(item.kind) {
                table.entry(bit).or_default().push(index);
            }
        }

        let mut parents: Vec<Option<usize>> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                if item.kind.contains(Kind::COUNTRY) {
                    None
                } else {
                    Some(self.find_parent(items, &table, index).unwrap_or(country))
                }
            })
            .collect();

        break_cycles(&mut parents, country);

        let referenced: HashSet<usize> = parents.iter().flatten().copied().collect();
        let roots = (0..items.len())
            .filter(|index| !referenced.contains(index))
            .collect();

        Ok(Resolution {
            parents,
            roots,
            country,
        })
    }

    fn find_parent(
        &self,
        items: &[ComponentItem],
        table: &HashMap<Kind, Vec<usize>>,
        index: usize,
    ) -> Option<usize> {
        let own = items[index].kind;
        let mut tried = own;
        let mut frontier: Vec<Kind> = self.registry.bits(own - Kind::COUNTRY).collect();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for bit in &frontier {
                for parent in self.registry.parents(*bit) {
                    if !tried.contains(*parent) {
                        tried |= *parent;
                        next.push(*parent);
                    }
                }
            }

            for candidate in &next {
                let found = table
                    .get(candidate)
                    .and_then(|holders| holders.iter().copied().find(|&h| h != index));
                if let Some(parent) = found {
                    return Some(parent);
                }
            }
            frontier = next;
        }
        None
    }

    /// Resolve, deduplicate and store `items`, returning the full result.
    ///
    /// Parents are stored before their children so that each child's dedup
    /// key can name its parent's identity.
    pub fn build(&self, items: &[ComponentItem]) -> Result<Hierarchy> {
        let started = Instant::now();
        let resolution = self.resolve(items)?;

        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by_key(|index| resolution.depth(*index));

        let mut stored: Vec<Option<Component>> = vec![None; items.len()];
        for index in order {
            let item = &items[index];
            let parent = match resolution.parent(index) {
                Some(p) => Some(stored_id(&stored, p)?),
                None => None,
            };
            let long_name = if item.long_name.trim().is_empty() {
                item.short_name.trim()
            } else {
                item.long_name.trim()
            };

            let (component, origin) = self.store.find_or_insert_component(NewComponent {
                parent,
                kind: item.kind,
                long_name: long_name.to_string(),
                short_name: item.short_name.trim().to_string(),
            })?;
            tracing::debug!(
                "{:?} component '{}' as {} (parent {:?})",
                origin,
                component.long_name,
                component.id,
                component.parent
            );
            if let Some(stats) = self.stats {
                stats.record_component(origin);
            }
            stored[index] = Some(component);
        }

        let components: Vec<Component> = stored.into_iter().flatten().collect();
        let mut seen = HashSet::new();
        let roots = resolution
            .roots()
            .iter()
            .map(|r| components[*r].clone())
            .filter(|c| seen.insert(c.id))
            .collect();

        if let Some(stats) = self.stats {
            stats.record_build(started.elapsed());
        }

        Ok(Hierarchy {
            roots,
            components,
            height: resolution.height(),
        })
    }

    /// Resolve, deduplicate and store `items`, returning the most specific
    /// components.
    pub fn build_hierarchy(&self, items: &[ComponentItem]) -> Result<Vec<Component>> {
        Ok(self.build(items)?.roots)
    }
}

fn stored_id(stored: &[Option<Component>], index: usize) -> Result<ComponentId> {
    stored
        .get(index)
        .and_then(|c| c.as_ref())
        .map(|c| c.id)
        .ok_or_else(|| Error::inconsistent_input(format!("parent {index} was not stored first")))
}

/// Re-point any item caught in a parent cycle at the country.
///
/// The containment table is acyclic, but an item carrying several kinds can
/// still end up above and below another item.
fn break_cycles(parents: &mut [Option<usize>], country: usize) {
    for start in 0..parents.len() {
        let mut on_path = HashSet::from([start]);
        let mut current = start;
        while let Some(next) = parents[current] {
            if !on_path.insert(next) {
                tracing::warn!(
                    "Component {} closes a parent cycle; attaching it to the country",
                    current
                );
                parents[current] = Some(country);
                break;
            }
            current = next;
        }
    }
}
