//! Turning geocoder payloads into stored addresses.

use crate::config::AddressConfig;
use crate::consistency;
use crate::error::{Error, Result};
use crate::hierarchy::{HierarchyBuilder, items_from_payload};
use crate::kinds::{Kind, KindRegistry};
use crate::stats::IngestStats;
use crate::store::{Origin, Store, ancestors};
use crate::types::{Address, AddressSummary, Component, ComponentId, GeocodePayload, NewAddress};
use std::collections::{BTreeSet, HashSet};

/// Assembles [`Address`] rows from structured payloads or raw strings.
///
/// New addresses are found or created by their `raw` string. A row that
/// already exists is returned as stored: a second ingestion under the same
/// raw string never replaces its components. Pass the row as `instance` to
/// re-assemble it in place instead.
#[derive(Debug)]
pub struct Assembler<'a, S: Store + ?Sized> {
    registry: &'a KindRegistry,
    store: &'a S,
    config: &'a AddressConfig,
    stats: Option<&'a IngestStats>,
}

impl<'a, S: Store + ?Sized> Assembler<'a, S> {
    /// Create an assembler.
    pub fn new(registry: &'a KindRegistry, store: &'a S, config: &'a AddressConfig) -> Self {
        Self {
            registry,
            store,
            config,
            stats: None,
        }
    }

    /// Report ingestion counters to `stats`.
    pub fn with_stats(mut self, stats: &'a IngestStats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn builder(&self) -> HierarchyBuilder<'a, S> {
        let builder = HierarchyBuilder::new(self.registry, self.store);
        match self.stats {
            Some(stats) => builder.with_stats(stats),
            None => builder,
        }
    }

    /// Build the component hierarchy of `payload` and store the address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentInput`] if the payload has no text, no
    /// country component, or a nameless component, and [`Error::UnknownKind`]
    /// under the failing unknown-kind policy. Store errors are propagated.
    pub fn assemble(&self, payload: &GeocodePayload, instance: Option<Address>) -> Result<Address> {
        let raw = payload
            .text()
            .ok_or_else(|| Error::inconsistent_input("payload has neither raw nor formatted_address"))?
            .to_string();

        let items =
            items_from_payload(self.registry, &payload.address_components, self.config.unknown_kinds)?;
        let hierarchy = self.builder().build(&items)?;

        let consistent = consistency::is_consistent(&raw, &hierarchy.components);
        if !consistent {
            tracing::debug!(
                "'{}' has unaccounted tokens {:?}",
                raw,
                consistency::unaccounted_tokens(&raw, &hierarchy.components)
            );
        }
        let formatted = match payload.formatted() {
            Some(formatted) => formatted.to_string(),
            None => synthesize_formatted(&hierarchy.components, &raw),
        };
        let components: BTreeSet<ComponentId> = hierarchy.roots.iter().map(|c| c.id).collect();

        match instance {
            Some(mut address) => {
                address.raw = raw;
                address.formatted = formatted;
                address.components = components;
                address.latitude = payload.latitude();
                address.longitude = payload.longitude();
                address.height = hierarchy.height;
                address.consistent = consistent;
                self.store.update_address(&address)?;
                if let Some(stats) = self.stats {
                    stats.record_update();
                }
                tracing::info!("Re-assembled {} as '{}'", address.id, address.formatted);
                Ok(address)
            }
            None => self.find_or_insert(NewAddress {
                raw,
                formatted,
                components,
                latitude: payload.latitude(),
                longitude: payload.longitude(),
                height: hierarchy.height,
                consistent,
            }),
        }
    }

    /// Store an address with only its raw text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressValue`] if `raw` is blank or raw-only
    /// addresses are disabled in the configuration.
    pub fn assemble_raw(&self, raw: &str, instance: Option<Address>) -> Result<Address> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::invalid_value("an address needs a non-empty raw value"));
        }
        if !self.config.allow_dummy_addresses {
            return Err(Error::invalid_value(format!(
                "'{raw}' could not be resolved and raw-only addresses are disabled"
            )));
        }
        let none: [Component; 0] = [];
        let consistent = consistency::is_consistent(raw, &none);

        match instance {
            Some(mut address) => {
                address.raw = raw.to_string();
                address.formatted = raw.to_string();
                address.components.clear();
                address.latitude = None;
                address.longitude = None;
                address.height = 0;
                address.consistent = consistent;
                self.store.update_address(&address)?;
                if let Some(stats) = self.stats {
                    stats.record_update();
                }
                Ok(address)
            }
            None => self.find_or_insert(NewAddress {
                raw: raw.to_string(),
                formatted: raw.to_string(),
                consistent,
                ..Default::default()
            }),
        }
    }

    fn find_or_insert(&self, new: NewAddress) -> Result<Address> {
        let (address, origin) = self.store.find_or_insert_address(new)?;
        if let Some(stats) = self.stats {
            stats.record_address(origin);
        }
        match origin {
            Origin::Created => tracing::info!("Created {} for '{}'", address.id, address.raw),
            Origin::Existing | Origin::LostRace => {
                tracing::debug!("'{}' is already stored as {}", address.raw, address.id)
            }
        }
        Ok(address)
    }
}

/// Every component of `address`: its roots first, then their ancestors.
///
/// Shared ancestors appear once.
pub fn component_chain<S: Store + ?Sized>(store: &S, address: &Address) -> Result<Vec<Component>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    for root in &address.components {
        let component = store.component(*root)?;
        if seen.insert(component.id) {
            chain.push(component);
        }
    }
    for root in &address.components {
        for component in ancestors(store, *root)?.into_iter().skip(1) {
            if seen.insert(component.id) {
                chain.push(component);
            }
        }
    }
    Ok(chain)
}

/// Flat view of `address` built from its component chain.
pub fn summary<S: Store + ?Sized>(store: &S, address: &Address) -> Result<AddressSummary> {
    let chain = component_chain(store, address)?;
    let mut summary = summarize(&chain);
    summary.formatted = Some(address.formatted.clone()).filter(|f| !f.is_empty());
    summary.latitude = address.latitude;
    summary.longitude = address.longitude;
    Ok(summary)
}

fn summarize(components: &[Component]) -> AddressSummary {
    let first = |kind: Kind| components.iter().find(|c| c.has_kind(kind));
    let long = |kind: Kind| first(kind).map(|c| c.long_name.clone());
    let short = |kind: Kind| {
        first(kind)
            .map(|c| c.short_name.clone())
            .filter(|s| !s.is_empty())
    };

    AddressSummary {
        street_number: long(Kind::STREET_NUMBER),
        route: long(Kind::ROUTE),
        locality: long(Kind::LOCALITY).or_else(|| long(Kind::POSTAL_TOWN)),
        postal_code: long(Kind::POSTAL_CODE),
        state: long(Kind::ADMIN_AREA_1),
        state_code: short(Kind::ADMIN_AREA_1),
        country: long(Kind::COUNTRY),
        country_code: short(Kind::COUNTRY),
        ..Default::default()
    }
}

fn synthesize_formatted(components: &[Component], raw: &str) -> String {
    let rendered = summarize(components).to_string();
    if rendered.is_empty() {
        raw.to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Geometry, PayloadComponent};
    use assert_matches::assert_matches;

    fn payload(raw: &str, locality: &str, postcode: &str) -> GeocodePayload {
        GeocodePayload {
            raw: Some(raw.to_string()),
            formatted_address: Some(format!("{locality} VIC {postcode}, Australia")),
            address_components: vec![
                PayloadComponent::new(&["locality", "political"], locality, locality),
                PayloadComponent::new(
                    &["administrative_area_level_1", "political"],
                    "Victoria",
                    "VIC",
                ),
                PayloadComponent::new(&["country", "political"], "Australia", "AU"),
                PayloadComponent::new(&["postal_code"], postcode, postcode),
            ],
            geometry: Some(Geometry::at(-37.77, 144.99)),
        }
    }

    #[test]
    fn test_assemble_new_address() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let address = assembler
            .assemble(&payload("Northcote VIC 3070", "Northcote", "3070"), None)
            .unwrap();
        assert_eq!(address.raw, "Northcote VIC 3070");
        assert_eq!(address.formatted, "Northcote VIC 3070, Australia");
        assert_eq!(address.latitude, Some(-37.77));
        assert_eq!(address.longitude, Some(144.99));
        assert!(address.consistent);
        // The postcode sits below the locality and is the only root.
        assert_eq!(address.components.len(), 1);
        assert_eq!(address.height, 4);
        assert_eq!(store.address_count(), 1);
    }

    #[test]
    fn test_shared_components_are_the_same_rows() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let first = assembler
            .assemble(&payload("Northcote VIC 3070", "Northcote", "3070"), None)
            .unwrap();
        let second = assembler
            .assemble(&payload("Fitzroy VIC 3065", "Fitzroy", "3065"), None)
            .unwrap();

        let top = |address: &Address| {
            let chain = component_chain(&store, address).unwrap();
            let state = chain.iter().find(|c| c.has_kind(Kind::ADMIN_AREA_1)).unwrap().id;
            let country = chain.iter().find(|c| c.has_kind(Kind::COUNTRY)).unwrap().id;
            (state, country)
        };
        assert_eq!(top(&first), top(&second));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_reingest_keeps_the_first_row() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let stats = IngestStats::new();
        let assembler = Assembler::new(&registry, &store, &config).with_stats(&stats);

        let first = assembler
            .assemble(&payload("Northcote VIC 3070", "Northcote", "3070"), None)
            .unwrap();
        // Same raw, different structure: the stored row wins.
        let second = assembler
            .assemble(&payload("Northcote VIC 3070", "Fitzroy", "3065"), None)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.components, second.components);
        assert_eq!(store.address_count(), 1);

        let summary = stats.summary();
        assert_eq!(summary.addresses_created, 1);
        assert_eq!(summary.addresses_reused, 1);
    }

    #[test]
    fn test_instance_is_updated_in_place() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let stub = assembler.assemble_raw("Northcote", None).unwrap();
        assert!(stub.is_raw_only());

        let updated = assembler
            .assemble(&payload("Northcote", "Northcote", "3070"), Some(stub.clone()))
            .unwrap();
        assert_eq!(updated.id, stub.id);
        assert!(!updated.is_raw_only());
        assert_eq!(store.address(stub.id).unwrap(), updated);
        assert_eq!(store.address_count(), 1);
    }

    #[test]
    fn test_formatted_is_synthesized() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let address = assembler
            .assemble(
                &GeocodePayload {
                    raw: Some("2 Smith St Northcote".to_string()),
                    address_components: vec![
                        PayloadComponent::new(&["street_number"], "2", "2"),
                        PayloadComponent::new(&["route"], "Smith St", "Smith St"),
                        PayloadComponent::new(&["locality", "political"], "Northcote", "Northcote"),
                        PayloadComponent::new(&["country", "political"], "Australia", "AU"),
                    ],
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(address.formatted, "2 Smith St, Northcote");

        let bare = assembler
            .assemble(
                &GeocodePayload {
                    raw: Some("Australia".to_string()),
                    address_components: vec![PayloadComponent::new(&["country"], "Australia", "AU")],
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(bare.formatted, "Australia");
    }

    #[test]
    fn test_assemble_without_country_is_inconsistent() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let mut no_country = payload("Northcote", "Northcote", "3070");
        no_country.address_components.retain(|c| c.long_name != "Australia");
        assert_matches!(
            assembler.assemble(&no_country, None),
            Err(Error::InconsistentInput { .. })
        );
        assert_matches!(
            assembler.assemble(&GeocodePayload::default(), None),
            Err(Error::InconsistentInput { .. })
        );
        assert_eq!(store.address_count(), 0);
    }

    #[test]
    fn test_assemble_raw() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let address = assembler.assemble_raw("  Somewhere  ", None).unwrap();
        assert_eq!(address.raw, "Somewhere");
        assert_eq!(address.formatted, "Somewhere");
        assert_eq!(address.height, 0);
        assert!(!address.consistent);
        assert_eq!(assembler.assemble_raw("Somewhere", None).unwrap().id, address.id);
        assert_matches!(assembler.assemble_raw(" ", None), Err(Error::InvalidAddressValue { .. }));

        let strict = AddressConfig::builder().allow_dummy_addresses(false).build();
        let assembler = Assembler::new(&registry, &store, &strict);
        assert_matches!(
            assembler.assemble_raw("Elsewhere", None),
            Err(Error::InvalidAddressValue { .. })
        );
    }

    #[test]
    fn test_summary() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let address = assembler
            .assemble(&payload("Northcote VIC 3070", "Northcote", "3070"), None)
            .unwrap();
        let flat = summary(&store, &address).unwrap();
        assert_eq!(flat.locality.as_deref(), Some("Northcote"));
        assert_eq!(flat.postal_code.as_deref(), Some("3070"));
        assert_eq!(flat.state.as_deref(), Some("Victoria"));
        assert_eq!(flat.state_code.as_deref(), Some("VIC"));
        assert_eq!(flat.country_code.as_deref(), Some("AU"));
        assert_eq!(flat.street_number, None);
        assert_eq!(flat.latitude, Some(-37.77));

        let chain = component_chain(&store, &address).unwrap();
        assert_eq!(chain.len(), 4);
    }
}
