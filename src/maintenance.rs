//! Bulk operations over every stored address.

use crate::assembler::{Assembler, component_chain};
use crate::consistency;
use crate::error::{Error, Result};
use crate::geocoder::Geocoder;
use crate::stats::IngestStats;
use crate::store::{Deletion, Store, depth};
use crate::types::{Address, AddressId, ComponentId};

/// Outcome of a consistency pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Addresses examined
    pub checked: usize,
    /// Addresses whose flag flipped
    pub changed: usize,
    /// Addresses flagged inconsistent after the pass
    pub inconsistent: Vec<AddressId>,
}

/// Outcome of a lookup pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupReport {
    /// Raw-only addresses sent to the geocoder
    pub looked_up: usize,
    /// Addresses that now have components
    pub resolved: Vec<AddressId>,
    /// Addresses the geocoder had no usable result for
    pub unresolved: Vec<AddressId>,
    /// Addresses whose lookup or re-assembly failed, with the failure
    pub failed: Vec<(AddressId, String)>,
}

/// Recompute and store the consistency flag of every address.
pub fn check_consistency<S: Store + ?Sized>(store: &S) -> Result<ConsistencyReport> {
    let mut report = ConsistencyReport::default();
    for mut address in store.addresses()? {
        report.checked += 1;
        let chain = component_chain(store, &address)?;
        let consistent = consistency::is_consistent(&address.raw, &chain);
        if consistent != address.consistent {
            address.consistent = consistent;
            store.update_address(&address)?;
            report.changed += 1;
        }
        if !consistent {
            report.inconsistent.push(address.id);
        }
    }
    tracing::info!(
        "Checked {} addresses: {} changed, {} inconsistent",
        report.checked,
        report.changed,
        report.inconsistent.len()
    );
    Ok(report)
}

/// Geocode every address without components and re-assemble it in place.
///
/// The query is the address's formatted text, or its raw text when that is
/// blank. The raw text of each row is kept.
pub fn lookup_addresses<S: Store + ?Sized>(
    assembler: &Assembler<'_, S>,
    store: &S,
    geocoder: &dyn Geocoder,
    stats: &IngestStats,
) -> Result<LookupReport> {
    let mut report = LookupReport::default();
    for address in store.addresses()?.into_iter().filter(Address::is_raw_only) {
        let query = if address.formatted.trim().is_empty() {
            address.raw.clone()
        } else {
            address.formatted.clone()
        };
        let id = address.id;
        report.looked_up += 1;
        stats.record_lookup();

        match geocoder.geocode(&query) {
            Ok(Some(mut payload)) => {
                payload.raw = Some(address.raw.clone());
                match assembler.assemble(&payload, Some(address)) {
                    Ok(_) => report.resolved.push(id),
                    Err(Error::InconsistentInput { message }) => {
                        tracing::warn!("Result for '{}' is unusable: {}", query, message);
                        report.unresolved.push(id);
                    }
                    Err(e) => {
                        tracing::warn!("Assembling '{}' failed: {}", query, e);
                        report.failed.push((id, e.to_string()));
                    }
                }
            }
            Ok(None) => report.unresolved.push(id),
            Err(e) => {
                tracing::warn!("Lookup of '{}' failed: {}", query, e);
                report.failed.push((id, e.to_string()));
            }
        }
    }
    tracing::info!(
        "Looked up {} addresses: {} resolved, {} unresolved, {} failed",
        report.looked_up,
        report.resolved.len(),
        report.unresolved.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Recompute the height and consistency of `address` from its components.
pub fn refresh_address<S: Store + ?Sized>(store: &S, mut address: Address) -> Result<Address> {
    let mut height = 0;
    for root in &address.components {
        height = height.max(depth(store, *root)?);
    }
    let chain = component_chain(store, &address)?;
    address.height = height;
    address.consistent = consistency::is_consistent(&address.raw, &chain);
    store.update_address(&address)?;
    Ok(address)
}

/// Delete a component and its descendants, then refresh every address that
/// lost a component.
pub fn delete_component<S: Store + ?Sized>(store: &S, id: ComponentId) -> Result<Deletion> {
    let deletion = store.delete_component(id)?;
    for address in &deletion.addresses {
        let refreshed = refresh_address(store, store.address(*address)?)?;
        tracing::debug!(
            "Refreshed {} after deleting {}: height {}",
            refreshed.id,
            id,
            refreshed.height
        );
    }
    tracing::info!(
        "Deleted {} components, {} addresses affected",
        deletion.components.len(),
        deletion.addresses.len()
    );
    Ok(deletion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressConfig;
    use crate::kinds::{Kind, KindRegistry, UnknownKindPolicy};
    use crate::store::MemoryStore;
    use crate::types::{GeocodePayload, PayloadComponent};

    fn victoria(locality: &str) -> GeocodePayload {
        GeocodePayload {
            formatted_address: Some(format!("{locality}, Victoria, Australia")),
            address_components: vec![
                PayloadComponent::new(&["locality", "political"], locality, locality),
                PayloadComponent::new(&["administrative_area_level_1"], "Victoria", "VIC"),
                PayloadComponent::new(&["country", "political"], "Australia", "AU"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_check_consistency_updates_flags() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let good = assembler.assemble(&victoria("Northcote"), None).unwrap();
        let raw_only = assembler.assemble_raw("Nowhere", None).unwrap();
        assert!(good.consistent);

        // Tamper with a stored flag.
        let mut tampered = store.address(good.id).unwrap();
        tampered.consistent = false;
        store.update_address(&tampered).unwrap();

        let report = check_consistency(&store).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.changed, 1);
        assert_eq!(report.inconsistent, vec![raw_only.id]);
        assert!(store.address(good.id).unwrap().consistent);
    }

    #[test]
    fn test_lookup_addresses() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let stats = IngestStats::new();
        let assembler = Assembler::new(&registry, &store, &config);

        let northcote = assembler.assemble_raw("Northcote", None).unwrap();
        let nowhere = assembler.assemble_raw("Nowhere", None).unwrap();
        let broken = assembler.assemble_raw("Broken", None).unwrap();
        let geocoder = |query: &str| -> Result<Option<GeocodePayload>> {
            match query {
                "Northcote" => Ok(Some(victoria("Northcote"))),
                "Broken" => Err(Error::not_found("service unavailable")),
                _ => Ok(None),
            }
        };

        let report = lookup_addresses(&assembler, &store, &geocoder, &stats).unwrap();
        assert_eq!(report.looked_up, 3);
        assert_eq!(report.resolved, vec![northcote.id]);
        assert_eq!(report.unresolved, vec![nowhere.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, broken.id);

        let resolved = store.address(northcote.id).unwrap();
        assert_eq!(resolved.raw, "Northcote");
        assert_eq!(resolved.formatted, "Northcote, Victoria, Australia");
        assert_eq!(resolved.height, 3);
        assert_eq!(store.address_count(), 3);
        assert_eq!(stats.summary().geocode_lookups, 3);

        // Nothing left to resolve except the misses.
        let again = lookup_addresses(&assembler, &store, &geocoder, &stats).unwrap();
        assert_eq!(again.looked_up, 2);
    }

    #[test]
    fn test_lookup_continues_past_assembly_errors() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::builder()
            .unknown_kinds(UnknownKindPolicy::Fail)
            .build();
        let stats = IngestStats::new();
        let assembler = Assembler::new(&registry, &store, &config);

        let tagged = assembler.assemble_raw("Tagged", None).unwrap();
        let northcote = assembler.assemble_raw("Northcote", None).unwrap();
        let geocoder = |query: &str| -> Result<Option<GeocodePayload>> {
            let mut payload = victoria(query);
            if query == "Tagged" {
                payload
                    .address_components
                    .push(PayloadComponent::new(&["plus_code"], "4RJ8+2M", "4RJ8+2M"));
            }
            Ok(Some(payload))
        };

        let report = lookup_addresses(&assembler, &store, &geocoder, &stats).unwrap();
        assert_eq!(report.looked_up, 2);
        assert_eq!(report.resolved, vec![northcote.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, tagged.id);
        assert!(report.failed[0].1.contains("plus_code"));

        assert!(store.address(tagged.id).unwrap().is_raw_only());
        assert!(!store.address(northcote.id).unwrap().is_raw_only());
    }

    #[test]
    fn test_delete_component_refreshes_addresses() {
        let registry = KindRegistry::standard();
        let store = MemoryStore::new();
        let config = AddressConfig::default();
        let assembler = Assembler::new(&registry, &store, &config);

        let northcote = assembler.assemble(&victoria("Northcote"), None).unwrap();
        let chain = component_chain(&store, &northcote).unwrap();
        let state = chain.iter().find(|c| c.has_kind(Kind::ADMIN_AREA_1)).unwrap();

        let deletion = delete_component(&store, state.id).unwrap();
        assert_eq!(deletion.components.len(), 2);
        assert_eq!(deletion.addresses, vec![northcote.id]);

        let refreshed = store.address(northcote.id).unwrap();
        assert!(refreshed.is_raw_only());
        assert_eq!(refreshed.height, 0);
        assert!(!refreshed.consistent);
    }
}
