//! # address-rs
//!
//! Postal address storage built from geocoder results.
//!
//! Geocoders describe an address as a flat list of tagged components
//! ("Northcote" is a `locality`, "VIC" the short name of an
//! `administrative_area_level_1`). This library links those components into a
//! containment hierarchy, stores each one once, and attaches the most specific
//! ones to an [`Address`] keyed on the text the user typed.
//!
//! ## Features
//!
//! - **Hierarchy reconstruction**: parent links inferred from a kind containment table
//! - **Deduplication**: one row per `(parent, kind, long_name)` and per raw string
//! - **Consistency flag**: token-level check that components explain the raw text
//! - **Flexible input**: raw strings, ids, structured payloads or form fields
//! - **Pluggable geocoding**: any [`Geocoder`], with a Google client behind the `google` feature
//! - **Thread Safe**: find-or-create races resolve to a single row
//!
//! ## Quick Start
//!
//! ```rust
//! use address_rs::{AddressBook, GeocodePayload, PayloadComponent};
//!
//! let book = AddressBook::new();
//!
//! let payload = GeocodePayload {
//!     raw: Some("Northcote VIC".to_string()),
//!     address_components: vec![
//!         PayloadComponent::new(&["locality", "political"], "Northcote", "Northcote"),
//!         PayloadComponent::new(&["administrative_area_level_1", "political"], "Victoria", "VIC"),
//!         PayloadComponent::new(&["country", "political"], "Australia", "AU"),
//!     ],
//!     ..Default::default()
//! };
//!
//! let address = book.to_address(payload, None)?.expect("payload is not empty");
//! assert_eq!(address.formatted, "Northcote");
//! assert!(address.consistent);
//! # Ok::<(), address_rs::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod assembler;
pub mod coerce;
pub mod config;
pub mod consistency;
pub mod error;
pub mod geocoder;
pub mod hierarchy;
pub mod kinds;
pub mod maintenance;
pub mod stats;
pub mod store;
pub mod types;

// Re-export main API
pub use assembler::Assembler;
pub use coerce::AddressInput;
pub use config::{AddressConfig, AddressConfigBuilder, GeocoderConfig};
pub use consistency::{is_consistent, unaccounted_tokens};
pub use error::{Error, Result};
pub use geocoder::Geocoder;
#[cfg(feature = "google")]
pub use geocoder::GoogleGeocoder;
pub use hierarchy::{Hierarchy, HierarchyBuilder, Resolution, items_from_payload};
pub use kinds::{Kind, KindRegistry, UnknownKindPolicy};
pub use maintenance::{ConsistencyReport, LookupReport};
pub use stats::{IngestStats, StatsSummary};
pub use store::{Deletion, MemoryStore, Origin, Store};
pub use types::*;

use coerce::Coercion;

/// Main entry point for address ingestion.
///
/// An `AddressBook` owns the kind registry, the store, the configuration and
/// an optional geocoder, and exposes every operation on them.
///
/// # Examples
///
/// ```rust
/// use address_rs::{AddressBook, AddressInput};
///
/// let book = AddressBook::new();
///
/// // Without a geocoder a string is stored as-is.
/// let first = book.to_address("1 Some Street", None)?.unwrap();
/// let second = book.to_address("1 Some Street", None)?.unwrap();
/// assert_eq!(first.id, second.id);
///
/// assert_eq!(book.to_address(AddressInput::None, None)?, None);
/// # Ok::<(), address_rs::Error>(())
/// ```
pub struct AddressBook<S: Store = MemoryStore> {
    registry: KindRegistry,
    store: S,
    config: AddressConfig,
    geocoder: Option<Box<dyn Geocoder>>,
    stats: IngestStats,
}

impl AddressBook<MemoryStore> {
    /// Create an address book over an in-memory store with default
    /// configuration and no geocoder.
    pub fn new() -> Self {
        Self {
            registry: KindRegistry::standard(),
            store: MemoryStore::new(),
            config: AddressConfig::default(),
            geocoder: None,
            stats: IngestStats::new(),
        }
    }

    /// Create an address book over an in-memory store.
    ///
    /// # Arguments
    ///
    /// * `config` - Ingestion and geocoder configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a Google API key is configured but the client
    /// cannot be built.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use address_rs::{AddressBook, AddressConfig};
    ///
    /// let config = AddressConfig::builder()
    ///     .allow_dummy_addresses(false)
    ///     .build();
    ///
    /// let book = AddressBook::with_config(config)?;
    /// assert!(book.to_address("Somewhere", None).is_err());
    /// # Ok::<(), address_rs::Error>(())
    /// ```
    pub fn with_config(config: AddressConfig) -> Result<Self> {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl Default for AddressBook<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> AddressBook<S> {
    /// Create an address book over any [`Store`].
    ///
    /// With the `google` feature, a configured API key installs a
    /// [`GoogleGeocoder`].
    pub fn with_store(store: S, config: AddressConfig) -> Result<Self> {
        #[cfg(feature = "google")]
        let geocoder: Option<Box<dyn Geocoder>> = match &config.geocoder.api_key {
            Some(_) => Some(Box::new(GoogleGeocoder::new(config.geocoder.clone())?)),
            None => None,
        };
        #[cfg(not(feature = "google"))]
        let geocoder: Option<Box<dyn Geocoder>> = None;

        Ok(Self {
            registry: KindRegistry::standard(),
            store,
            config,
            geocoder,
            stats: IngestStats::new(),
        })
    }

    /// Replace the kind registry.
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the geocoder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use address_rs::{AddressBook, GeocodePayload, Result};
    ///
    /// let book = AddressBook::new()
    ///     .with_geocoder(|_: &str| -> Result<Option<GeocodePayload>> { Ok(None) });
    ///
    /// // No result: the raw text is kept on its own.
    /// let address = book.to_address("Nowhere", None)?.unwrap();
    /// assert!(address.is_raw_only());
    /// # Ok::<(), address_rs::Error>(())
    /// ```
    pub fn with_geocoder(mut self, geocoder: impl Geocoder + 'static) -> Self {
        self.geocoder = Some(Box::new(geocoder));
        self
    }

    fn assembler(&self) -> Assembler<'_, S> {
        Assembler::new(&self.registry, &self.store, &self.config).with_stats(&self.stats)
    }

    fn coercion(&self) -> Coercion<'_, S> {
        Coercion {
            assembler: self.assembler(),
            store: &self.store,
            geocoder: self.geocoder.as_deref(),
            stats: &self.stats,
        }
    }

    /// Convert any supported input into an address.
    ///
    /// Returns `Ok(None)` for empty input. An existing [`Address`] is
    /// returned unchanged and an [`AddressId`] is looked up. A string goes
    /// through the geocoder when one is configured; a payload is assembled
    /// directly. Either falls back to a raw-only address when no structured
    /// result can be stored. `instance`, if given, is updated in place
    /// instead of finding or creating a row.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown id
    /// - [`Error::InvalidAddressValue`] for a payload without any text, or a
    ///   raw-only result while those are disabled
    /// - [`Error::UnknownKind`] under the failing unknown-kind policy
    pub fn to_address(
        &self,
        input: impl Into<AddressInput>,
        instance: Option<Address>,
    ) -> Result<Option<Address>> {
        self.coercion().to_address(input.into(), instance)
    }

    /// Assemble a structured payload without any fallback.
    pub fn assemble(&self, payload: &GeocodePayload, instance: Option<Address>) -> Result<Address> {
        self.assembler().assemble(payload, instance)
    }

    /// Link and store `items`, returning the most specific components.
    pub fn build_hierarchy(&self, items: &[ComponentItem]) -> Result<Vec<Component>> {
        HierarchyBuilder::new(&self.registry, &self.store)
            .with_stats(&self.stats)
            .build_hierarchy(items)
    }

    /// Every component of `address`, most specific first.
    pub fn component_chain(&self, address: &Address) -> Result<Vec<Component>> {
        assembler::component_chain(&self.store, address)
    }

    /// Flat view of `address`.
    pub fn summary(&self, address: &Address) -> Result<AddressSummary> {
        assembler::summary(&self.store, address)
    }

    /// Convert each input in turn.
    ///
    /// Each input gets its own result; one failure does not stop the batch.
    pub fn ingest_batch<I, T>(&self, inputs: I) -> Vec<Result<Option<Address>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<AddressInput>,
    {
        inputs
            .into_iter()
            .map(|input| self.to_address(input, None))
            .collect()
    }

    /// Convert inputs in parallel.
    ///
    /// Results are in input order. Inputs naming the same address or sharing
    /// components converge on the same rows.
    #[cfg(feature = "parallel")]
    pub fn ingest_batch_parallel<T>(&self, inputs: Vec<T>) -> Vec<Result<Option<Address>>>
    where
        T: Into<AddressInput> + Send,
    {
        use rayon::prelude::*;

        inputs
            .into_par_iter()
            .map(|input| self.to_address(input, None))
            .collect()
    }

    /// Recompute the consistency flag of every stored address.
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        maintenance::check_consistency(&self.store)
    }

    /// Geocode every address that has no components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if no geocoder is configured.
    pub fn lookup_addresses(&self) -> Result<LookupReport> {
        let geocoder = self
            .geocoder
            .as_deref()
            .ok_or_else(|| Error::config_error("Looking up addresses requires a geocoder"))?;
        maintenance::lookup_addresses(&self.assembler(), &self.store, geocoder, &self.stats)
    }

    /// Delete a component with its descendants and refresh affected addresses.
    pub fn delete_component(&self, id: ComponentId) -> Result<Deletion> {
        maintenance::delete_component(&self.store, id)
    }

    /// Ingestion counters.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Get the configuration used by this instance.
    pub fn config(&self) -> &AddressConfig {
        &self.config
    }

    /// The kind registry in use.
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configured geocoder, if any.
    pub fn geocoder(&self) -> Option<&dyn Geocoder> {
        self.geocoder.as_deref()
    }
}

impl<S: Store + std::fmt::Debug> std::fmt::Debug for AddressBook<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("config", &self.config)
            .field("geocoder", &self.geocoder.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
