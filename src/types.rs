//! Common types for address-rs: components, addresses and geocoder payloads.

use crate::kinds::Kind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identity of a stored [`Component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component #{}", self.0)
    }
}

/// Stable identity of a stored [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressId(pub u64);

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "address #{}", self.0)
    }
}

/// Deduplication key of a component: `(parent, kind, long_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    /// Containing component, `None` for countries
    pub parent: Option<ComponentId>,
    /// Full kind set of the component
    pub kind: Kind,
    /// Human-readable name
    pub long_name: String,
}

/// A stored, named fragment of an address.
///
/// `parent` points at the next broader region, so following it from a street
/// number ends at a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Identity assigned by the store
    pub id: ComponentId,
    /// Immediately containing component
    pub parent: Option<ComponentId>,
    /// Kinds carried by this component
    pub kind: Kind,
    /// Human-readable name (e.g. "Victoria")
    pub long_name: String,
    /// Abbreviated name (e.g. "VIC")
    pub short_name: String,
}

impl Component {
    /// The deduplication key of this component.
    pub fn key(&self) -> ComponentKey {
        ComponentKey {
            parent: self.parent,
            kind: self.kind,
            long_name: self.long_name.clone(),
        }
    }

    /// Whether this component carries every bit of `kind`.
    pub fn has_kind(&self, kind: Kind) -> bool {
        self.kind.contains(kind)
    }
}

/// A component that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComponent {
    /// Immediately containing component
    pub parent: Option<ComponentId>,
    /// Kinds carried by this component
    pub kind: Kind,
    /// Human-readable name
    pub long_name: String,
    /// Abbreviated name
    pub short_name: String,
}

impl NewComponent {
    /// The deduplication key this component would occupy.
    pub fn key(&self) -> ComponentKey {
        ComponentKey {
            parent: self.parent,
            kind: self.kind,
            long_name: self.long_name.clone(),
        }
    }
}

/// One entry of a geocoder's flat component list, with kinds resolved but no
/// parent information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentItem {
    /// Kinds carried by the entry
    pub kind: Kind,
    /// Human-readable name
    pub long_name: String,
    /// Abbreviated name
    pub short_name: String,
}

impl ComponentItem {
    /// Create a new item.
    pub fn new(kind: Kind, long_name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            kind,
            long_name: long_name.into(),
            short_name: short_name.into(),
        }
    }

    /// Whether neither name carries any text.
    pub fn is_nameless(&self) -> bool {
        self.long_name.trim().is_empty() && self.short_name.trim().is_empty()
    }
}

/// The externally visible address entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Identity assigned by the store
    pub id: AddressId,
    /// Original, unparsed address string
    pub raw: String,
    /// Canonical display string
    pub formatted: String,
    /// Most specific components; each one reaches the country through `parent`
    pub components: BTreeSet<ComponentId>,
    /// Latitude of the geocoded location
    pub latitude: Option<f64>,
    /// Longitude of the geocoded location
    pub longitude: Option<f64>,
    /// Longest parent chain among the components, counted in nodes
    pub height: usize,
    /// Whether every token of `raw` is accounted for by a component name
    pub consistent: bool,
}

impl Address {
    /// Whether no structured components are attached.
    pub fn is_raw_only(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.formatted.is_empty() {
            f.write_str(&self.raw)
        } else {
            f.write_str(&self.formatted)
        }
    }
}

/// An address that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewAddress {
    /// Original, unparsed address string
    pub raw: String,
    /// Canonical display string
    pub formatted: String,
    /// Most specific components
    pub components: BTreeSet<ComponentId>,
    /// Latitude of the geocoded location
    pub latitude: Option<f64>,
    /// Longitude of the geocoded location
    pub longitude: Option<f64>,
    /// Longest parent chain among the components
    pub height: usize,
    /// Consistency flag
    pub consistent: bool,
}

impl NewAddress {
    /// Attach a store identity.
    pub fn with_id(self, id: AddressId) -> Address {
        Address {
            id,
            raw: self.raw,
            formatted: self.formatted,
            components: self.components,
            latitude: self.latitude,
            longitude: self.longitude,
            height: self.height,
            consistent: self.consistent,
        }
    }
}

/// A geocoder result in the Google Geocoding API shape.
///
/// `raw` is not part of the provider response; callers set it to the string
/// the user typed so the stored address keeps it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeocodePayload {
    /// Original input string, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Provider's canonical rendering
    #[serde(default)]
    pub formatted_address: Option<String>,
    /// Flat list of tagged components
    #[serde(default)]
    pub address_components: Vec<PayloadComponent>,
    /// Geocoded location
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl GeocodePayload {
    /// Whether the payload carries neither text nor components nor location.
    pub fn is_empty(&self) -> bool {
        non_blank(self.raw.as_deref()).is_none()
            && non_blank(self.formatted_address.as_deref()).is_none()
            && self.address_components.is_empty()
            && self.geometry.is_none()
    }

    /// The raw text, falling back to the formatted address.
    pub fn text(&self) -> Option<&str> {
        non_blank(self.raw.as_deref()).or_else(|| non_blank(self.formatted_address.as_deref()))
    }

    /// The formatted address, if present.
    pub fn formatted(&self) -> Option<&str> {
        non_blank(self.formatted_address.as_deref())
    }

    /// Latitude of the location.
    pub fn latitude(&self) -> Option<f64> {
        self.geometry.as_ref().map(|g| g.location.lat)
    }

    /// Longitude of the location.
    pub fn longitude(&self) -> Option<f64> {
        self.geometry.as_ref().map(|g| g.location.lng)
    }
}

/// One provider component: `{types, long_name, short_name}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PayloadComponent {
    /// Provider kind tags
    #[serde(default)]
    pub types: Vec<String>,
    /// Human-readable name
    #[serde(default)]
    pub long_name: String,
    /// Abbreviated name
    #[serde(default)]
    pub short_name: String,
}

impl PayloadComponent {
    /// Create a new payload component.
    pub fn new(types: &[&str], long_name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            long_name: long_name.into(),
            short_name: short_name.into(),
        }
    }
}

/// `geometry` block of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Point location
    pub location: Location,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Geometry {
    /// Geometry at the given point.
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            location: Location { lat, lng },
        }
    }
}

/// Flat view of an address for display and form widgets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressSummary {
    /// Street number
    pub street_number: Option<String>,
    /// Route name
    pub route: Option<String>,
    /// Locality (or postal town) name
    pub locality: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// State name
    pub state: Option<String>,
    /// State abbreviation
    pub state_code: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// Country code
    pub country_code: Option<String>,
    /// Canonical display string
    pub formatted: Option<String>,
    /// Latitude
    pub latitude: Option<f64>,
    /// Longitude
    pub longitude: Option<f64>,
}

impl fmt::Display for AddressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let street = [self.street_number.as_deref(), self.route.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let parts: Vec<&str> = [Some(street.as_str()), self.locality.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        f.write_str(&parts.join(", "))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
