//! Address component kinds and the containment table between them.
//!
//! Every kind is a single bit of a `u64`, so one component can carry several
//! kinds at once (Google tags a state as both `political` and
//! `administrative_area_level_1`). The [`KindRegistry`] maps provider tags to
//! bits and records, for each kind, which kinds may directly contain it.

use crate::error::{Error, Result};
use std::collections::HashMap;

bitflags::bitflags! {
    /// A set of address component kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[derive(serde::Serialize, serde::Deserialize)]
    pub struct Kind: u64 {
        /// A precise street address
        const STREET_ADDRESS = 1 << 0;
        /// A named route
        const ROUTE = 1 << 1;
        /// A major intersection
        const INTERSECTION = 1 << 2;
        /// A political entity
        const POLITICAL = 1 << 3;
        /// A national political entity
        const COUNTRY = 1 << 4;
        /// First-order civil entity below the country (state, province)
        const ADMIN_AREA_1 = 1 << 5;
        /// Second-order civil entity (county)
        const ADMIN_AREA_2 = 1 << 6;
        /// Third-order civil entity
        const ADMIN_AREA_3 = 1 << 7;
        /// Fourth-order civil entity
        const ADMIN_AREA_4 = 1 << 8;
        /// Fifth-order civil entity
        const ADMIN_AREA_5 = 1 << 9;
        /// A commonly-used alternative name for an entity
        const COLLOQUIAL_AREA = 1 << 10;
        /// An incorporated city or town
        const LOCALITY = 1 << 11;
        /// A ward (used in Japanese addresses)
        const WARD = 1 << 12;
        /// A first-order civil entity below a locality
        const SUBLOCALITY = 1 << 13;
        /// A named neighborhood
        const NEIGHBORHOOD = 1 << 14;
        /// A named location, usually a building
        const PREMISE = 1 << 15;
        /// A first-order entity below a named location
        const SUBPREMISE = 1 << 16;
        /// A postal code
        const POSTAL_CODE = 1 << 17;
        /// A prominent natural feature
        const NATURAL_FEATURE = 1 << 18;
        /// An airport
        const AIRPORT = 1 << 19;
        /// A named park
        const PARK = 1 << 20;
        /// A named point of interest
        const POINT_OF_INTEREST = 1 << 21;
        /// The floor of a building
        const FLOOR = 1 << 22;
        /// A business or other establishment
        const ESTABLISHMENT = 1 << 23;
        /// A parking lot or structure
        const PARKING = 1 << 24;
        /// A specific postal box
        const POST_BOX = 1 << 25;
        /// A grouping of geographic areas used for mailing addresses
        const POSTAL_TOWN = 1 << 26;
        /// The room of a building
        const ROOM = 1 << 27;
        /// The precise street number
        const STREET_NUMBER = 1 << 28;
        /// A bus stop
        const BUS_STATION = 1 << 29;
        /// A train stop
        const TRAIN_STATION = 1 << 30;
        /// A public transit stop
        const TRANSIT_STATION = 1 << 31;
    }
}

/// What to do with provider tags the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKindPolicy {
    /// Drop unknown tags (Google emits many tags we do not model)
    #[default]
    Ignore,
    /// Fail with [`Error::UnknownKind`]
    Fail,
}

const STANDARD_KEYS: &[(Kind, &str)] = &[
    (Kind::STREET_ADDRESS, "street_address"),
    (Kind::ROUTE, "route"),
    (Kind::INTERSECTION, "intersection"),
    (Kind::POLITICAL, "political"),
    (Kind::COUNTRY, "country"),
    (Kind::ADMIN_AREA_1, "administrative_area_level_1"),
    (Kind::ADMIN_AREA_2, "administrative_area_level_2"),
    (Kind::ADMIN_AREA_3, "administrative_area_level_3"),
    (Kind::ADMIN_AREA_4, "administrative_area_level_4"),
    (Kind::ADMIN_AREA_5, "administrative_area_level_5"),
    (Kind::COLLOQUIAL_AREA, "colloquial_area"),
    (Kind::LOCALITY, "locality"),
    (Kind::WARD, "ward"),
    (Kind::SUBLOCALITY, "sublocality"),
    (Kind::NEIGHBORHOOD, "neighborhood"),
    (Kind::PREMISE, "premise"),
    (Kind::SUBPREMISE, "subpremise"),
    (Kind::POSTAL_CODE, "postal_code"),
    (Kind::NATURAL_FEATURE, "natural_feature"),
    (Kind::AIRPORT, "airport"),
    (Kind::PARK, "park"),
    (Kind::POINT_OF_INTEREST, "point_of_interest"),
    (Kind::FLOOR, "floor"),
    (Kind::ESTABLISHMENT, "establishment"),
    (Kind::PARKING, "parking"),
    (Kind::POST_BOX, "post_box"),
    (Kind::POSTAL_TOWN, "postal_town"),
    (Kind::ROOM, "room"),
    (Kind::STREET_NUMBER, "street_number"),
    (Kind::BUS_STATION, "bus_station"),
    (Kind::TRAIN_STATION, "train_station"),
    (Kind::TRANSIT_STATION, "transit_station"),
];

// Direct containers of each kind, most specific first.
const STREET_PARENTS: &[Kind] = &[
    Kind::NEIGHBORHOOD,
    Kind::SUBLOCALITY,
    Kind::LOCALITY,
    Kind::POSTAL_TOWN,
];
const PLACE_PARENTS: &[Kind] = &[
    Kind::PREMISE,
    Kind::ROUTE,
    Kind::NEIGHBORHOOD,
    Kind::SUBLOCALITY,
    Kind::LOCALITY,
    Kind::POSTAL_TOWN,
];
const TOWN_PARENTS: &[Kind] = &[
    Kind::COLLOQUIAL_AREA,
    Kind::ADMIN_AREA_5,
    Kind::ADMIN_AREA_4,
    Kind::ADMIN_AREA_3,
    Kind::ADMIN_AREA_2,
    Kind::ADMIN_AREA_1,
];

const STANDARD_PARENTS: &[(Kind, &[Kind])] = &[
    (Kind::STREET_NUMBER, &[Kind::ROUTE]),
    (Kind::STREET_ADDRESS, STREET_PARENTS),
    (Kind::ROUTE, STREET_PARENTS),
    (Kind::INTERSECTION, STREET_PARENTS),
    (Kind::PREMISE, &[Kind::STREET_ADDRESS, Kind::ROUTE]),
    (Kind::SUBPREMISE, &[Kind::PREMISE, Kind::STREET_ADDRESS, Kind::ROUTE]),
    (Kind::FLOOR, &[Kind::SUBPREMISE, Kind::PREMISE, Kind::ESTABLISHMENT]),
    (Kind::ROOM, &[Kind::FLOOR, Kind::SUBPREMISE, Kind::PREMISE]),
    (Kind::POST_BOX, &[Kind::POSTAL_CODE, Kind::LOCALITY, Kind::POSTAL_TOWN]),
    (Kind::ESTABLISHMENT, PLACE_PARENTS),
    (Kind::POINT_OF_INTEREST, PLACE_PARENTS),
    (Kind::PARKING, PLACE_PARENTS),
    (Kind::BUS_STATION, PLACE_PARENTS),
    (Kind::TRAIN_STATION, PLACE_PARENTS),
    (Kind::TRANSIT_STATION, PLACE_PARENTS),
    (Kind::AIRPORT, PLACE_PARENTS),
    (Kind::PARK, PLACE_PARENTS),
    (
        Kind::NATURAL_FEATURE,
        &[Kind::LOCALITY, Kind::COLLOQUIAL_AREA, Kind::ADMIN_AREA_2, Kind::ADMIN_AREA_1],
    ),
    (Kind::NEIGHBORHOOD, &[Kind::SUBLOCALITY, Kind::WARD, Kind::LOCALITY, Kind::POSTAL_TOWN]),
    (Kind::SUBLOCALITY, &[Kind::WARD, Kind::LOCALITY, Kind::POSTAL_TOWN]),
    (Kind::WARD, &[Kind::LOCALITY]),
    (Kind::POSTAL_CODE, &[Kind::LOCALITY, Kind::POSTAL_TOWN, Kind::ADMIN_AREA_1]),
    (Kind::LOCALITY, TOWN_PARENTS),
    (Kind::POSTAL_TOWN, TOWN_PARENTS),
    (Kind::COLLOQUIAL_AREA, &[Kind::ADMIN_AREA_2, Kind::ADMIN_AREA_1]),
    (Kind::ADMIN_AREA_5, &[Kind::ADMIN_AREA_4]),
    (Kind::ADMIN_AREA_4, &[Kind::ADMIN_AREA_3]),
    (Kind::ADMIN_AREA_3, &[Kind::ADMIN_AREA_2]),
    (Kind::ADMIN_AREA_2, &[Kind::ADMIN_AREA_1]),
    (Kind::ADMIN_AREA_1, &[Kind::COUNTRY]),
];

#[derive(Debug, Clone)]
struct KindEntry {
    kind: Kind,
    key: String,
}

/// Immutable table of known kinds, their provider tags and containment rules.
///
/// Build it once with [`KindRegistry::standard`] (optionally extended with
/// [`KindRegistry::with_kind`]) and hand it to the hierarchy builder.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    entries: Vec<KindEntry>,
    by_key: HashMap<String, Kind>,
    parents: HashMap<Kind, Vec<Kind>>,
}

impl KindRegistry {
    /// The standard registry covering every Google address component type.
    pub fn standard() -> Self {
        let entries: Vec<KindEntry> = STANDARD_KEYS
            .iter()
            .map(|(kind, key)| KindEntry {
                kind: *kind,
                key: (*key).to_string(),
            })
            .collect();
        let by_key = entries.iter().map(|e| (e.key.clone(), e.kind)).collect();
        let parents = STANDARD_PARENTS
            .iter()
            .map(|(kind, parents)| (*kind, parents.to_vec()))
            .collect();

        Self {
            entries,
            by_key,
            parents,
        }
    }

    /// Register an extra kind on an unused bit.
    ///
    /// `parents` lists the kinds that may directly contain the new kind,
    /// most specific first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if `kind` is not exactly one bit, or if
    /// the bit or the key is already registered.
    pub fn with_kind(mut self, kind: Kind, key: impl Into<String>, parents: &[Kind]) -> Result<Self> {
        let key = key.into();
        if kind.bits().count_ones() != 1 {
            return Err(Error::config_error(format!(
                "kind for '{key}' must be a single bit, got {:#x}",
                kind.bits()
            )));
        }
        if self.entries.iter().any(|e| e.kind == kind) {
            return Err(Error::config_error(format!(
                "bit {:#x} is already registered",
                kind.bits()
            )));
        }
        if self.by_key.contains_key(&key) {
            return Err(Error::config_error(format!("kind key '{key}' is already registered")));
        }

        self.by_key.insert(key.clone(), kind);
        self.entries.push(KindEntry { kind, key });
        if !parents.is_empty() {
            self.parents.insert(kind, parents.to_vec());
        }
        Ok(self)
    }

    /// Map provider tags to a kind set, failing on the first unknown tag.
    pub fn kinds_for_keys<I, S>(&self, keys: I) -> Result<Kind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_keys(keys, UnknownKindPolicy::Fail)
    }

    /// Map provider tags to a kind set, handling unknown tags per `policy`.
    pub fn resolve_keys<I, S>(&self, keys: I, policy: UnknownKindPolicy) -> Result<Kind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kind = Kind::empty();
        for key in keys {
            let key = key.as_ref();
            match self.by_key.get(key) {
                Some(bit) => kind |= *bit,
                None => match policy {
                    UnknownKindPolicy::Fail => return Err(Error::unknown_kind(key)),
                    UnknownKindPolicy::Ignore => {
                        tracing::debug!("Ignoring unknown component kind '{}'", key);
                    }
                },
            }
        }
        Ok(kind)
    }

    /// Every tag whose bit is set in `kind`, in registry order.
    pub fn keys_for_kind(&self, kind: Kind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| kind.contains(e.kind))
            .map(|e| e.key.as_str())
            .collect()
    }

    /// The tag of a single-bit kind.
    pub fn key(&self, kind: Kind) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.key.as_str())
    }

    /// Split a kind set into its registered single bits, in registry order.
    pub fn bits(&self, kind: Kind) -> impl Iterator<Item = Kind> + '_ {
        self.entries
            .iter()
            .map(|e| e.kind)
            .filter(move |bit| kind.contains(*bit))
    }

    /// Kinds that may directly contain the single-bit `kind`, most specific first.
    pub fn parents(&self, kind: Kind) -> &[Kind] {
        self.parents.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every kind that may transitively contain any bit of `kind`.
    pub fn ancestors(&self, kind: Kind) -> Kind {
        let mut seen = Kind::empty();
        let mut frontier: Vec<Kind> = self.bits(kind).collect();
        while let Some(bit) = frontier.pop() {
            for parent in self.parents(bit) {
                if !seen.contains(*parent) {
                    seen |= *parent;
                    frontier.push(*parent);
                }
            }
        }
        seen
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
