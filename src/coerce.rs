//! Normalizing heterogeneous input into addresses.
//!
//! [`AddressInput`] is the sum of everything a caller may hand over: nothing,
//! a raw string, a stored id, a structured payload or an existing address.
//! Conversion is an explicit match; structured data that cannot be resolved
//! degrades to a raw-only address instead of failing.

use crate::assembler::Assembler;
use crate::error::{Error, Result};
use crate::geocoder::Geocoder;
use crate::stats::IngestStats;
use crate::store::Store;
use crate::types::{Address, AddressId, GeocodePayload, Geometry, PayloadComponent, non_blank};
use serde_json::{Map, Value};

/// Longest accepted country code.
const MAX_COUNTRY_CODE_LEN: usize = 2;

/// Longest accepted state code.
const MAX_STATE_CODE_LEN: usize = 8;

/// Anything that can be turned into an [`Address`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AddressInput {
    /// No value
    #[default]
    None,
    /// Free-form address text
    Raw(String),
    /// Identity of a stored address
    Id(AddressId),
    /// Structured geocoder payload
    Payload(Box<GeocodePayload>),
    /// An address that is already assembled
    Existing(Address),
}

impl From<&str> for AddressInput {
    fn from(raw: &str) -> Self {
        AddressInput::Raw(raw.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(raw: String) -> Self {
        AddressInput::Raw(raw)
    }
}

impl From<AddressId> for AddressInput {
    fn from(id: AddressId) -> Self {
        AddressInput::Id(id)
    }
}

impl From<GeocodePayload> for AddressInput {
    fn from(payload: GeocodePayload) -> Self {
        AddressInput::Payload(Box::new(payload))
    }
}

impl From<Address> for AddressInput {
    fn from(address: Address) -> Self {
        AddressInput::Existing(address)
    }
}

impl<T: Into<AddressInput>> From<Option<T>> for AddressInput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl TryFrom<Value> for AddressInput {
    type Error = Error;

    /// `null` is no value, a string is raw text, a non-negative integer is an
    /// id, and an object is a payload: structured when it carries
    /// `address_components`, flat form fields otherwise.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(AddressInput::None),
            Value::String(raw) => Ok(AddressInput::Raw(raw)),
            Value::Number(number) => number
                .as_u64()
                .map(|id| AddressInput::Id(AddressId(id)))
                .ok_or_else(|| Error::invalid_value(format!("{number} is not an address id"))),
            Value::Object(fields) if fields.is_empty() => Ok(AddressInput::None),
            Value::Object(fields) if fields.contains_key("address_components") => {
                let payload: GeocodePayload = serde_json::from_value(Value::Object(fields))
                    .map_err(|e| Error::invalid_value(format!("Malformed address payload: {e}")))?;
                Ok(payload.into())
            }
            Value::Object(fields) => Ok(GeocodePayload::from_form_fields(&fields)?.into()),
            other => Err(Error::invalid_value(format!(
                "Cannot convert {other} to an address"
            ))),
        }
    }
}

impl GeocodePayload {
    /// Build a payload from the flat fields of an address form.
    ///
    /// Recognised keys are `raw`, `formatted`, `street_number`, `route`,
    /// `locality`, `postal_code`, `state`, `state_code`, `country`,
    /// `country_code`, `latitude` and `longitude`. A code equal to its name is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressValue`] for a coordinate that is not a
    /// number or a country or state code that is too long.
    pub fn from_form_fields(fields: &Map<String, Value>) -> Result<Self> {
        let get = |name: &str| form_field(fields, name);

        let state = get("state");
        let country = get("country");
        let state_code = code(get("state_code"), state.as_deref(), "state", MAX_STATE_CODE_LEN)?;
        let country_code = code(
            get("country_code"),
            country.as_deref(),
            "country",
            MAX_COUNTRY_CODE_LEN,
        )?;

        let mut components = Vec::new();
        push(&mut components, &["street_number"], get("street_number"), None);
        push(&mut components, &["route"], get("route"), None);
        push(&mut components, &["locality", "political"], get("locality"), None);
        push(&mut components, &["postal_code"], get("postal_code"), None);
        push(
            &mut components,
            &["administrative_area_level_1", "political"],
            state,
            state_code,
        );
        push(&mut components, &["country", "political"], country, country_code);

        let latitude = coordinate(fields, "latitude")?;
        let longitude = coordinate(fields, "longitude")?;
        let geometry = match (latitude, longitude) {
            (Some(lat), Some(lng)) => Some(Geometry::at(lat, lng)),
            _ => None,
        };

        Ok(GeocodePayload {
            raw: get("raw"),
            formatted_address: get("formatted"),
            address_components: components,
            geometry,
        })
    }
}

fn form_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => non_blank(Some(s.as_str())).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn push(
    components: &mut Vec<PayloadComponent>,
    types: &[&str],
    long_name: Option<String>,
    short_name: Option<String>,
) {
    if let Some(long_name) = long_name {
        components.push(PayloadComponent::new(
            types,
            long_name,
            short_name.unwrap_or_default(),
        ));
    }
}

/// A code equal to its name carries no information and is dropped.
fn code(
    value: Option<String>,
    name: Option<&str>,
    what: &str,
    max_len: usize,
) -> Result<Option<String>> {
    match value {
        Some(code) if Some(code.as_str()) == name => Ok(None),
        Some(code) if code.chars().count() > max_len => Err(Error::invalid_value(format!(
            "Invalid {what} code '{code}'"
        ))),
        other => Ok(other),
    }
}

fn coordinate(fields: &Map<String, Value>, name: &str) -> Result<Option<f64>> {
    let invalid = || Error::invalid_value(format!("Invalid value for {name}"));
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Resolves an [`AddressInput`] against the store, assembler and geocoder.
pub(crate) struct Coercion<'a, S: Store + ?Sized> {
    pub(crate) assembler: Assembler<'a, S>,
    pub(crate) store: &'a S,
    pub(crate) geocoder: Option<&'a dyn Geocoder>,
    pub(crate) stats: &'a IngestStats,
}

impl<S: Store + ?Sized> Coercion<'_, S> {
    pub(crate) fn to_address(
        &self,
        input: AddressInput,
        instance: Option<Address>,
    ) -> Result<Option<Address>> {
        match input {
            AddressInput::None => Ok(None),
            AddressInput::Existing(address) => Ok(Some(address)),
            AddressInput::Id(id) => self.store.address(id).map(Some),
            AddressInput::Raw(raw) => match non_blank(Some(raw.as_str())) {
                None => Ok(None),
                Some(raw) => self.from_raw(raw, instance).map(Some),
            },
            AddressInput::Payload(payload) if payload.is_empty() => Ok(None),
            AddressInput::Payload(payload) => self.from_payload(&payload, instance).map(Some),
        }
    }

    fn from_raw(&self, raw: &str, instance: Option<Address>) -> Result<Address> {
        let Some(geocoder) = self.geocoder else {
            return self.assembler.assemble_raw(raw, instance);
        };

        self.stats.record_lookup();
        match geocoder.geocode(raw) {
            Ok(Some(mut payload)) => {
                payload.raw = Some(raw.to_string());
                match self.assembler.assemble(&payload, instance.clone()) {
                    Err(Error::InconsistentInput { message }) => {
                        tracing::warn!("Geocoded '{}' is unusable: {}", raw, message);
                    }
                    other => return other,
                }
            }
            Ok(None) => tracing::debug!("No geocoding result for '{}'", raw),
            Err(e) => tracing::warn!("Geocoding '{}' failed: {}", raw, e),
        }

        self.stats.record_fallback();
        self.assembler.assemble_raw(raw, instance)
    }

    fn from_payload(&self, payload: &GeocodePayload, instance: Option<Address>) -> Result<Address> {
        match self.assembler.assemble(payload, instance.clone()) {
            Err(Error::InconsistentInput { message }) => {
                let Some(text) = payload.text() else {
                    return Err(Error::invalid_value(format!(
                        "Unusable address payload without raw or formatted text: {message}"
                    )));
                };
                tracing::warn!("Storing '{}' without components: {}", text, message);
                self.stats.record_fallback();
                self.assembler.assemble_raw(text, instance)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressConfig;
    use crate::kinds::KindRegistry;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    struct Fixture {
        registry: KindRegistry,
        store: MemoryStore,
        config: AddressConfig,
        stats: IngestStats,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: KindRegistry::standard(),
                store: MemoryStore::new(),
                config: AddressConfig::default(),
                stats: IngestStats::new(),
            }
        }

        fn coercion<'a>(&'a self, geocoder: Option<&'a dyn Geocoder>) -> Coercion<'a, MemoryStore> {
            Coercion {
                assembler: Assembler::new(&self.registry, &self.store, &self.config)
                    .with_stats(&self.stats),
                store: &self.store,
                geocoder,
                stats: &self.stats,
            }
        }
    }

    /// Geocoder answering from a fixed table.
    struct TableGeocoder(HashMap<String, GeocodePayload>);

    impl Geocoder for TableGeocoder {
        fn geocode(&self, query: &str) -> Result<Option<GeocodePayload>> {
            Ok(self.0.get(query).cloned())
        }
    }

    fn northcote() -> GeocodePayload {
        GeocodePayload {
            formatted_address: Some("Northcote VIC 3070, Australia".to_string()),
            address_components: vec![
                PayloadComponent::new(&["locality", "political"], "Northcote", "Northcote"),
                PayloadComponent::new(&["administrative_area_level_1"], "Victoria", "VIC"),
                PayloadComponent::new(&["country", "political"], "Australia", "AU"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_none_and_existing() {
        let fixture = Fixture::new();
        let coercion = fixture.coercion(None);

        assert_eq!(coercion.to_address(AddressInput::None, None).unwrap(), None);
        assert_eq!(coercion.to_address("".into(), None).unwrap(), None);
        assert_eq!(
            coercion
                .to_address(GeocodePayload::default().into(), None)
                .unwrap(),
            None
        );

        let stored = coercion.to_address("Somewhere".into(), None).unwrap().unwrap();
        let same = coercion
            .to_address(stored.clone().into(), None)
            .unwrap()
            .unwrap();
        assert_eq!(same, stored);
    }

    #[test]
    fn test_id_lookup() {
        let fixture = Fixture::new();
        let coercion = fixture.coercion(None);

        let stored = coercion.to_address("Somewhere".into(), None).unwrap().unwrap();
        let found = coercion.to_address(stored.id.into(), None).unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_matches!(
            coercion.to_address(AddressId(404).into(), None),
            Err(Error::NotFound { .. })
        );
    }

    #[test]
    fn test_raw_with_geocoder() {
        let fixture = Fixture::new();
        let geocoder = TableGeocoder(HashMap::from([("northcote".to_string(), northcote())]));
        let coercion = fixture.coercion(Some(&geocoder));

        let found = coercion.to_address("northcote".into(), None).unwrap().unwrap();
        assert_eq!(found.raw, "northcote");
        assert_eq!(found.formatted, "Northcote VIC 3070, Australia");
        assert!(!found.is_raw_only());

        let missing = coercion.to_address("nowhere".into(), None).unwrap().unwrap();
        assert!(missing.is_raw_only());
        assert_eq!(missing.latitude, None);

        let summary = fixture.stats.summary();
        assert_eq!(summary.geocode_lookups, 2);
        assert_eq!(summary.raw_fallbacks, 1);
    }

    #[test]
    fn test_geocoder_failure_degrades() {
        let fixture = Fixture::new();
        let failing = |_: &str| -> Result<Option<GeocodePayload>> { Err(Error::not_found("offline")) };
        let coercion = fixture.coercion(Some(&failing));

        let address = coercion.to_address("Somewhere".into(), None).unwrap().unwrap();
        assert!(address.is_raw_only());
        assert_eq!(address.raw, "Somewhere");
    }

    #[test]
    fn test_payload_without_country_degrades() {
        let fixture = Fixture::new();
        let coercion = fixture.coercion(None);

        let mut payload = northcote();
        payload.address_components.pop();
        let address = coercion.to_address(payload.into(), None).unwrap().unwrap();
        assert!(address.is_raw_only());
        assert_eq!(address.raw, "Northcote VIC 3070, Australia");

        let textless = GeocodePayload {
            address_components: vec![PayloadComponent::new(&["locality"], "Northcote", "")],
            ..Default::default()
        };
        assert_matches!(
            coercion.to_address(textless.into(), None),
            Err(Error::InvalidAddressValue { .. })
        );
    }

    #[test]
    fn test_try_from_json() {
        assert_eq!(AddressInput::try_from(json!(null)).unwrap(), AddressInput::None);
        assert_eq!(AddressInput::try_from(json!({})).unwrap(), AddressInput::None);
        assert_eq!(
            AddressInput::try_from(json!("1 Some St")).unwrap(),
            AddressInput::Raw("1 Some St".to_string())
        );
        assert_eq!(
            AddressInput::try_from(json!(7)).unwrap(),
            AddressInput::Id(AddressId(7))
        );
        assert_matches!(
            AddressInput::try_from(json!(-1)),
            Err(Error::InvalidAddressValue { .. })
        );
        assert_matches!(
            AddressInput::try_from(json!([1, 2])),
            Err(Error::InvalidAddressValue { .. })
        );
        assert_matches!(
            AddressInput::try_from(json!(true)),
            Err(Error::InvalidAddressValue { .. })
        );

        let structured = AddressInput::try_from(json!({
            "formatted_address": "Australia",
            "address_components": [
                {"types": ["country", "political"], "long_name": "Australia", "short_name": "AU"}
            ]
        }))
        .unwrap();
        assert_matches!(structured, AddressInput::Payload(p) if p.address_components.len() == 1);
    }

    #[test]
    fn test_form_fields() {
        let fields = json!({
            "raw": "1 Somewhere Street, Northcote, Victoria 3070, VIC, AU",
            "street_number": "1",
            "route": "Somewhere Street",
            "locality": "Northcote",
            "postal_code": "3070",
            "state": "Victoria",
            "state_code": "VIC",
            "country": "Australia",
            "country_code": "Australia",
            "latitude": "-37.7",
            "longitude": "",
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };

        let payload = GeocodePayload::from_form_fields(&fields).unwrap();
        assert_eq!(payload.address_components.len(), 6);
        let country = payload.address_components.last().unwrap();
        assert_eq!(country.long_name, "Australia");
        assert_eq!(country.short_name, "");
        assert_eq!(payload.address_components[4].short_name, "VIC");
        // Only one coordinate: no location.
        assert!(payload.geometry.is_none());
    }

    #[test]
    fn test_form_field_validation() {
        let invalid = |value: Value| {
            let Value::Object(fields) = value else {
                unreachable!()
            };
            GeocodePayload::from_form_fields(&fields)
        };

        assert_matches!(
            invalid(json!({"raw": "x", "latitude": "north"})),
            Err(Error::InvalidAddressValue { message }) if message == "Invalid value for latitude"
        );
        assert_matches!(
            invalid(json!({"raw": "x", "country": "Australia", "country_code": "Something else"})),
            Err(Error::InvalidAddressValue { .. })
        );
        assert_matches!(
            invalid(json!({"raw": "x", "state": "Victoria", "state_code": "Something"})),
            Err(Error::InvalidAddressValue { .. })
        );

        let payload = invalid(json!({"raw": "x", "latitude": -37.7, "longitude": 144.9})).unwrap();
        assert_eq!(payload.latitude(), Some(-37.7));
        assert_eq!(payload.longitude(), Some(144.9));
    }

    #[test]
    fn test_form_fields_end_to_end() {
        let fixture = Fixture::new();
        let coercion = fixture.coercion(None);

        let input = AddressInput::try_from(json!({
            "raw": "1 Somewhere Street, Northcote",
            "street_number": "1",
            "route": "Somewhere Street",
            "locality": "Northcote",
            "state": "Victoria",
            "country": "Australia",
        }))
        .unwrap();
        let address = coercion.to_address(input, None).unwrap().unwrap();
        assert!(!address.is_raw_only());
        assert_eq!(address.formatted, "1 Somewhere Street, Northcote");
        assert!(address.consistent);

        // No country: the raw text is kept.
        let input = AddressInput::try_from(json!({
            "raw": "1 Somewhere Street",
            "street_number": "1",
            "route": "Somewhere Street",
        }))
        .unwrap();
        let address = coercion.to_address(input, None).unwrap().unwrap();
        assert!(address.is_raw_only());
        assert_eq!(address.raw, "1 Somewhere Street");
    }
}
