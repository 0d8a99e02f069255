//! Geocoding collaborators.
//!
//! The core never talks to the network itself; it asks a [`Geocoder`] for a
//! structured payload and treats "no result" as a normal outcome. With the
//! `google` feature, [`GoogleGeocoder`] calls the Google Geocoding API.

use crate::error::Result;
use crate::types::GeocodePayload;

/// Looks up a free-form address string.
pub trait Geocoder: Send + Sync {
    /// Geocode `query`, returning `Ok(None)` when nothing matches.
    fn geocode(&self, query: &str) -> Result<Option<GeocodePayload>>;
}

impl<F> Geocoder for F
where
    F: Fn(&str) -> Result<Option<GeocodePayload>> + Send + Sync,
{
    fn geocode(&self, query: &str) -> Result<Option<GeocodePayload>> {
        self(query)
    }
}

#[cfg(feature = "google")]
pub use google::GoogleGeocoder;

#[cfg(feature = "google")]
mod google {
    use super::Geocoder;
    use crate::config::GeocoderConfig;
    use crate::error::{Error, Result};
    use crate::types::GeocodePayload;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    pub(super) struct GeocodeResponse {
        pub(super) status: String,
        #[serde(default)]
        pub(super) results: Vec<GeocodePayload>,
        #[serde(default)]
        pub(super) error_message: Option<String>,
    }

    impl GeocodeResponse {
        pub(super) fn into_payload(self) -> Result<Option<GeocodePayload>> {
            match self.status.as_str() {
                "OK" => Ok(self.results.into_iter().next()),
                "ZERO_RESULTS" => Ok(None),
                status => Err(Error::geocoding_error(match self.error_message {
                    Some(message) => format!("{status}: {message}"),
                    None => status.to_string(),
                })),
            }
        }
    }

    /// Client for the Google Geocoding JSON API.
    #[derive(Debug, Clone)]
    pub struct GoogleGeocoder {
        client: reqwest::blocking::Client,
        config: GeocoderConfig,
        api_key: String,
    }

    impl GoogleGeocoder {
        /// Create a client from the geocoder configuration.
        ///
        /// # Errors
        ///
        /// Returns [`Error::ConfigError`] if no API key is configured, or
        /// [`Error::GeocodingError`] if the HTTP client cannot be built.
        pub fn new(config: GeocoderConfig) -> Result<Self> {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    Error::config_error(
                        "A Google API key is required: set geocoder.api_key or GOOGLE_API_KEY",
                    )
                })?;
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .map_err(|e| Error::geocoding_error(format!("Failed to build HTTP client: {e}")))?;

            Ok(Self {
                client,
                config,
                api_key,
            })
        }
    }

    impl Geocoder for GoogleGeocoder {
        fn geocode(&self, query: &str) -> Result<Option<GeocodePayload>> {
            let mut params = vec![("address", query), ("key", self.api_key.as_str())];
            if let Some(region) = &self.config.region {
                params.push(("region", region.as_str()));
            }

            tracing::debug!("Geocoding '{}'", query);
            let response = self
                .client
                .get(&self.config.base_url)
                .query(&params)
                .send()
                .map_err(|e| Error::geocoding_error(format!("Request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(Error::geocoding_error(format!(
                    "Geocoder returned status: {}",
                    response.status()
                )));
            }

            let body: GeocodeResponse = response
                .json()
                .map_err(|e| Error::geocoding_error(format!("Failed to read response: {e}")))?;
            body.into_payload()
        }
    }
}
