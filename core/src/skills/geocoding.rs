//! Location resolution: Nominatim forward geocoding plus an IP-based
//! lookup for "here" queries. One client is shared across requests.

use serde_json::Value;

use crate::config::GeocodingConfig;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct GeoLocation {
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// Geocoder selected by `geocoding.implementation`: `nominatim` or `mock`.
/// The mock answers locally with fixed coordinates, pairing with the mock
/// weather backend for keyless deployments and tests.
pub enum GeocodingBackend {
    Nominatim(GeocodingClient),
    Mock,
}

impl GeocodingBackend {
    pub fn from_config(config: &GeocodingConfig) -> Self {
        match config.implementation.as_str() {
            "mock" => GeocodingBackend::Mock,
            "nominatim" => GeocodingBackend::Nominatim(GeocodingClient::from_config(config)),
            other => {
                log::warn!("Unknown geocoding implementation '{}', using nominatim", other);
                GeocodingBackend::Nominatim(GeocodingClient::from_config(config))
            }
        }
    }

    pub async fn geocode(&self, location: &str) -> Result<Option<GeoLocation>> {
        match self {
            GeocodingBackend::Nominatim(client) => client.geocode(location).await,
            GeocodingBackend::Mock => Ok(Some(GeoLocation {
                name: location.to_string(),
                city: Some(location.to_string()),
                country: None,
                lat: 47.61,
                lon: -122.33,
            })),
        }
    }

    pub async fn location_from_ip(&self) -> Result<Option<GeoLocation>> {
        match self {
            GeocodingBackend::Nominatim(client) => client.location_from_ip().await,
            GeocodingBackend::Mock => Ok(Some(GeoLocation {
                name: "Springfield, Nowhere".to_string(),
                city: Some("Springfield".to_string()),
                country: Some("Nowhere".to_string()),
                lat: 47.61,
                lon: -122.33,
            })),
        }
    }
}

pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl GeocodingClient {
    pub fn from_config(config: &GeocodingConfig) -> Self {
        GeocodingClient {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub async fn geocode(&self, location: &str) -> Result<Option<GeoLocation>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoreError::Geocoding(format!(
                "Geocoding API error: {}",
                response.status()
            )));
        }

        let results: Vec<Value> = response.json().await?;
        let Some(hit) = results.first() else {
            return Ok(None);
        };

        let lat = parse_coordinate(&hit["lat"]);
        let lon = parse_coordinate(&hit["lon"]);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            return Err(CoreError::Geocoding(
                "Geocoding result missing coordinates".to_string(),
            ));
        };

        Ok(Some(GeoLocation {
            name: hit["display_name"]
                .as_str()
                .unwrap_or(location)
                .to_string(),
            city: hit["address"]["city"]
                .as_str()
                .or_else(|| hit["address"]["town"].as_str())
                .map(str::to_string),
            country: hit["address"]["country"].as_str().map(str::to_string),
            lat,
            lon,
        }))
    }

    /// Rough location of this machine, for queries about "here".
    pub async fn location_from_ip(&self) -> Result<Option<GeoLocation>> {
        let response = self
            .client
            .get("http://ip-api.com/json/")
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let data: Value = response.json().await?;
        if data["status"].as_str() != Some("success") {
            return Ok(None);
        }

        let (Some(lat), Some(lon)) = (data["lat"].as_f64(), data["lon"].as_f64()) else {
            return Ok(None);
        };

        let city = data["city"].as_str().unwrap_or("Unknown");
        let country = data["country"].as_str().unwrap_or("Unknown");

        Ok(Some(GeoLocation {
            name: format!("{}, {}", city, country),
            city: data["city"].as_str().map(str::to_string),
            country: data["country"].as_str().map(str::to_string),
            lat,
            lon,
        }))
    }
}

/// Nominatim returns coordinates as strings; be tolerant of numbers too.
fn parse_coordinate(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
