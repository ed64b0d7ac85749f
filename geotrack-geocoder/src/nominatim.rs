use std::time::Duration;

use log::debug;
use serde::Deserialize;

use geotrack_logic::{Address, Coordinate, Geocoder, prelude::*};

const fn geocoder_host() -> &'static str {
    if let Some(host) = option_env!("GEOCODER_HOST") {
        host
    } else {
        "nominatim.openstreetmap.org"
    }
}

const fn geocoder_port() -> u16 {
    if let Some(port) = option_env!("GEOCODER_PORT") {
        const_str::parse!(port, u16)
    } else {
        443
    }
}

const fn geocoder_secure() -> bool {
    if let Some(secure) = option_env!("GEOCODER_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        true
    }
}

const fn geocoder_proto() -> &'static str {
    if geocoder_secure() { "https" } else { "http" }
}

const GEOCODER_HOST: &str = geocoder_host();
const GEOCODER_PORT: u16 = geocoder_port();
const GEOCODER_PROTO: &str = geocoder_proto();

const GEOCODER_SOCKET: &str = const_str::concat!(GEOCODER_HOST, ":", GEOCODER_PORT);

/// Base URL of the reverse geocoding API, set at build time
pub const GEOCODER_URL: &str = const_str::concat!(GEOCODER_PROTO, "://", GEOCODER_SOCKET);

const USER_AGENT: &str = concat!("geotrack/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a `/reverse` response, the API answers 200 with an `error` field when it has no
/// address for the spot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Found { display_name: String },
    NotFound { error: String },
}

/// Reverse geocoder backed by a Nominatim compatible HTTP API
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self> {
        Self::with_base_url(GEOCODER_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn reverse_url(&self, coordinate: Coordinate) -> String {
        format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.base_url, coordinate.lat, coordinate.long
        )
    }
}

fn parse_response(body: &str) -> Result<Vec<Address>> {
    let resp = serde_json::from_str::<ReverseResponse>(body)
        .context("Failed to parse geocoder response")?;
    Ok(match resp {
        ReverseResponse::Found { display_name } => {
            vec![Address::new(display_name.split(", "))]
        }
        ReverseResponse::NotFound { error } => {
            debug!("Geocoder has no address: {error}");
            vec![]
        }
    })
}

impl Geocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Address>> {
        let body = self
            .client
            .get(self.reverse_url(coordinate))
            .send()
            .await
            .context("Could not send request")?
            .error_for_status()
            .context("Geocoder returned error")?
            .text()
            .await
            .context("Failed to read geocoder response")?;

        parse_response(&body)
    }
}
