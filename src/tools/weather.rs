//! `get_weather` tool and the geo marker it drives.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::arguments::ToolArguments;
use super::tool::FunctionTool;
use super::types::ToolParameters;
use crate::error::{ConsoleError, Result};

pub const WEATHER_TOOL_NAME: &str = "get_weather";

const DESCRIPTION: &str = "Retrieves the weather for a given lat, lng coordinate pair. \
Specify a label for the location.";

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Default for Coordinates {
    fn default() -> Self {
        Self {
            lat: 37.775593,
            lng: -122.418137,
        }
    }
}

/// A measured value with its units, e.g. `12.3 °C`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub units: String,
}

/// Location point placed by the weather lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMarker {
    pub lat: f64,
    pub lng: f64,
    pub location: Option<String>,
    pub temperature: Option<Reading>,
    pub wind_speed: Option<Reading>,
}

/// Marker plus map center, reset on disconnect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerState {
    pub marker: Option<GeoMarker>,
    pub coords: Coordinates,
}

/// Marker state shared between the controller and the tool handler.
#[derive(Debug, Clone, Default)]
pub struct SharedMarker(Arc<RwLock<MarkerState>>);

impl SharedMarker {
    pub fn snapshot(&self) -> MarkerState {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reset(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = MarkerState::default();
    }

    fn place(&self, marker: GeoMarker) {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        state.coords = Coordinates {
            lat: marker.lat,
            lng: marker.lng,
        };
        state.marker = Some(marker);
    }

    /// Attach readings if the marker still points at `(lat, lng)`.
    ///
    /// Returns `false` when the marker was reset or moved while the lookup
    /// was in flight; the readings are then dropped.
    fn attach_readings(
        &self,
        lat: f64,
        lng: f64,
        temperature: Option<Reading>,
        wind: Option<Reading>,
    ) -> bool {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        match state.marker.as_mut() {
            Some(marker) if marker.lat == lat && marker.lng == lng => {
                marker.temperature = temperature;
                marker.wind_speed = wind;
                true
            }
            _ => false,
        }
    }
}

/// Build the `get_weather` tool against an open-meteo compatible API.
pub fn weather_tool(base_url: impl Into<String>, marker: SharedMarker) -> Result<FunctionTool> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    let base_url = base_url.into().trim_end_matches('/').to_string();

    let parameters = ToolParameters::object()
        .number("lat", "Latitude", true)
        .number("lng", "Longitude", true)
        .string("location", "Name of the location", true)
        .build();

    Ok(FunctionTool::new(
        WEATHER_TOOL_NAME,
        DESCRIPTION,
        parameters,
        move |args: ToolArguments| {
            let http = http.clone();
            let base_url = base_url.clone();
            let marker = marker.clone();
            async move { lookup(&http, &base_url, &marker, &args).await }
        },
    ))
}

async fn lookup(
    http: &reqwest::Client,
    base_url: &str,
    marker: &SharedMarker,
    args: &ToolArguments,
) -> Result<Value> {
    let lat = args.get_f64("lat")?;
    let lng = args.get_f64("lng")?;
    let location = args.get_str("location")?.to_string();

    marker.place(GeoMarker {
        lat,
        lng,
        location: Some(location.clone()),
        temperature: None,
        wind_speed: None,
    });

    let response = http
        .get(format!("{base_url}/v1/forecast"))
        .query(&[
            ("latitude", lat.to_string()),
            ("longitude", lng.to_string()),
            ("current", "temperature_2m,wind_speed_10m".to_string()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ConsoleError::tool(
            WEATHER_TOOL_NAME,
            format!("weather lookup failed with status {}: {body}", status.as_u16()),
        ));
    }

    let json: Value = response.json().await?;
    let temperature = reading(&json, "temperature_2m");
    let wind_speed = reading(&json, "wind_speed_10m");
    if !marker.attach_readings(lat, lng, temperature, wind_speed) {
        tracing::debug!(%location, "weather readings dropped; marker was reset");
    }
    Ok(json)
}

fn reading(json: &Value, field: &str) -> Option<Reading> {
    let value = json.get("current")?.get(field)?.as_f64()?;
    let units = json
        .get("current_units")
        .and_then(|units| units.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Reading { value, units })
}
