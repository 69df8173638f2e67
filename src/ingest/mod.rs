/*
 * generest - Generative Music from Open Sensor Data
 * Copyright (c) 2025 Philipp Norton
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Data ingestion adapter: fetches a time window of sensor data from a
//! public API and exposes it as a numeric series. Failures here are
//! recoverable by design; a datasource keeps its last-known values.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Default public API: the Newcastle Urban Observatory sensor service.
pub const DEFAULT_BASE_URL: &str = "https://newcastle.urbanobservatory.ac.uk/api/v1.1/sensors";
pub const DEFAULT_PATH_END: &str = "data/json/";
pub const DEFAULT_ENTITY: &str = "PER_PEOPLE_NCLPILGRIMSTMARKETLN_FROM_SOUTH_TO_NORTH";

/// Error type for sensor API operations
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// HTTP request failed
    #[error("request failed: {0}")]
    Request(String),

    /// API returned a non-success status
    #[error("api returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Response payload did not have the expected shape
    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(error: reqwest::Error) -> Self {
        IngestError::Request(error.to_string())
    }
}

/// Two-part query url; the entity (sensor name) is spliced in between.
/// The final query runs on `base_url / entity / path_end ? starttime&endtime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUrl {
    pub base_url: String,
    pub path_end: String,
}

impl Default for ApiUrl {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path_end: DEFAULT_PATH_END.to_string(),
        }
    }
}

/// A half-open day range formatted as YYYYMMDD for the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The window covering one full day.
    pub fn full_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date.checked_add_days(Days::new(1)).unwrap_or(date),
        }
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

/// A successfully fetched series: the raw payload plus the numeric
/// values extracted for the requested variable.
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    pub raw: Value,
    pub values: Vec<f64>,
}

/// Fetches a time window of one sensor's data. Implemented by the HTTP
/// client below and by stubs in tests.
#[async_trait]
pub trait SeriesFetcher: Send + Sync {
    async fn fetch_series(
        &self,
        url: &ApiUrl,
        entity: &str,
        variable: &str,
        window: &DateWindow,
    ) -> Result<FetchedSeries, IngestError>;
}

/// Build the full query url from its parts.
pub fn query_url(url: &ApiUrl, entity: &str, window: &DateWindow) -> String {
    format!(
        "{}/{}/{}?starttime={}&endtime={}",
        url.base_url.trim_end_matches('/'),
        entity,
        url.path_end.trim_matches('/'),
        window.start_param(),
        window.end_param()
    )
}

// Payload shapes, checked only as far as the values we need.

#[derive(Debug, Deserialize)]
struct SensorPayload {
    #[serde(default)]
    sensors: Vec<SensorRecord>,
}

#[derive(Debug, Deserialize)]
struct SensorRecord {
    #[serde(default)]
    data: BTreeMap<String, Vec<Reading>>,
}

#[derive(Debug, Deserialize)]
struct Reading {
    #[serde(rename = "Value")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VariablesPayload {
    #[serde(rename = "Variables", default)]
    variables: Vec<VariableRecord>,
}

#[derive(Debug, Deserialize)]
struct VariableRecord {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SensorListPayload {
    #[serde(default)]
    sensors: Vec<SensorNameRecord>,
}

#[derive(Debug, Deserialize)]
struct SensorNameRecord {
    #[serde(rename = "Sensor Name")]
    name: String,
}

/// Pull the numeric series for `variable` out of a raw data payload.
/// An empty variable selection takes the first series each sensor offers.
pub fn extract_series(raw: &Value, variable: &str) -> Result<Vec<f64>, IngestError> {
    let payload: SensorPayload =
        serde_json::from_value(raw.clone()).map_err(|e| IngestError::Shape(e.to_string()))?;

    let mut values = Vec::new();
    for sensor in &payload.sensors {
        let series = if variable.is_empty() {
            sensor.data.values().next()
        } else {
            sensor.data.get(variable)
        };
        if let Some(readings) = series {
            values.extend(readings.iter().filter_map(|r| r.value));
        }
    }
    Ok(values)
}

/// HTTP client for the sensor API, including the metadata service
/// (variable and sensor listings, cached per process).
pub struct SensorApi {
    client: Client,
    metadata_base: String,
    cache: DashMap<String, Vec<String>>,
}

impl SensorApi {
    pub fn new(metadata_base: &str) -> Self {
        Self {
            client: Client::new(),
            metadata_base: metadata_base.trim_end_matches('/').to_string(),
            cache: DashMap::new(),
        }
    }

    /// List the data variables the service reports on.
    pub async fn list_variables(&self) -> Result<Vec<String>, IngestError> {
        if let Some(cached) = self.cache.get("variables") {
            return Ok(cached.value().clone());
        }

        let url = format!("{}/types/json/", self.metadata_base);
        debug!(%url, "fetching variable listing");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        let payload: VariablesPayload = response.json().await.map_err(IngestError::from)?;
        let names: Vec<String> = payload.variables.into_iter().map(|v| v.name).collect();

        self.cache.insert("variables".to_string(), names.clone());
        Ok(names)
    }

    /// List the sensors that report a given variable.
    pub async fn list_sensors(&self, variable: &str) -> Result<Vec<String>, IngestError> {
        let cache_key = format!("sensors:{}", variable);
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.value().clone());
        }

        let url = format!("{}/json/?variable={}", self.metadata_base, variable);
        debug!(%url, "fetching sensor listing");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        let payload: SensorListPayload = response.json().await.map_err(IngestError::from)?;
        let names: Vec<String> = payload.sensors.into_iter().map(|s| s.name).collect();

        self.cache.insert(cache_key, names.clone());
        Ok(names)
    }
}

#[async_trait]
impl SeriesFetcher for SensorApi {
    async fn fetch_series(
        &self,
        url: &ApiUrl,
        entity: &str,
        variable: &str,
        window: &DateWindow,
    ) -> Result<FetchedSeries, IngestError> {
        let query_url = query_url(url, entity, window);
        debug!(%query_url, "fetching sensor data");

        let response = self.client.get(&query_url).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Status {
                status: response.status().as_u16(),
                url: query_url,
            });
        }

        let raw: Value = response.json().await.map_err(IngestError::from)?;
        let values = extract_series(&raw, variable)?;
        info!(entity, samples = values.len(), "fetched sensor series");
        Ok(FetchedSeries { raw, values })
    }
}
