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

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::ingest::{self, ApiUrl, FetchedSeries};

/// A public sensor API used as a module: generates the numeric input an
/// instrument sonifies. Holds the query url parts, the selected entity
/// (sensor name) and data variable, the last raw payload, and the
/// numeric series derived from it.
pub struct Datasource {
    url: ApiUrl,
    entity: String,
    variable: String,
    raw: Option<Value>,
    number_array: Vec<f64>,
    /// Token of the most recent fetch request. A response carrying an
    /// older token is discarded, so a fetch that resolves after the
    /// selection changed can never overwrite newer data.
    request_token: Uuid,
}

impl Datasource {
    pub fn new(url: ApiUrl, entity: impl Into<String>) -> Self {
        Self {
            url,
            entity: entity.into(),
            variable: String::new(),
            raw: None,
            number_array: Vec::new(),
            request_token: Uuid::new_v4(),
        }
    }

    pub fn url(&self) -> &ApiUrl {
        &self.url
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// The numeric series, one value per time sample. Stays at its
    /// last-known value across failed or superseded fetches.
    pub fn number_array(&self) -> &[f64] {
        &self.number_array
    }

    /// Select the sensor entity queried by this datasource. The stored
    /// payload belongs to the previous entity and is dropped; any fetch
    /// still in flight is orphaned.
    pub fn set_entity(&mut self, entity: impl Into<String>) {
        self.entity = entity.into();
        self.raw = None;
        self.request_token = Uuid::new_v4();
        debug!(entity = %self.entity, "datasource entity selected");
    }

    /// Select the data variable and rederive the numeric series from the
    /// stored payload, when there is one. Orphans any in-flight fetch.
    pub fn set_variable(&mut self, variable: impl Into<String>) {
        self.variable = variable.into();
        self.request_token = Uuid::new_v4();
        if let Some(raw) = &self.raw {
            match ingest::extract_series(raw, &self.variable) {
                Ok(values) => self.number_array = values,
                Err(error) => {
                    debug!(%error, "keeping last-known series after variable change");
                }
            }
        }
        debug!(variable = %self.variable, samples = self.number_array.len(), "datasource variable selected");
    }

    /// Mint the token for a new fetch request. The caller hands it back
    /// to [`Datasource::apply_fetch`] together with the response.
    pub fn begin_request(&mut self) -> Uuid {
        self.request_token = Uuid::new_v4();
        self.request_token
    }

    /// Install a fetched series, unless the request has been superseded.
    /// Returns whether the series was accepted.
    pub fn apply_fetch(&mut self, token: Uuid, series: FetchedSeries) -> bool {
        if token != self.request_token {
            debug!(entity = %self.entity, "discarding stale fetch response");
            return false;
        }
        self.number_array = series.values;
        self.raw = Some(series.raw);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(values: &[f64]) -> FetchedSeries {
        FetchedSeries {
            raw: json!({ "sensors": [] }),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_apply_fetch_installs_series() {
        let mut datasource = Datasource::new(ApiUrl::default(), "PER_PEOPLE_MARKET");
        let token = datasource.begin_request();
        assert!(datasource.apply_fetch(token, series(&[1.0, 2.0, 3.0])));
        assert_eq!(datasource.number_array(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_stale_fetch_is_discarded_after_entity_change() {
        let mut datasource = Datasource::new(ApiUrl::default(), "PER_PEOPLE_MARKET");
        let token = datasource.begin_request();
        assert!(datasource.apply_fetch(token, series(&[1.0, 2.0])));

        // The user changes the entity while a second fetch is in flight.
        let stale = datasource.begin_request();
        datasource.set_entity("TRAFFIC_FLOW_A167");

        assert!(!datasource.apply_fetch(stale, series(&[9.0, 9.0, 9.0])));
        // Last-known values survive.
        assert_eq!(datasource.number_array(), &[1.0, 2.0]);
    }

    #[test]
    fn test_variable_change_rederives_from_raw_payload() {
        let raw = json!({
            "sensors": [{
                "data": {
                    "Walking North": [ { "Value": 3.0 }, { "Value": 4.0 } ],
                    "Walking South": [ { "Value": 8.0 } ]
                }
            }]
        });
        let mut datasource = Datasource::new(ApiUrl::default(), "PER_PEOPLE_MARKET");
        datasource.set_variable("Walking North");
        let token = datasource.begin_request();
        assert!(datasource.apply_fetch(
            token,
            FetchedSeries {
                raw,
                values: vec![3.0, 4.0],
            }
        ));

        datasource.set_variable("Walking South");
        assert_eq!(datasource.number_array(), &[8.0]);
    }
}
