//! Road distances from a distance-matrix HTTP service.
//!
//! The service is queried with `origins` and `destinations` and answers with
//! a matrix whose first element carries the distance in metres.

use std::time::Duration;

use remit_engine::DistanceResolver;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::settings;

#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: distance service rejected the request")]
    Server { status: StatusCode },
    #[error("no route between {origin} and {destination}: {status}")]
    NoRoute {
        origin: String,
        destination: String,
        status: String,
    },
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    /// Metres.
    value: u64,
}

impl MatrixResponse {
    /// Kilometres of the first element, or the status explaining its absence.
    fn first_km(self) -> Result<Decimal, String> {
        let element = self
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| "EMPTY".to_string())?;
        match element.distance {
            Some(distance) if element.status == "OK" => {
                Ok(Decimal::from(distance.value) / Decimal::ONE_THOUSAND)
            }
            _ => Err(element.status),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MatrixDistanceResolver {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MatrixDistanceResolver {
    pub fn new(settings: &settings::Distance) -> Result<Self, DistanceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub async fn distance(&self, origin: &str, destination: &str) -> Result<Decimal, DistanceError> {
        let mut query = vec![
            ("origins", origin),
            ("destinations", destination),
            ("units", "metric"),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let resp = self.client.get(&self.base_url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DistanceError::Server { status });
        }

        resp.json::<MatrixResponse>()
            .await?
            .first_km()
            .map_err(|status| DistanceError::NoRoute {
                origin: origin.to_string(),
                destination: destination.to_string(),
                status,
            })
    }
}

impl DistanceResolver for MatrixDistanceResolver {
    async fn resolve(&self, origin: &str, destination: &str) -> Option<Decimal> {
        match self.distance(origin, destination).await {
            Ok(km) => Some(km),
            Err(err) => {
                tracing::warn!("distance lookup failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn parse(body: &str) -> MatrixResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn reads_first_element_in_km() {
        let body = parse(
            r#"{"rows":[{"elements":[{"status":"OK","distance":{"text":"128 km","value":128400}}]}]}"#,
        );
        assert_eq!(body.first_km(), Ok(Decimal::from_str("128.4").unwrap()));
    }

    #[test]
    fn reports_element_status_when_no_route() {
        let body = parse(r#"{"rows":[{"elements":[{"status":"ZERO_RESULTS"}]}]}"#);
        assert_eq!(body.first_km(), Err("ZERO_RESULTS".to_string()));
        assert_eq!(parse(r#"{"rows":[]}"#).first_km(), Err("EMPTY".to_string()));
    }
}
