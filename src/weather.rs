//! Current weather for the selected location
//!
//! Lookups never fail outward: any problem degrades to `Unavailable`.

use crate::filter::LocationSelection;
use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherData {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherLookup {
    Available(WeatherData),
    Unavailable,
}

impl WeatherLookup {
    pub fn temperature_c(&self) -> Option<f64> {
        match self {
            WeatherLookup::Available(data) => Some(data.temperature_c),
            WeatherLookup::Unavailable => None,
        }
    }
}

/// The part of the current-weather response we read
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
}

impl From<CurrentWeatherResponse> for WeatherData {
    fn from(response: CurrentWeatherResponse) -> Self {
        WeatherData {
            temperature_c: response.main.temp,
            humidity_pct: response.main.humidity,
        }
    }
}

/// "District,State,IN" when a district is chosen, "State,IN" otherwise
pub fn location_query(selection: &LocationSelection) -> Option<String> {
    if !selection.district.is_empty() {
        Some(format!("{},{},IN", selection.district, selection.state))
    } else if !selection.state.is_empty() {
        Some(format!("{},IN", selection.state))
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(WeatherClient {
            client,
            url: url.into(),
            api_key,
        })
    }

    /// A client that never makes a request
    pub fn disabled() -> Self {
        WeatherClient {
            client: Client::new(),
            url: String::new(),
            api_key: None,
        }
    }

    pub async fn lookup(&self, selection: &LocationSelection) -> WeatherLookup {
        let (Some(api_key), Some(query)) = (self.api_key.as_deref(), location_query(selection))
        else {
            debug!("Weather lookup skipped: no API key or no location");
            return WeatherLookup::Unavailable;
        };

        match self.fetch(&query, api_key).await {
            Ok(data) => WeatherLookup::Available(data),
            Err(e) => {
                warn!("Weather unavailable for {}: {}", query, e);
                WeatherLookup::Unavailable
            }
        }
    }

    async fn fetch(&self, query: &str, api_key: &str) -> Result<WeatherData> {
        // The request URL carries the API key, keep it out of error text
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", query), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP request failed: {}", status));
        }

        let body: CurrentWeatherResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_query() {
        let mut selection = LocationSelection::default();
        assert_eq!(location_query(&selection), None);

        selection.state = "Karnataka".to_string();
        assert_eq!(location_query(&selection).as_deref(), Some("Karnataka,IN"));

        selection.district = "Mysuru".to_string();
        assert_eq!(
            location_query(&selection).as_deref(),
            Some("Mysuru,Karnataka,IN")
        );
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"coord":{"lon":76.6,"lat":12.3},"main":{"temp":27.4,"feels_like":28.0,"humidity":71},"name":"Mysore"}"#;
        let response: CurrentWeatherResponse = serde_json::from_str(body).unwrap();
        let data = WeatherData::from(response);

        assert_eq!(data.temperature_c, 27.4);
        assert_eq!(data.humidity_pct, 71.0);
    }

    #[test]
    fn test_response_without_main_is_an_error() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        assert!(serde_json::from_str::<CurrentWeatherResponse>(body).is_err());
    }

    #[tokio::test]
    async fn test_disabled_client_is_unavailable() {
        let selection = LocationSelection {
            state: "Goa".to_string(),
            ..Default::default()
        };
        let lookup = WeatherClient::disabled().lookup(&selection).await;
        assert_eq!(lookup, WeatherLookup::Unavailable);
        assert_eq!(lookup.temperature_c(), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades() {
        let client = WeatherClient::new(
            "http://127.0.0.1:9/weather",
            Some("key".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let selection = LocationSelection {
            state: "Goa".to_string(),
            ..Default::default()
        };

        assert_eq!(client.lookup(&selection).await, WeatherLookup::Unavailable);
    }

    #[tokio::test]
    async fn test_fetch_error_hides_api_key() {
        let client = WeatherClient::new(
            "http://127.0.0.1:9/weather",
            Some("SECRET123".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.fetch("Goa,IN", "SECRET123").await.unwrap_err();
        let message = format!("{:#}", err);

        assert!(!message.contains("SECRET123"), "leaked key: {}", message);
        assert!(!message.contains("appid"));
    }

    #[test]
    fn test_lookup_serializes_with_status() {
        let json = serde_json::to_value(WeatherLookup::Unavailable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unavailable"}));
    }
}
