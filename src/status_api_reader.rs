use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::meter::{field_as_f64, field_as_i64, MeterReading};
use crate::reader::{ReadError, REQUEST_TIMEOUT, SHELLY_USER};

/// Reader for Gen 1 devices using the Common HTTP API.
///
/// Fetches the full status document and extracts the first entry of the
/// `meters` array. If the device has a password set, requests carry
/// Basic credentials for the fixed `admin` user.
/// See: https://shelly-api-docs.shelly.cloud/gen1/#http-dialect
pub struct StatusApiReader {
    url: String,
    password: Option<String>,
    client: reqwest::Client,
}

impl StatusApiReader {
    pub fn new(host: &str, password: Option<String>) -> Self {
        Self {
            url: format!("http://{host}/status"),
            password,
            client: reqwest::Client::new(),
        }
    }

    pub async fn read(&self) -> Result<Option<MeterReading>, ReadError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT);
        if let Some(password) = &self.password {
            request = request.basic_auth(SHELLY_USER, Some(password));
        }
        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "status api returned unexpected http status");
            return Ok(None);
        }
        parse_status_reading(&response.text().await?)
    }
}

/// Extracts the first meter from a `/status` document. An empty or
/// absent `meters` array is not an error, just a cycle with no reading.
pub fn parse_status_reading(body: &str) -> Result<Option<MeterReading>, ReadError> {
    let root: Value = serde_json::from_str(body)?;
    let first_meter = root
        .get("meters")
        .and_then(Value::as_array)
        .and_then(|meters| meters.first());
    let Some(meter) = first_meter else {
        debug!("no meters found in status response");
        return Ok(None);
    };
    Ok(Some(MeterReading {
        power: field_as_f64(meter, "power"),
        timestamp: field_as_i64(meter, "timestamp"),
        total: field_as_i64(meter, "total"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Captured from a Shelly Plug S running v1.14.0 firmware.
    const STATUS_RESPONSE: &str = r#"
        {
            "wifi_sta": {
                "connected": true,
                "ssid": "TEST_WIFI",
                "ip": "123.456.789.101",
                "rssi": -13
            },
            "cloud": {
                "enabled": true,
                "connected": true
            },
            "mqtt": {
                "connected": false
            },
            "time": "17:23",
            "serial": 1234,
            "has_update": true,
            "mac": "123456ABCD",
            "relays": [
                {
                    "ison": true,
                    "has_timer": false,
                    "overpower": false
                }
            ],
            "meters": [
                {
                    "power": 70.24,
                    "is_valid": true,
                    "timestamp": 1739294619,
                    "counters": [
                        71.380,
                        72.397,
                        71.324
                    ],
                    "total": 18013
                }
            ],
            "temperature": 0.00,
            "overtemperature": false,
            "tmp": {
                "tC": 0.00,
                "tF": 32.00,
                "is_valid": "true"
            },
            "update": {
                "status": "pending",
                "has_update": true,
                "new_version": "20230913-113610/v1.14.0-gcb84623",
                "old_version": "20191018-113038/master@b12f42e3"
            },
            "ram_total": 50824,
            "ram_free": 37188,
            "fs_size": 233681,
            "fs_free": 171935,
            "uptime": 14883
        }
    "#;

    #[test]
    fn test_parse_full_status_response() {
        let reading = parse_status_reading(STATUS_RESPONSE).unwrap().unwrap();
        assert_eq!(reading.power, 70.24);
        assert_eq!(reading.timestamp, 1739294619);
        assert_eq!(reading.total, 18013);
    }

    #[test]
    fn test_parse_empty_meters_is_no_reading() {
        let reading = parse_status_reading(r#"{"meters": []}"#).unwrap();
        assert_eq!(reading, None);
    }

    #[test]
    fn test_parse_missing_meters_is_no_reading() {
        let reading = parse_status_reading(r#"{"relays": []}"#).unwrap();
        assert_eq!(reading, None);
    }

    #[test]
    fn test_parse_meter_with_missing_fields_defaults_to_zero() {
        let reading = parse_status_reading(r#"{"meters": [{"is_valid": true}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(reading, MeterReading::default());
    }

    #[test]
    fn test_parse_malformed_json_is_an_error() {
        let result = parse_status_reading("not json at all");
        assert!(matches!(result, Err(ReadError::Json(_))));
    }
}
