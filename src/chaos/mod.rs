//! CHAOS v2 circuit telemetry — the upstream side of the bridge.
//!
//! The endpoint answers with `{"info": [circuit, ...]}` on success or
//! `{"error": "..."}` when the control login is rejected. Every field in
//! a circuit arrives as a string, so numeric fields accept both JSON
//! numbers and numeric strings.

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub mod client;

pub use client::ChaosClient;

pub const INFO_URL: &str = "https://chaos2.aa.net.uk/broadband/info";

#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("error connecting to AAISP CHAOSv2 endpoint")]
    Http(#[from] reqwest::Error),

    #[error("AAISP CHAOSv2 endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed AAISP CHAOSv2 response")]
    Malformed(#[source] serde_json::Error),

    #[error("error encountered: {0}")]
    Api(String),

    #[error("info section not found in AAISP CHAOSv2 response")]
    MissingInfo,

    #[error("invalid circuit in AAISP CHAOSv2 response")]
    InvalidCircuit(#[source] serde_json::Error),

    #[error("no circuits returned from AAISP CHAOSv2")]
    NoCircuits,
}

/// One broadband line as reported by CHAOS.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Circuit {
    pub login: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub quota_remaining: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub quota_monthly: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub rx_rate: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub tx_rate: f64,
    #[serde(deserialize_with = "trimmed")]
    pub postcode: String,
}

/// Anything that can produce the current circuit list.
#[async_trait]
pub trait CircuitSource: Send + Sync {
    async fn fetch_circuits(&self) -> Result<Vec<Circuit>, ChaosError>;
}

/// Parse a CHAOS `info` response body into circuits.
///
/// An `error` field wins over a missing `info`; an empty `info` array is
/// an error as there is nothing to publish.
pub fn parse_info_response(body: &str) -> Result<Vec<Circuit>, ChaosError> {
    let mut data: Value = serde_json::from_str(body).map_err(ChaosError::Malformed)?;

    let info = match data.get_mut("info") {
        Some(info) => info.take(),
        None => {
            return Err(match data.get("error") {
                Some(Value::String(msg)) => ChaosError::Api(msg.clone()),
                Some(other) => ChaosError::Api(other.to_string()),
                None => ChaosError::MissingInfo,
            });
        }
    };

    let circuits: Vec<Circuit> =
        serde_json::from_value(info).map_err(ChaosError::InvalidCircuit)?;
    if circuits.is_empty() {
        return Err(ChaosError::NoCircuits);
    }
    Ok(circuits)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {n}"))),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected an integer, got {s:?}"))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("expected a number, got {n}"))),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got {s:?}"))),
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// Unique values in order of first appearance.
pub fn unique_in_order<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<&str> = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_circuit() -> Circuit {
        Circuit {
            login: "ab12@a.1".to_string(),
            id: "32891".to_string(),
            quota_remaining: 5_000_000_000,
            quota_monthly: 200_000_000_000,
            rx_rate: 20_000_000.0,
            tx_rate: 80_000_000.0,
            postcode: "SW1A 1AA".to_string(),
        }
    }

    const STRING_FIELDS: &str = r#"{
        "info": [{
            "login": "ab12@a.1",
            "ID": "32891",
            "quota_remaining": "5000000000",
            "quota_monthly": "200000000000",
            "rx_rate": "20000000",
            "tx_rate": "80000000",
            "postcode": "SW1A 1AA",
            "tx_rate_adjusted": "75000000"
        }]
    }"#;

    #[test]
    fn test_parse_string_fields() {
        let circuits = parse_info_response(STRING_FIELDS).unwrap();
        assert_eq!(circuits, vec![sample_circuit()]);
    }

    #[test]
    fn test_parse_numeric_fields() {
        let body = r#"{"info": [{
            "login": "ab12@a.1", "ID": "32891",
            "quota_remaining": 5000000000, "quota_monthly": 200000000000,
            "rx_rate": 20000000, "tx_rate": 80000000.0,
            "postcode": "SW1A 1AA"
        }]}"#;
        let circuits = parse_info_response(body).unwrap();
        assert_eq!(circuits, vec![sample_circuit()]);
    }

    #[test]
    fn test_parse_error_field() {
        let err = parse_info_response(r#"{"error": "Bad login"}"#).unwrap_err();
        match err {
            ChaosError::Api(msg) => assert_eq!(msg, "Bad login"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_info() {
        let err = parse_info_response(r#"{"something": []}"#).unwrap_err();
        assert!(matches!(err, ChaosError::MissingInfo));
    }

    #[test]
    fn test_parse_empty_info() {
        let err = parse_info_response(r#"{"info": []}"#).unwrap_err();
        assert!(matches!(err, ChaosError::NoCircuits));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_info_response("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, ChaosError::Malformed(_)));
    }

    #[test]
    fn test_parse_circuit_missing_field() {
        let body = r#"{"info": [{"login": "ab12@a.1", "ID": "32891"}]}"#;
        let err = parse_info_response(body).unwrap_err();
        assert!(matches!(err, ChaosError::InvalidCircuit(_)));
    }

    #[test]
    fn test_parse_rejects_non_numeric_quota() {
        let body = STRING_FIELDS.replace("\"5000000000\"", "\"lots\"");
        let err = parse_info_response(&body).unwrap_err();
        assert!(matches!(err, ChaosError::InvalidCircuit(_)));
    }

    #[test]
    fn test_parse_trims_postcode() {
        let body = STRING_FIELDS.replace("\"SW1A 1AA\"", "\" SW1A 1AA \\n\"");
        let circuits = parse_info_response(&body).unwrap();
        assert_eq!(circuits[0].postcode, "SW1A 1AA");
    }

    #[test]
    fn test_unique_in_order() {
        let values = ["b", "a", "b", "c", "a"];
        assert_eq!(unique_in_order(values), vec!["b", "a", "c"]);
    }
}
