//! # Ledger Payload Codec
//!
//! Decoding of chaincode responses and encoding of positional arguments.
//! Records travel as JSON objects; arguments travel as strings with booleans
//! spelled `true`/`false` and integers in base 10.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::constants::ledger::NULL_SENTINEL;
use crate::error::{MarketError, MarketResult};

fn is_null_payload(text: &str) -> bool {
    text.is_empty() || text == NULL_SENTINEL
}

fn payload_text<'a>(entity: &str, payload: &'a [u8]) -> MarketResult<&'a str> {
    std::str::from_utf8(payload)
        .map(str::trim)
        .map_err(|e| MarketError::validation(entity, format!("payload is not UTF-8: {e}")))
}

/// Decode a single record; an empty or `null` payload is malformed here
pub fn decode_record<T: DeserializeOwned>(entity: &str, payload: &[u8]) -> MarketResult<T> {
    let text = payload_text(entity, payload)?;
    if is_null_payload(text) {
        return Err(MarketError::validation(entity, "ledger returned an empty record"));
    }
    serde_json::from_str(text).map_err(|e| MarketError::validation(entity, e.to_string()))
}

/// Decode a listing, normalizing the chaincode's `null` to an empty collection
pub fn decode_collection<T: DeserializeOwned>(
    entity: &str,
    payload: &[u8],
) -> MarketResult<Vec<T>> {
    let text = payload_text(entity, payload)?;
    if is_null_payload(text) {
        return Ok(Vec::new());
    }
    let items: Option<Vec<T>> =
        serde_json::from_str(text).map_err(|e| MarketError::validation(entity, e.to_string()))?;
    Ok(items.unwrap_or_default())
}

/// Extract the key the chaincode assigned on a create
///
/// Accepts the created record (`{"id": ...}`), a JSON string, or the bare id.
pub fn decode_assigned_id(entity: &str, payload: &[u8]) -> MarketResult<String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Assigned {
        Record { id: String },
        Id(String),
    }

    let text = payload_text(entity, payload)?;
    if is_null_payload(text) {
        return Err(MarketError::validation(entity, "ledger did not return an assigned id"));
    }

    let id = match serde_json::from_str::<Assigned>(text) {
        Ok(Assigned::Record { id }) | Ok(Assigned::Id(id)) => id,
        Err(_) if !text.starts_with(&['{', '[', '"'][..]) => text.to_string(),
        Err(e) => return Err(MarketError::validation(entity, e.to_string())),
    };

    if id.trim().is_empty() {
        return Err(MarketError::validation(entity, "assigned id is empty"));
    }
    Ok(id)
}

pub fn encode_bool(value: bool) -> String {
    value.to_string()
}

pub fn encode_int<N: Into<u64>>(value: N) -> String {
    value.into().to_string()
}

/// The chaincode marshals empty lists as `null`; read those as empty
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_listing_is_empty() {
        let items: Vec<serde_json::Value> = decode_collection("task", b"null").unwrap();
        assert!(items.is_empty());

        let items: Vec<serde_json::Value> = decode_collection("task", b"  null\n").unwrap();
        assert!(items.is_empty());

        let items: Vec<serde_json::Value> = decode_collection("task", b"").unwrap();
        assert!(items.is_empty());

        let items: Vec<u32> = decode_collection("task", b"[1,2]").unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_null_record_is_validation_failure() {
        let err = decode_record::<serde_json::Value>("user", b"null").unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed { .. }));
    }

    #[test]
    fn test_malformed_listing_is_validation_failure() {
        let err = decode_collection::<u32>("task", b"{\"oops\":1}").unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed { .. }));
    }

    #[test]
    fn test_assigned_id_shapes() {
        assert_eq!(
            decode_assigned_id("task", br#"{"id":"t-9","bonus":3}"#).unwrap(),
            "t-9"
        );
        assert_eq!(decode_assigned_id("task", br#""t-10""#).unwrap(), "t-10");
        assert_eq!(decode_assigned_id("task", b"t-11\n").unwrap(), "t-11");
        assert!(decode_assigned_id("task", b"null").is_err());
        assert!(decode_assigned_id("task", br#"{"id":""}"#).is_err());
    }

    #[test]
    fn test_argument_encoding() {
        assert_eq!(encode_bool(true), "true");
        assert_eq!(encode_bool(false), "false");
        assert_eq!(encode_int(42u32), "42");
        assert_eq!(encode_int(0u64), "0");
    }
}
