//! # Model Record
//!
//! Immutable, content-addressed artifact reference. Created once through
//! `CreateModel` and never updated.

use serde::{Deserialize, Serialize};

use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::models::codec::decode_record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub owner: String,
    #[serde(rename = "hash")]
    pub content_hash: String,
    pub signature: String,
}

impl Model {
    pub fn decode(payload: &[u8]) -> MarketResult<Self> {
        decode_record("model", payload)
    }

    /// Positional arguments for `CreateModel`
    pub fn create_args(
        owner: &str,
        content_hash: &str,
        signature: &str,
    ) -> MarketResult<Vec<String>> {
        let fields = [
            ("owner", owner),
            ("content hash", content_hash),
            ("signature", signature),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(MarketError::rule(
                    BusinessRule::InvalidArgument,
                    format!("model {field} is empty"),
                ));
            }
        }
        Ok(vec![
            owner.to_string(),
            content_hash.to_string(),
            signature.to_string(),
        ])
    }
}
