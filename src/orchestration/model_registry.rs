//! # Model Registry
//!
//! Uploads content-addressed model references. Models are immutable once
//! created; there is no update or delete.

use std::sync::Arc;

use tracing::info;

use crate::constants::operations;
use crate::error::MarketResult;
use crate::ledger::{LedgerGateway, Transaction};
use crate::models::codec::decode_assigned_id;
use crate::models::Model;

pub struct ModelRegistry {
    gateway: Arc<LedgerGateway>,
}

impl ModelRegistry {
    pub fn new(gateway: Arc<LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Register a model and return the id the ledger assigned
    pub async fn upload(
        &self,
        owner: &str,
        content_hash: &str,
        signature: &str,
    ) -> MarketResult<String> {
        let args = Model::create_args(owner, content_hash, signature)?;
        let payload = self.gateway.submit(Transaction::CreateModel, args).await?;
        let model_id = decode_assigned_id("model", &payload)?;

        info!(
            operation = operations::UPLOAD_MODEL,
            model_id = %model_id,
            owner = %owner,
            "Model uploaded"
        );
        Ok(model_id)
    }
}
