//! # PKI Boundary
//!
//! Certificate enrollment, identity registration and revocation against an
//! external certificate authority. The orchestration layer never depends on
//! this module; it sits beside it for account provisioning.

pub mod fabric_ca;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::MarketResult;

pub use fabric_ca::{parse_authority_key_id, parse_serial, CaCommand, FabricCaClient};

/// Identity type passed to the CA on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityType {
    Client,
    Peer,
    Admin,
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Peer => write!(f, "peer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Enroll an identity and return the gateway settings that use it
    async fn enroll(&self, username: &str, password: &str, org: &str)
        -> MarketResult<GatewayConfig>;

    async fn register(
        &self,
        username: &str,
        secret: &str,
        id_type: IdentityType,
        org: &str,
    ) -> MarketResult<()>;

    /// Revoke the identity's certificate and delete its local material
    async fn revoke(&self, username: &str, org: &str) -> MarketResult<()>;
}
