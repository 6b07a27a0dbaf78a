//! # Fabric CA Client
//!
//! Drives the `fabric-ca-client` and `openssl` binaries. Commands are built
//! by pure functions so their shape can be checked without a CA; environment
//! variables are set on each child process, never on this process.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{CaConfig, GatewayConfig};
use crate::error::{MarketError, MarketResult};
use crate::pki::{CertificateAuthority, IdentityType};

/// Attributes granted to every registered identity
const REGISTER_ATTRS: &str = "hf.Revoker=true";
/// Revocation reason sent with every revoke
const REVOKE_REASON: &str = "affiliationchange";

/// A fully specified child process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    /// Printable form with secrets masked
    pub display: String,
}

impl CaCommand {
    fn new(
        program: &str,
        args: Vec<String>,
        envs: Vec<(String, String)>,
        display: String,
    ) -> Self {
        Self {
            program: program.to_string(),
            args,
            envs,
            display,
        }
    }

    async fn run(&self, operation: &str) -> MarketResult<Output> {
        debug!(operation = %operation, command = %self.display, "Running CA command");
        let output = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| {
                MarketError::certificate_authority(operation, format!("{}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            let detail = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
            warn!(operation = %operation, status = %output.status, "CA command failed");
            return Err(MarketError::certificate_authority(
                operation,
                format!("{} exited with {}: {detail}", self.program, output.status),
            ));
        }
        Ok(output)
    }
}

/// [`CertificateAuthority`] backed by the Fabric CA command line tools
#[derive(Debug, Clone)]
pub struct FabricCaClient {
    config: CaConfig,
}

impl FabricCaClient {
    pub fn new(config: CaConfig) -> Self {
        Self { config }
    }

    fn ca_address(&self, org: &str) -> MarketResult<String> {
        let port = self.config.ca_ports.get(org).ok_or_else(|| {
            MarketError::certificate_authority("resolve_ca", format!("no CA port for org {org}"))
        })?;
        Ok(format!("{}:{port}", self.config.ca_host))
    }

    /// Directory holding a user's enrolled MSP material
    pub fn client_home(&self, org: &str, username: &str) -> PathBuf {
        self.config.identity_root.join(org).join(username)
    }

    fn ca_tls_cert(&self, org: &str) -> PathBuf {
        self.config
            .crypto_root
            .join(org)
            .join("peer1")
            .join("assets")
            .join("ca")
            .join(format!("{org}-ca-cert.pem"))
    }

    fn peer_tls_cert(&self, org: &str) -> PathBuf {
        self.config
            .crypto_root
            .join(org)
            .join("peer1")
            .join("tls-msp")
            .join("tlscacerts")
            .join("tls-0-0-0-0-7052.pem")
    }

    fn ca_admin_home(&self, org: &str) -> PathBuf {
        self.config.crypto_root.join(org).join("ca").join("admin")
    }

    fn client_env(home: &Path, tls_cert: &Path) -> Vec<(String, String)> {
        vec![
            (
                "FABRIC_CA_CLIENT_HOME".to_string(),
                home.display().to_string(),
            ),
            (
                "FABRIC_CA_CLIENT_TLS_CERTFILES".to_string(),
                tls_cert.display().to_string(),
            ),
            ("FABRIC_CA_CLIENT_MSPDIR".to_string(), "msp".to_string()),
        ]
    }

    pub fn enroll_command(
        &self,
        username: &str,
        password: &str,
        org: &str,
    ) -> MarketResult<CaCommand> {
        let address = self.ca_address(org)?;
        let home = self.client_home(org, username);
        Ok(CaCommand::new(
            &self.config.client_binary,
            vec![
                "enroll".to_string(),
                "-d".to_string(),
                "-u".to_string(),
                format!("https://{username}:{password}@{address}"),
            ],
            Self::client_env(&home, &self.ca_tls_cert(org)),
            format!(
                "{} enroll -d -u https://{username}:***@{address}",
                self.config.client_binary
            ),
        ))
    }

    pub fn register_command(
        &self,
        username: &str,
        secret: &str,
        id_type: IdentityType,
        org: &str,
    ) -> MarketResult<CaCommand> {
        let address = self.ca_address(org)?;
        let args = vec![
            "register".to_string(),
            "-d".to_string(),
            "--id.name".to_string(),
            username.to_string(),
            "--id.secret".to_string(),
            secret.to_string(),
            "--id.type".to_string(),
            id_type.to_string(),
            "--id.attrs".to_string(),
            REGISTER_ATTRS.to_string(),
            "-u".to_string(),
            format!("https://{address}"),
        ];
        let display = format!(
            "{} register -d --id.name {username} --id.secret *** --id.type {id_type} \
             -u https://{address}",
            self.config.client_binary
        );
        Ok(CaCommand::new(
            &self.config.client_binary,
            args,
            Self::client_env(&self.ca_admin_home(org), &self.ca_tls_cert(org)),
            display,
        ))
    }

    pub fn revoke_command(
        &self,
        username: &str,
        org: &str,
        serial: &str,
        authority_key_id: &str,
    ) -> MarketResult<CaCommand> {
        let address = self.ca_address(org)?;
        let tls_cert = self.ca_tls_cert(org);
        let args = vec![
            "revoke".to_string(),
            "-d".to_string(),
            "-u".to_string(),
            format!("https://{address}"),
            "-s".to_string(),
            serial.to_string(),
            "-a".to_string(),
            authority_key_id.to_string(),
            "-r".to_string(),
            REVOKE_REASON.to_string(),
            "--tls.certfiles".to_string(),
            tls_cert.display().to_string(),
        ];
        let display = format!("{} {}", self.config.client_binary, args.join(" "));
        Ok(CaCommand::new(
            &self.config.client_binary,
            args,
            Self::client_env(&self.client_home(org, username), &tls_cert),
            display,
        ))
    }

    fn openssl_command(&self, cert: &Path, flags: &[&str]) -> CaCommand {
        let mut args = vec![
            "x509".to_string(),
            "-in".to_string(),
            cert.display().to_string(),
        ];
        args.extend(flags.iter().map(|flag| flag.to_string()));
        let display = format!("{} {}", self.config.openssl_binary, args.join(" "));
        CaCommand::new(&self.config.openssl_binary, args, Vec::new(), display)
    }

    /// Gateway settings for an identity enrolled under `client_home`
    pub fn gateway_for(&self, org: &str, username: &str) -> MarketResult<GatewayConfig> {
        let peer_port = self.config.peer_ports.get(org).ok_or_else(|| {
            MarketError::certificate_authority(
                "resolve_peer",
                format!("no peer port for org {org}"),
            )
        })?;
        let home = self.client_home(org, username);
        let home = if home.is_absolute() {
            home
        } else {
            std::env::current_dir()
                .map_err(|e| MarketError::certificate_authority("resolve_identity", e.to_string()))?
                .join(home)
        };
        Ok(GatewayConfig {
            msp_id: format!("{org}MSP"),
            cert_path: home.join("msp").join("signcerts"),
            key_path: home.join("msp").join("keystore"),
            crypto_path: home,
            tls_cert_path: self.peer_tls_cert(org),
            peer_endpoint: format!("dns:///localhost:{peer_port}"),
            gateway_peer: format!("peer1-{org}"),
        })
    }
}

#[async_trait]
impl CertificateAuthority for FabricCaClient {
    async fn enroll(
        &self,
        username: &str,
        password: &str,
        org: &str,
    ) -> MarketResult<GatewayConfig> {
        let command = self.enroll_command(username, password, org)?;
        let home = self.client_home(org, username);
        tokio::fs::create_dir_all(&home).await.map_err(|e| {
            MarketError::certificate_authority("enroll", format!("{}: {e}", home.display()))
        })?;

        command.run("enroll").await?;
        let gateway = self.gateway_for(org, username)?;
        info!(username = %username, org = %org, home = %home.display(), "Identity enrolled");
        Ok(gateway)
    }

    async fn register(
        &self,
        username: &str,
        secret: &str,
        id_type: IdentityType,
        org: &str,
    ) -> MarketResult<()> {
        self.register_command(username, secret, id_type, org)?
            .run("register")
            .await?;
        info!(username = %username, org = %org, id_type = %id_type, "Identity registered");
        Ok(())
    }

    async fn revoke(&self, username: &str, org: &str) -> MarketResult<()> {
        let home = self.client_home(org, username);
        let cert = home.join("msp").join("signcerts").join("cert.pem");
        if !tokio::fs::try_exists(&cert).await.unwrap_or(false) {
            return Err(MarketError::certificate_authority(
                "revoke",
                format!("certificate not found: {}", cert.display()),
            ));
        }

        let serial_out = self
            .openssl_command(&cert, &["-serial", "-noout"])
            .run("read_serial")
            .await?;
        let serial = parse_serial(&String::from_utf8_lossy(&serial_out.stdout))?;

        let text_out = self
            .openssl_command(&cert, &["-text", "-noout"])
            .run("read_aki")
            .await?;
        let aki = parse_authority_key_id(&String::from_utf8_lossy(&text_out.stdout))?;

        self.revoke_command(username, org, &serial, &aki)?
            .run("revoke")
            .await?;

        tokio::fs::remove_dir_all(&home).await.map_err(|e| {
            MarketError::certificate_authority("revoke", format!("cleanup {}: {e}", home.display()))
        })?;
        info!(username = %username, org = %org, serial = %serial, "Certificate revoked");
        Ok(())
    }
}

/// Serial number from `openssl x509 -serial -noout` (`serial=3A1F...`)
pub fn parse_serial(output: &str) -> MarketResult<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("serial="))
        .map(str::trim)
        .filter(|serial| !serial.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MarketError::certificate_authority("read_serial", "no serial in output"))
}

/// Authority key identifier from `openssl x509 -text`, lowercase hex without colons
///
/// Handles both the `keyid:AB:CD` form and the bare hex line that newer
/// OpenSSL releases print under the extension header.
pub fn parse_authority_key_id(output: &str) -> MarketResult<String> {
    let mut lines = output.lines().map(str::trim);
    while let Some(line) = lines.next() {
        if !line.starts_with("X509v3 Authority Key Identifier") {
            continue;
        }
        if let Some(value) = lines.next() {
            let hex = value.strip_prefix("keyid:").unwrap_or(value);
            let normalized: String = hex
                .chars()
                .filter(|c| *c != ':')
                .collect::<String>()
                .to_lowercase();
            if !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(normalized);
            }
        }
        break;
    }
    Err(MarketError::certificate_authority(
        "read_aki",
        "no authority key identifier in output",
    ))
}
