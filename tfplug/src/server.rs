//! Server module for running Terraform providers
//!
//! Terraform launches a provider as a child process and talks to it over
//! the go-plugin protocol: the process checks the magic cookie, binds a
//! local port and prints a handshake line on stdout. When the host sets
//! `PLUGIN_CLIENT_CERT` the connection uses mutual TLS with a certificate
//! generated at startup and advertised in the handshake line.

use crate::error::{Result, TfplugError};
use crate::grpc::ProviderServer;
use crate::provider::FunctionProvider;
use base64::Engine;
use std::path::PathBuf;
use std::time::Duration;
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;

/// Log level for the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a Terraform log level name. Unrecognised names are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Some(LogLevel::Off),
            "trace" | "json" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Level from `TF_LOG_PROVIDER`, then `TF_LOG`, defaulting to info.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        ["TF_LOG_PROVIDER", "TF_LOG"]
            .iter()
            .filter_map(|key| lookup(key))
            .find_map(|value| Self::parse(&value))
            .unwrap_or(LogLevel::Info)
    }

    pub fn as_tracing(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Trace => Some(tracing::Level::TRACE),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
        }
    }
}

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Static TLS certificate, used when the host does not request AutoMTLS
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    pub log_level: LogLevel,
    /// Deadline given to every function call
    pub call_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            log_level: LogLevel::Info,
            call_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `<PREFIX>_CALL_TIMEOUT` (seconds), `<PREFIX>_TLS_CERT`,
    /// `<PREFIX>_TLS_KEY` and the Terraform log level variables.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default().with_log_level(LogLevel::from_lookup(&lookup));

        let key = format!("{}_CALL_TIMEOUT", prefix);
        if let Some(raw) = lookup(&key).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                TfplugError::InvalidConfiguration(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    key, raw
                ))
            })?;
            if secs > 0 {
                config = config.with_call_timeout(Duration::from_secs(secs));
            }
        }

        let cert = lookup(&format!("{}_TLS_CERT", prefix)).filter(|v| !v.is_empty());
        let key = lookup(&format!("{}_TLS_KEY", prefix)).filter(|v| !v.is_empty());
        match (cert, key) {
            (Some(cert), Some(key)) => {
                config = config
                    .with_cert_path(PathBuf::from(cert))
                    .with_key_path(PathBuf::from(key));
            }
            (None, None) => {}
            _ => {
                return Err(TfplugError::InvalidConfiguration(format!(
                    "{0}_TLS_CERT and {0}_TLS_KEY must be set together",
                    prefix
                )))
            }
        }

        Ok(config)
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn has_static_tls(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }
}

/// Main entry point for running a provider
pub async fn serve<P: FunctionProvider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    ProviderServer::new(provider, config).run().await
}

pub(crate) fn check_magic_cookie() -> Result<()> {
    verify_magic_cookie(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())?;
    if let Ok(versions) = std::env::var("PLUGIN_PROTOCOL_VERSIONS") {
        let wanted = PROTOCOL_VERSION.to_string();
        if !versions.split(',').any(|v| v.trim() == wanted) {
            tracing::warn!(
                offered = %versions,
                "Host does not offer protocol version {}", PROTOCOL_VERSION
            );
        }
    }
    Ok(())
}

fn verify_magic_cookie(value: Option<&str>) -> Result<()> {
    match value {
        Some(MAGIC_COOKIE_VALUE) => Ok(()),
        _ => Err(TfplugError::NotAPlugin),
    }
}

pub(crate) fn install_crypto_provider() {
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub(crate) fn handshake_line(port: u16, certificate: Option<&str>) -> String {
    let mut line = format!(
        "{}|{}|tcp|127.0.0.1:{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, port
    );
    if let Some(cert) = certificate {
        line.push('|');
        line.push_str(cert);
    }
    line
}

pub(crate) struct TlsSetup {
    pub server_config: Option<ServerTlsConfig>,
    /// Certificate advertised in the handshake line
    pub certificate: Option<String>,
}

pub(crate) async fn tls_setup(config: &ServerConfig) -> Result<TlsSetup> {
    if let Some(client_cert) = std::env::var("PLUGIN_CLIENT_CERT")
        .ok()
        .filter(|c| !c.trim().is_empty())
    {
        let generated = generate_certificate()?;
        tracing::debug!("Using AutoMTLS");
        let server_config = ServerTlsConfig::new()
            .identity(Identity::from_pem(&generated.cert_pem, &generated.key_pem))
            .client_ca_root(Certificate::from_pem(client_cert));
        return Ok(TlsSetup {
            server_config: Some(server_config),
            certificate: Some(generated.handshake_cert),
        });
    }

    if let (Some(cert_path), Some(key_path)) = (&config.cert_path, &config.key_path) {
        let cert = tokio::fs::read(cert_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
        let key = tokio::fs::read(key_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;
        return Ok(TlsSetup {
            server_config: Some(ServerTlsConfig::new().identity(Identity::from_pem(cert, key))),
            certificate: None,
        });
    }

    tracing::debug!("Serving without TLS");
    Ok(TlsSetup {
        server_config: None,
        certificate: None,
    })
}

pub(crate) struct GeneratedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    /// DER, base64 without padding
    pub handshake_cert: String,
}

pub(crate) fn generate_certificate() -> Result<GeneratedCertificate> {
    use rcgen::{
        BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
        KeyUsagePurpose,
    };

    let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
    params
        .distinguished_name
        .push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        handshake_cert: base64::engine::general_purpose::STANDARD_NO_PAD.encode(cert.der()),
    })
}

pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn handshake_line_format() {
        assert_eq!(handshake_line(4242, None), "1|6|tcp|127.0.0.1:4242|grpc");
        assert_eq!(
            handshake_line(1, Some("Q0VSVA")),
            "1|6|tcp|127.0.0.1:1|grpc|Q0VSVA"
        );
    }

    #[test]
    fn magic_cookie_must_match() {
        assert!(verify_magic_cookie(Some(MAGIC_COOKIE_VALUE)).is_ok());
        assert!(matches!(
            verify_magic_cookie(Some("nope")),
            Err(TfplugError::NotAPlugin)
        ));
        assert!(verify_magic_cookie(None).is_err());
    }

    #[test]
    fn log_level_prefers_provider_variable() {
        let level = LogLevel::from_lookup(lookup(&[("TF_LOG", "error"), ("TF_LOG_PROVIDER", "DEBUG")]));
        assert_eq!(level, LogLevel::Debug);

        let level = LogLevel::from_lookup(lookup(&[("TF_LOG", "warn")]));
        assert_eq!(level, LogLevel::Warn);

        assert_eq!(LogLevel::from_lookup(lookup(&[])), LogLevel::Info);
        assert_eq!(LogLevel::parse("off").and_then(|l| l.as_tracing()), None);
    }

    #[test]
    fn config_from_env_reads_timeout_and_tls() {
        let config = ServerConfig::from_lookup(
            "TF_GO_PROVIDER",
            lookup(&[
                ("TF_GO_PROVIDER_CALL_TIMEOUT", "30"),
                ("TF_GO_PROVIDER_TLS_CERT", "/tmp/cert.pem"),
                ("TF_GO_PROVIDER_TLS_KEY", "/tmp/key.pem"),
                ("TF_LOG", "trace"),
            ]),
        )
        .unwrap();
        assert_eq!(config.call_timeout, Some(Duration::from_secs(30)));
        assert!(config.has_static_tls());
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn config_from_env_rejects_bad_values() {
        let err = ServerConfig::from_lookup("P", lookup(&[("P_CALL_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, TfplugError::InvalidConfiguration(_)));

        let err = ServerConfig::from_lookup("P", lookup(&[("P_TLS_CERT", "/c")])).unwrap_err();
        assert!(err.to_string().contains("must be set together"));

        let config = ServerConfig::from_lookup("P", lookup(&[("P_CALL_TIMEOUT", "0")])).unwrap();
        assert_eq!(config.call_timeout, None);
    }

    #[test]
    fn generated_certificate_is_advertised_without_padding() {
        let generated = generate_certificate().unwrap();
        assert!(generated.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(generated.key_pem.contains("PRIVATE KEY"));
        assert!(!generated.handshake_cert.ends_with('='));
        let der = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(&generated.handshake_cert)
            .unwrap();
        assert!(!der.is_empty());
    }
}
