// Path: crates/types/src/config/mod.rs
//! Kernel configuration resolved from the environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// The artifact storage backend selected at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Local filesystem blobs under `DATA_DIR`.
    Fs,
    /// S3-compatible object storage.
    S3,
    /// Google Cloud Storage.
    Gcs,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The selected backend.
    pub kind: StorageKind,
    /// Base directory for the filesystem backend.
    pub data_dir: String,
    /// Bucket name for object-store backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Key prefix for object-store backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Region for object-store backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// OTLP export configuration. The exporter itself is an external
/// collaborator; the kernel only carries its settings into the environment
/// fingerprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtlpConfig {
    /// Collector endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Trace sample rate in parts per million.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_ppm: Option<u32>,
    /// TLS client certificate path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<String>,
    /// TLS client key path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key_path: Option<String>,
}

/// The kernel's boot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Artifact storage settings.
    pub storage: StorageConfig,
    /// Log filter, e.g. `"info"` or `"helm_guardian=debug"`.
    pub log_level: String,
    /// Listen port for the external HTTP surface.
    pub port: u16,
    /// Database URL for the durable ledger backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// When set, decisions are evaluated and recorded but intents are never
    /// issued.
    pub shadow_mode: bool,
    /// OTLP export settings.
    pub otlp: OtlpConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                kind: StorageKind::Fs,
                data_dir: "./data".to_string(),
                bucket: None,
                prefix: None,
                region: None,
                endpoint: None,
            },
            log_level: "info".to_string(),
            port: 8080,
            database_url: None,
            shadow_mode: false,
            otlp: OtlpConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Resolves configuration from the process environment.
    ///
    /// Recognized variables: `ARTIFACT_STORAGE_TYPE` (`fs`|`s3`|`gcs`),
    /// `DATA_DIR`, `STORAGE_BUCKET`, `STORAGE_PREFIX`, `STORAGE_REGION`,
    /// `STORAGE_ENDPOINT`, `LOG_LEVEL`, `PORT`, `DATABASE_URL`,
    /// `SHADOW_MODE`, `OTLP_ENDPOINT`, `OTLP_SAMPLE_RATE_PPM`,
    /// `OTLP_TLS_CERT`, `OTLP_TLS_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ARTIFACT_STORAGE_TYPE") {
            config.storage.kind = match raw.as_str() {
                "fs" => StorageKind::Fs,
                "s3" => StorageKind::S3,
                "gcs" => StorageKind::Gcs,
                other => return Err(ConfigError::InvalidStorageType(other.to_string())),
            };
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.storage.data_dir = dir;
        }
        config.storage.bucket = std::env::var("STORAGE_BUCKET").ok();
        config.storage.prefix = std::env::var("STORAGE_PREFIX").ok();
        config.storage.region = std::env::var("STORAGE_REGION").ok();
        config.storage.endpoint = std::env::var("STORAGE_ENDPOINT").ok();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(raw) = std::env::var("PORT") {
            config.port = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?;
        }
        config.database_url = std::env::var("DATABASE_URL").ok();
        if let Ok(raw) = std::env::var("SHADOW_MODE") {
            config.shadow_mode = matches!(raw.as_str(), "1" | "true" | "TRUE" | "on");
        }

        config.otlp.endpoint = std::env::var("OTLP_ENDPOINT").ok();
        if let Ok(raw) = std::env::var("OTLP_SAMPLE_RATE_PPM") {
            config.otlp.sample_rate_ppm =
                Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "OTLP_SAMPLE_RATE_PPM",
                    value: raw,
                })?);
        }
        config.otlp.tls_cert_path = std::env::var("OTLP_TLS_CERT").ok();
        config.otlp.tls_key_path = std::env::var("OTLP_TLS_KEY").ok();

        Ok(config)
    }
}
