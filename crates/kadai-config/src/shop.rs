//! Typed view over the merged config JSON.
//!
//! Every section is optional in YAML; missing keys fall back to the defaults
//! below, which match `config/base.yaml`.

use anyhow::{bail, Context, Result};
use kadai_lifecycle::CheckoutFlow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub images: ImagesConfig,
    pub checkout: CheckoutConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8898".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name of the env var holding the Postgres URL. Unset var → in-memory store.
    pub url_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "KADAI_DATABASE_URL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Name of the env var holding the admin password.
    pub password_env: String,
    pub session_ttl_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password_env: "KADAI_ADMIN_PASSWORD".to_string(),
            session_ttl_secs: 12 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Cdn,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local: LocalStorageConfig,
    pub cdn: CdnStorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    pub root: String,
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: "data/objects".to_string(),
            public_base_url: "http://127.0.0.1:8898/objects".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnStorageConfig {
    pub upload_url: String,
    /// Unsigned upload preset name (not a credential).
    pub upload_preset: String,
    /// Optional root prefix for the CDN folder; the key's own directory
    /// (`products`, `payment_screenshots/<owner>`) is appended.
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub name_min_chars: usize,
    pub description_min_chars: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            name_min_chars: 3,
            description_min_chars: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub max_bytes: usize,
    pub accepted_types: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            accepted_types: ["image/jpeg", "image/png", "image/webp", "image/gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ImagesConfig {
    pub fn accepts(&self, content_type: &str) -> bool {
        let ct = content_type.trim().to_ascii_lowercase();
        self.accepted_types.iter().any(|t| t.eq_ignore_ascii_case(&ct))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub flow: CheckoutFlow,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            flow: CheckoutFlow::PaymentProof,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub path: String,
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: "data/audit/transitions.jsonl".to_string(),
            hash_chain: true,
        }
    }
}

impl ShopConfig {
    /// Extract and sanity-check the typed config from merged JSON.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: ShopConfig =
            serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: shape mismatch")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.admin.session_ttl_secs == 0 {
            bail!("CONFIG_INVALID: admin.session_ttl_secs must be > 0");
        }
        if self.images.max_bytes == 0 {
            bail!("CONFIG_INVALID: images.max_bytes must be > 0");
        }
        if self.images.accepted_types.is_empty() {
            bail!("CONFIG_INVALID: images.accepted_types must not be empty");
        }
        if self.storage.backend == StorageBackend::Cdn {
            if self.storage.cdn.upload_url.trim().is_empty() {
                bail!("CONFIG_INVALID: storage.cdn.upload_url is required when backend=cdn");
            }
            if self.storage.cdn.upload_preset.trim().is_empty() {
                bail!("CONFIG_INVALID: storage.cdn.upload_preset is required when backend=cdn");
            }
        }
        Ok(())
    }
}
