//! Command handler modules for kadai-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod catalog;
pub mod orders;
pub mod relay;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use kadai_audit::VerifyResult;
use kadai_config::{
    report_unused_keys, secrets::resolve_secrets, ConfigConsumer, ShopConfig, UnusedKeyPolicy,
};
use kadai_db::{DocumentStore, PgStore};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Layered config from `KADAI_CONFIG`. Unused keys only warn on the CLI.
pub fn load_config() -> Result<ShopConfig> {
    let (loaded, cfg) = kadai_config::load_shop_config_from_env().context("load config failed")?;
    let report = report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS consumer={} count={}",
            report.consumer,
            report.unused_leaf_pointers.len()
        );
        for p in &report.unused_leaf_pointers {
            eprintln!("  unused={}", p);
        }
    }
    Ok(cfg)
}

/// Postgres pool from the env var named by `database.url_env`.
///
/// Unlike the daemon there is no in-memory fallback: a CLI write to a store
/// that vanishes on exit would be meaningless.
pub async fn connect_db() -> Result<PgPool> {
    let cfg = load_config()?;
    let url = database_url(&cfg)?;
    kadai_db::connect(&url).await
}

/// Document store over Postgres for catalog and order commands.
pub async fn open_store(cfg: &ShopConfig) -> Result<Arc<dyn DocumentStore>> {
    let url = database_url(cfg)?;
    let pg = PgStore::connect(&url)
        .await
        .context("connect document store failed")?;
    Ok(Arc::new(pg))
}

fn database_url(cfg: &ShopConfig) -> Result<String> {
    match resolve_secrets(cfg).database_url {
        Some(url) => Ok(url),
        None => bail!(
            "SECRETS_MISSING: env var '{}' (database url) is not set or empty",
            cfg.database.url_env
        ),
    }
}

/// `kadai audit verify`. A broken chain is an error so scripts see a non-zero exit.
pub fn audit_verify(path: Option<String>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => load_config()?.audit.path,
    };

    match kadai_audit::verify_hash_chain(&path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_chain=valid lines={} path={}", lines, path);
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_chain=broken line={} path={}", line, path);
            bail!("AUDIT_CHAIN_BROKEN at line {}: {}", line, reason)
        }
    }
}
