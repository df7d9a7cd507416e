//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`admin.password_env`,
//! `database.url_env`). Binaries call [`resolve_secrets`] once at startup and
//! pass the result into constructors. `Debug` output redacts every value, and
//! error messages mention the variable NAME only.

use anyhow::{bail, Result};

use crate::ShopConfig;

/// All runtime-resolved secrets for one process.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Admin console password. `None` disables admin login.
    pub admin_password: Option<String>,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    admin_password_var: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// The admin password, or an error naming the env var that should hold it.
    pub fn require_admin_password(&self) -> Result<&str> {
        match self.admin_password.as_deref() {
            Some(p) => Ok(p),
            None => bail!(
                "SECRETS_MISSING: env var '{}' (admin password) is not set or empty",
                self.admin_password_var
            ),
        }
    }
}

/// Unset or blank → `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &ShopConfig) -> ResolvedSecrets {
    ResolvedSecrets {
        admin_password: resolve_env(cfg.admin.password_env.trim()),
        database_url: resolve_env(cfg.database.url_env.trim()),
        admin_password_var: cfg.admin.password_env.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_values() {
        let s = ResolvedSecrets {
            admin_password: Some("hunter2-very-secret".into()),
            database_url: Some("postgres://u:p@h/db".into()),
            admin_password_var: "X".into(),
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("postgres://"));
        assert!(dbg.contains("<REDACTED>"));
    }

    #[test]
    fn missing_password_error_names_the_var() {
        let s = ResolvedSecrets {
            admin_password: None,
            database_url: None,
            admin_password_var: "KADAI_TEST_ADMIN_PW".into(),
        };
        let err = s.require_admin_password().unwrap_err().to_string();
        assert!(err.contains("KADAI_TEST_ADMIN_PW"));
    }
}
