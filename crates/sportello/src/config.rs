//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use elenco::{ReservedKeys, UpdateMethod};
use std::time::Duration;

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection and paging settings for the REST endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root that kind paths hang off, e.g. `https://studio.example.com/api`.
    pub base_url: Option<String>,
    pub page_size: u32,
    pub timeout: Duration,
    /// Names no resource attribute may use.
    pub reserved_keys: ReservedKeys,
    pub update_method: UpdateMethod,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reserved_keys: ReservedKeys::new(),
            update_method: UpdateMethod::Put,
        }
    }
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// Reads `ELENCO_BASE_URL`, `ELENCO_PAGE_SIZE`, `ELENCO_TIMEOUT_SECS`,
    /// `ELENCO_RESERVED_KEYS` and `ELENCO_UPDATE_METHOD`, either from the
    /// environment or from a `.env` file. All of them are optional.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        settings.base_url = lookup("ELENCO_BASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(size) = lookup("ELENCO_PAGE_SIZE") {
            settings.page_size = size
                .trim()
                .parse()
                .with_context(|| format!("ELENCO_PAGE_SIZE is not a number: {size}"))?;
        }

        if let Some(secs) = lookup("ELENCO_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("ELENCO_TIMEOUT_SECS is not a number: {secs}"))?;
            settings.timeout = Duration::from_secs(secs);
        }

        if let Some(keys) = lookup("ELENCO_RESERVED_KEYS") {
            settings.reserved_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(method) = lookup("ELENCO_UPDATE_METHOD") {
            settings.update_method = method
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid ELENCO_UPDATE_METHOD")?;
        }

        Ok(settings)
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
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_settings_from_vars() {
        let settings = Settings::from_lookup(lookup(&[
            ("ELENCO_BASE_URL", "https://studio.example.com/api"),
            ("ELENCO_PAGE_SIZE", "5"),
            ("ELENCO_TIMEOUT_SECS", "3"),
            ("ELENCO_RESERVED_KEYS", "id, parent_url , ,"),
            ("ELENCO_UPDATE_METHOD", "patch"),
        ]))
        .unwrap();

        assert_eq!(settings.base_url.as_deref(), Some("https://studio.example.com/api"));
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.reserved_keys.len(), 2);
        assert!(settings.reserved_keys.contains("parent_url"));
        assert_eq!(settings.update_method, UpdateMethod::Patch);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = Settings::from_lookup(lookup(&[("ELENCO_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ELENCO_PAGE_SIZE"));

        let err = Settings::from_lookup(lookup(&[("ELENCO_UPDATE_METHOD", "post")])).unwrap_err();
        assert!(err.to_string().contains("ELENCO_UPDATE_METHOD"));
    }

    #[test]
    fn test_blank_base_url_is_unset() {
        let settings = Settings::from_lookup(lookup(&[("ELENCO_BASE_URL", "  ")])).unwrap();
        assert!(settings.base_url.is_none());
    }
}
