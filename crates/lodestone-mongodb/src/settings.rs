//! Environment-driven connection settings
//!
//! ```text
//! LODESTONE_MONGODB_URI       connection string (default mongodb://localhost:27017)
//! LODESTONE_DATABASE          database name (default lodestone)
//! LODESTONE_MAX_POOL_SIZE     maximum pool size
//! LODESTONE_APP_NAME          application name reported to the server
//! LODESTONE_VALIDATE_QUERIES  reject $where/$function/$accumulator (true/false)
//! ```

use lodestone_common::{LodestoneError, Result};

use crate::connection::PoolConfig;

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "lodestone";

/// Everything needed to open a [`Connection`](crate::Connection)
#[derive(Debug, Clone)]
pub struct Settings {
    pub uri: String,
    pub database: String,
    pub pool: PoolConfig,
    /// Screen filters and pipelines for server-side JavaScript operators
    pub validate_queries: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            pool: PoolConfig::default(),
            validate_queries: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(uri) = lookup("LODESTONE_MONGODB_URI") {
            settings.uri = uri;
        }
        if let Some(database) = lookup("LODESTONE_DATABASE") {
            settings.database = database;
        }
        if let Some(raw) = lookup("LODESTONE_MAX_POOL_SIZE") {
            let size = raw.trim().parse::<u32>().map_err(|_| {
                LodestoneError::Configuration(format!(
                    "LODESTONE_MAX_POOL_SIZE must be a positive integer, got '{}'",
                    raw
                ))
            })?;
            settings.pool.max_pool_size = Some(size);
        }
        if let Some(app) = lookup("LODESTONE_APP_NAME") {
            settings.pool.app_name = Some(app);
        }
        if let Some(raw) = lookup("LODESTONE_VALIDATE_QUERIES") {
            settings.validate_queries = parse_bool("LODESTONE_VALIDATE_QUERIES", &raw)?;
        }

        Ok(settings)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LodestoneError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.uri, DEFAULT_URI);
        assert_eq!(settings.database, DEFAULT_DATABASE);
        assert!(!settings.validate_queries);
        assert_eq!(settings.pool.max_pool_size, Some(10));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("LODESTONE_MONGODB_URI", "mongodb://db.internal:27017"),
            ("LODESTONE_DATABASE", "blog"),
            ("LODESTONE_MAX_POOL_SIZE", "32"),
            ("LODESTONE_APP_NAME", "blog-api"),
            ("LODESTONE_VALIDATE_QUERIES", "yes"),
        ]))
        .unwrap();

        assert_eq!(settings.uri, "mongodb://db.internal:27017");
        assert_eq!(settings.database, "blog");
        assert_eq!(settings.pool.max_pool_size, Some(32));
        assert_eq!(settings.pool.app_name.as_deref(), Some("blog-api"));
        assert!(settings.validate_queries);
    }

    #[test]
    fn test_bad_pool_size() {
        let err = Settings::from_lookup(lookup_from(&[("LODESTONE_MAX_POOL_SIZE", "many")]))
            .unwrap_err();
        assert!(matches!(err, LodestoneError::Configuration(_)));
    }

    #[test]
    fn test_bad_bool() {
        let err = Settings::from_lookup(lookup_from(&[("LODESTONE_VALIDATE_QUERIES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, LodestoneError::Configuration(_)));
    }
}
