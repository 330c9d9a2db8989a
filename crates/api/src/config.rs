//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use fulfillment::{AssetLocations, ShippingConfig};
use thiserror::Error;

/// Origin allowed by CORS in production.
pub const PRODUCTION_ORIGIN: &str = "https://fairway-ink.com";

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Prod,
    #[default]
    Dev,
    Designs,
}

impl AppEnv {
    /// Parses `APP_ENV`. Unknown values fall back to `Dev`.
    pub fn parse(value: &str) -> Self {
        match value {
            "prod" => AppEnv::Prod,
            "designs" => AppEnv::Designs,
            _ => AppEnv::Dev,
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, AppEnv::Prod)
    }
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `5000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `APP_ENV`: `prod`, `dev` or `designs` (default: `dev`)
/// - `DATABASE_URL`, `STRIPE_KEY`, `EASYPOST_KEY`, `STL_S3_BUCKET`,
///   `S3_REGION`: required
/// - `OUTPUT_DIR`: per-session model output (default: `./output`)
/// - `DESIGNS_DIR`: shared designs (default: `../designs`)
/// - `CORS_ORIGIN`: allowed origin (default: the storefront in prod, any
///   origin otherwise)
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub app_env: AppEnv,
    pub database_url: String,
    pub stripe_key: String,
    pub easypost_key: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub cors_origin: Option<String>,
    pub shipping: ShippingConfig,
    pub assets: AssetLocations,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => 5000,
        };
        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or_default();
        let cors_origin = get("CORS_ORIGIN").or_else(|| {
            app_env
                .is_prod()
                .then(|| PRODUCTION_ORIGIN.to_string())
        });

        let defaults = AssetLocations::default();
        let assets = AssetLocations {
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            designs_dir: get("DESIGNS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.designs_dir),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            app_env,
            database_url: required("DATABASE_URL")?,
            stripe_key: required("STRIPE_KEY")?,
            easypost_key: required("EASYPOST_KEY")?,
            s3_bucket: required("STL_S3_BUCKET")?,
            s3_region: required("S3_REGION")?,
            cors_origin,
            shipping: ShippingConfig::default(),
            assets,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("app_env", &self.app_env)
            .field("database_url", &"<redacted>")
            .field("stripe_key", &"<redacted>")
            .field("easypost_key", &"<redacted>")
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("cors_origin", &self.cors_origin)
            .field("assets", &self.assets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/fulfillment"),
        ("STRIPE_KEY", "sk_test_123"),
        ("EASYPOST_KEY", "EZTK123"),
        ("STL_S3_BUCKET", "stl-bucket"),
        ("S3_REGION", "us-east-2"),
    ];

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(env(REQUIRED)).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.app_env, AppEnv::Dev);
        assert_eq!(config.cors_origin, None);
        assert_eq!(config.assets.output_dir, PathBuf::from("./output"));
        assert_eq!(config.assets.designs_dir, PathBuf::from("../designs"));
        assert_eq!(config.shipping.sender.zip, "43822");
    }

    #[test]
    fn test_missing_required_variable() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "EASYPOST_KEY")
            .collect();
        let err = Config::from_lookup(env(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("EASYPOST_KEY"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = Config::from_lookup(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_prod_restricts_cors() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("APP_ENV", "prod"));
        let config = Config::from_lookup(env(&vars)).unwrap();
        assert_eq!(config.cors_origin.as_deref(), Some(PRODUCTION_ORIGIN));
    }

    #[test]
    fn test_unknown_app_env_is_dev() {
        assert_eq!(AppEnv::parse("staging"), AppEnv::Dev);
        assert_eq!(AppEnv::parse("designs"), AppEnv::Designs);
    }

    #[test]
    fn test_addr_and_debug_redaction() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("HOST", "127.0.0.1"), ("PORT", "8080")]);
        let config = Config::from_lookup(env(&vars)).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080");

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_123"));
        assert!(debug.contains("<redacted>"));
    }
}
