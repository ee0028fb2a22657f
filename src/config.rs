//! Configuration module

use std::env;

use crate::pipeline::UnavailablePolicy;

/// Placeholder probability served in degraded mode (15.5%)
pub const DEFAULT_DEGRADED_PROBABILITY: f64 = 0.155;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Path to the XGBoost JSON artifact
    pub model_path: String,

    /// Serve a placeholder probability when the model failed to load
    pub degraded_mode: bool,

    /// Placeholder probability (0.0 - 1.0)
    pub degraded_probability: f64,

    pub log_format: LogFormat,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: "models/xgboost_end_model.json".to_string(),
            degraded_mode: false,
            degraded_probability: DEFAULT_DEGRADED_PROBABILITY,
            log_format: LogFormat::Pretty,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: get("HOST").unwrap_or(defaults.host),

            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: get("MODEL_PATH").unwrap_or(defaults.model_path),

            degraded_mode: get("DEGRADED_MODE")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.degraded_mode),

            degraded_probability: get("DEGRADED_PROBABILITY")
                .and_then(|p| p.parse::<f64>().ok())
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, 1.0))
                .unwrap_or(defaults.degraded_probability),

            log_format: match get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => defaults.log_format,
            },

            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn unavailable_policy(&self) -> UnavailablePolicy {
        if self.degraded_mode {
            UnavailablePolicy::Degraded { probability: self.degraded_probability }
        } else {
            UnavailablePolicy::FailClosed
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.port, 8080);
        assert!(!c.degraded_mode);
        assert_eq!(c.log_format, LogFormat::Pretty);
        assert_eq!(c.unavailable_policy(), UnavailablePolicy::FailClosed);
        assert!(!c.is_production());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("PORT", "9000"),
            ("MODEL_PATH", "/srv/model.json"),
            ("LOG_FORMAT", "json"),
            ("ENVIRONMENT", "production"),
        ]);
        assert_eq!(c.port, 9000);
        assert_eq!(c.model_path, "/srv/model.json");
        assert_eq!(c.log_format, LogFormat::Json);
        assert!(c.is_production());
    }

    #[test]
    fn test_degraded_policy() {
        let c = config(&[("DEGRADED_MODE", "true"), ("DEGRADED_PROBABILITY", "0.2")]);
        assert_eq!(
            c.unavailable_policy(),
            UnavailablePolicy::Degraded { probability: 0.2 }
        );

        let c = config(&[("DEGRADED_MODE", "yes"), ("DEGRADED_PROBABILITY", "7")]);
        assert_eq!(
            c.unavailable_policy(),
            UnavailablePolicy::Degraded { probability: 1.0 }
        );
    }

    #[test]
    fn test_bad_values_fall_back() {
        let c = config(&[("PORT", "http"), ("DEGRADED_PROBABILITY", "NaN"), ("DEGRADED_MODE", "maybe")]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.degraded_probability, DEFAULT_DEGRADED_PROBABILITY);
        assert!(!c.degraded_mode);
    }
}
