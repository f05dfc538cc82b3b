use serde::{Deserialize, Serialize};
use trifle_common::LoggingConfig;

use crate::error::{Result, TrifleError};

const DEFAULT_LEAF_VALIDITY_DAYS: u32 = 365;
const DEFAULT_AUTHORITY_VALIDITY_DAYS: u32 = 3650;
/// A century. UTCTime encoding still rejects end dates after 2049.
pub const MAX_VALIDITY_DAYS: u32 = 36_525;

/// Settings for a [`CertificateAuthority`](crate::authority::CertificateAuthority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Lifetime of certificates issued from device requests
    #[serde(default = "default_leaf_validity_days")]
    pub leaf_validity_days: u32,

    /// Lifetime of root and subordinate authority certificates
    #[serde(default = "default_authority_validity_days")]
    pub authority_validity_days: u32,

    /// Applied once by the caller through [`LoggingConfig::apply`]
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_leaf_validity_days() -> u32 {
    DEFAULT_LEAF_VALIDITY_DAYS
}

fn default_authority_validity_days() -> u32 {
    DEFAULT_AUTHORITY_VALIDITY_DAYS
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            leaf_validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
            authority_validity_days: DEFAULT_AUTHORITY_VALIDITY_DAYS,
            logging: None,
        }
    }
}

impl AuthorityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leaf_validity_days(mut self, days: u32) -> Self {
        self.leaf_validity_days = days;
        self
    }

    pub fn with_authority_validity_days(mut self, days: u32) -> Self {
        self.authority_validity_days = days;
        self
    }

    pub fn with_logging_config(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrifleError::Serialization(format!("Invalid authority config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TrifleError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.leaf_validity_days == 0 || self.authority_validity_days == 0 {
            return Err(TrifleError::InvalidInput(
                "validity periods must be at least one day".to_string(),
            ));
        }
        let longest = self.leaf_validity_days.max(self.authority_validity_days);
        if longest > MAX_VALIDITY_DAYS {
            return Err(TrifleError::InvalidInput(format!(
                "validity of {longest} days exceeds the {MAX_VALIDITY_DAYS} day limit"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trifle_common::LogLevel;

    #[test]
    fn missing_fields_take_defaults() {
        let config = AuthorityConfig::from_json(r#"{ "leaf_validity_days": 30 }"#).unwrap();
        assert_eq!(config.leaf_validity_days, 30);
        assert_eq!(config.authority_validity_days, 3650);
        assert!(config.logging.is_none());
    }

    #[test]
    fn json_round_trip() {
        let config = AuthorityConfig::new()
            .with_authority_validity_days(720)
            .with_logging_config(LoggingConfig::new().with_default_level(LogLevel::Debug));
        let restored = AuthorityConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn zero_validity_is_rejected() {
        assert!(AuthorityConfig::from_json(r#"{ "leaf_validity_days": 0 }"#).is_err());
    }

    #[test]
    fn oversized_validity_is_rejected() {
        assert!(matches!(
            AuthorityConfig::from_json(r#"{ "authority_validity_days": 4000000000 }"#),
            Err(TrifleError::InvalidInput(_))
        ));
        let config = AuthorityConfig::new().with_leaf_validity_days(MAX_VALIDITY_DAYS + 1);
        assert!(config.validate().is_err());
        assert!(AuthorityConfig::new()
            .with_leaf_validity_days(MAX_VALIDITY_DAYS)
            .validate()
            .is_ok());
    }
}
