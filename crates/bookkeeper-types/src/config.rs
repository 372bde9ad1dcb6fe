//! Configuration types for a Bookkeeper deployment.

use serde::{Deserialize, Serialize};

use crate::{Address, BookkeeperError, Result, constants};

/// The signing domain every blueprint hash is bound to.
///
/// Two deployments that differ in any field produce different hashes for
/// bitwise-identical blueprints, so a signature is only ever valid for the
/// deployment and protocol version it was made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    /// Protocol name (e.g., "Bookkeeper").
    pub protocol_name: String,
    /// Protocol version (e.g., "1.0.0").
    pub protocol_version: String,
    /// Deployment realm / chain identifier.
    pub realm_id: u64,
    /// Identity of the verifying authority (the deployed bookkeeper).
    pub authority: Address,
}

impl SigningDomain {
    /// Domain for the given realm and authority with the current protocol
    /// name and version.
    #[must_use]
    pub fn new(realm_id: u64, authority: Address) -> Self {
        Self {
            protocol_name: constants::PROTOCOL_NAME.to_string(),
            protocol_version: constants::PROTOCOL_VERSION.to_string(),
            realm_id,
            authority,
        }
    }
}

impl Default for SigningDomain {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_REALM_ID,
            Address::derive("bookkeeper:authority"),
        )
    }
}

/// Top-level configuration for a bookkeeper instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookkeeperConfig {
    /// Signing domain for blueprint verification.
    pub domain: SigningDomain,
    /// How many closed agreement IDs to remember.
    pub closed_agreement_cache_size: usize,
}

impl Default for BookkeeperConfig {
    fn default() -> Self {
        Self {
            domain: SigningDomain::default(),
            closed_agreement_cache_size: constants::DEFAULT_CLOSED_AGREEMENT_CACHE_SIZE,
        }
    }
}

impl BookkeeperConfig {
    /// Parse a config from JSON and validate it.
    ///
    /// # Errors
    /// `Configuration` if the JSON is malformed or a field is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| BookkeeperError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check field-level invariants.
    ///
    /// # Errors
    /// `Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.domain.protocol_name.is_empty() {
            return Err(BookkeeperError::Configuration(
                "domain.protocol_name must not be empty".to_string(),
            ));
        }
        if self.domain.protocol_version.is_empty() {
            return Err(BookkeeperError::Configuration(
                "domain.protocol_version must not be empty".to_string(),
            ));
        }
        if self.closed_agreement_cache_size == 0 {
            return Err(BookkeeperError::Configuration(
                "closed_agreement_cache_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = BookkeeperConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.domain.protocol_name, "Bookkeeper");
        assert_eq!(cfg.domain.realm_id, 1);
    }

    #[test]
    fn config_json_roundtrip() {
        let cfg = BookkeeperConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = BookkeeperConfig::from_json(&json).unwrap();
        assert_eq!(cfg.domain, back.domain);
        assert_eq!(
            cfg.closed_agreement_cache_size,
            back.closed_agreement_cache_size
        );
    }

    #[test]
    fn zero_cache_size_rejected() {
        let mut cfg = BookkeeperConfig::default();
        cfg.closed_agreement_cache_size = 0;
        let json = serde_json::to_string(&cfg).unwrap();
        let err = BookkeeperConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, BookkeeperError::Configuration(_)));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = BookkeeperConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, BookkeeperError::Configuration(_)));
    }
}
