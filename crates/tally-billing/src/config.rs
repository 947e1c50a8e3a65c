use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// Configuration for [`InMemoryLineStore`](crate::InMemoryLineStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Bump `updated_at` of lines and detailed lines whose descendants
    /// changed while their own columns did not.
    pub touch_affected_ancestors: bool,
    /// Validate every created or updated entity before writing.
    pub validate_expected: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            touch_affected_ancestors: true,
            validate_expected: true,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> BillingResult<Self> {
        toml::from_str(s).map_err(|e| BillingError::Config(e.to_string()))
    }
}
