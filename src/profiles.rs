//! Customer profile lookup.
//!
//! Profiles are optional everywhere: a missing provider, a missing customer
//! or a missing field all fall back to configured defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Historical statistics for one customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Average historical transaction amount
    #[serde(default)]
    pub avg_txn_amount: Option<f64>,
    /// Number of historical transactions
    #[serde(default)]
    pub txn_count: Option<u64>,
    /// Typical deviation of amounts from the average
    #[serde(default)]
    pub amt_deviation: Option<f64>,
}

impl CustomerProfile {
    pub fn with_avg_txn_amount(avg_txn_amount: f64) -> Self {
        Self {
            avg_txn_amount: Some(avg_txn_amount),
            ..Self::default()
        }
    }
}

/// Source of customer profiles
pub trait ProfileProvider: Send + Sync {
    fn profile(&self, customer_id: &str) -> Option<CustomerProfile>;
}

/// Provider used when no profile source is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfiles;

impl ProfileProvider for NoProfiles {
    fn profile(&self, _customer_id: &str) -> Option<CustomerProfile> {
        None
    }
}

/// Read-only in-memory profile table
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    profiles: HashMap<String, CustomerProfile>,
}

impl StaticProfiles {
    pub fn new(profiles: HashMap<String, CustomerProfile>) -> Self {
        Self { profiles }
    }

    /// Load a `{ "customer_id": { "avg_txn_amount": ... }, ... }` JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profiles from {}", path.display()))?;
        let profiles: HashMap<String, CustomerProfile> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse profiles in {}", path.display()))?;
        Ok(Self::new(profiles))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileProvider for StaticProfiles {
    fn profile(&self, customer_id: &str) -> Option<CustomerProfile> {
        self.profiles.get(customer_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_no_profiles() {
        assert_eq!(NoProfiles.profile("C-1"), None);
    }

    #[test]
    fn test_static_profiles_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"C-1": {{"avg_txn_amount": 120.5, "txn_count": 42}}, "C-2": {{}}}}"#
        )
        .unwrap();

        let profiles = StaticProfiles::from_json_file(file.path()).unwrap();
        assert_eq!(profiles.len(), 2);

        let c1 = profiles.profile("C-1").unwrap();
        assert_eq!(c1.avg_txn_amount, Some(120.5));
        assert_eq!(c1.txn_count, Some(42));
        assert_eq!(c1.amt_deviation, None);

        assert_eq!(profiles.profile("C-2"), Some(CustomerProfile::default()));
        assert_eq!(profiles.profile("C-3"), None);
    }

    #[test]
    fn test_malformed_profiles_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(StaticProfiles::from_json_file(file.path()).is_err());
    }
}
