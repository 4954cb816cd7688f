//! Engine configuration

use std::path::Path;

use crowdsale_types::{CrowdsaleError, CrowdsaleResult};
use serde::{Deserialize, Serialize};

const DAY_SECS: i64 = 24 * 60 * 60;

/// Engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdsaleConfig {
    pub limits: ProjectLimits,
    pub finalization: FinalizationConfig,
    pub audit: AuditConfig,
}

/// Bounds applied to `createProject` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectLimits {
    pub max_owners: usize,
    pub min_duration_secs: i64,
    pub max_duration_secs: i64,
    pub max_metadata_bytes: usize,
}

impl Default for ProjectLimits {
    fn default() -> Self {
        Self {
            max_owners: 32,
            min_duration_secs: 0,
            max_duration_secs: 365 * DAY_SECS,
            max_metadata_bytes: 4096,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizationConfig {
    /// Reject `finalize` until the campaign deadline has passed.
    pub require_deadline_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl CrowdsaleConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> CrowdsaleResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            CrowdsaleError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> CrowdsaleResult<Self> {
        let config: CrowdsaleConfig =
            toml::from_str(contents).map_err(|e| CrowdsaleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CrowdsaleResult<()> {
        let limits = &self.limits;
        if limits.max_owners == 0 {
            return Err(CrowdsaleError::Config(
                "limits.max_owners must be at least 1".into(),
            ));
        }
        if limits.min_duration_secs < 0 || limits.min_duration_secs > limits.max_duration_secs {
            return Err(CrowdsaleError::Config(format!(
                "invalid duration bounds [{}, {}]",
                limits.min_duration_secs, limits.max_duration_secs
            )));
        }
        Ok(())
    }
}
