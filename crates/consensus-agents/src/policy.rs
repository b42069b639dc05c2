//! Per-model timeout policy.
//!
//! Every call shares one connect timeout. Read timeouts come from an
//! explicit override table keyed by exact model id, falling back to a
//! default; slow reasoning models get a larger allowance without
//! starving the fast ones.
//!
//! | Model              | Read timeout |
//! |--------------------|--------------|
//! | `deepseek-r1:1.5b` | 500 s        |
//! | anything else      | 120 s        |

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;
/// Allowance for the bundled slow reasoning model.
pub const SLOW_MODEL_READ_TIMEOUT_SECS: u64 = 500;
pub const SLOW_MODEL_ID: &str = "deepseek-r1:1.5b";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    pub connect_timeout_secs: u64,
    pub default_read_timeout_secs: u64,
    /// model id → read timeout in seconds
    pub overrides: BTreeMap<String, u64>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(SLOW_MODEL_ID.to_string(), SLOW_MODEL_READ_TIMEOUT_SECS);
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            default_read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            overrides,
        }
    }
}

impl TimeoutPolicy {
    /// Policy with no overrides.
    pub fn uniform(connect: Duration, read: Duration) -> Self {
        Self {
            connect_timeout_secs: connect.as_secs(),
            default_read_timeout_secs: read.as_secs(),
            overrides: BTreeMap::new(),
        }
    }

    /// Set or replace the read timeout for one model.
    pub fn with_override(mut self, model_id: impl Into<String>, read: Duration) -> Self {
        self.overrides.insert(model_id.into(), read.as_secs());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout for `model_id`: exact override, else the default.
    pub fn read_timeout_for(&self, model_id: &str) -> Duration {
        let secs = self
            .overrides
            .get(model_id)
            .copied()
            .unwrap_or(self.default_read_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Validate the policy; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be > 0".to_string());
        }
        if self.default_read_timeout_secs == 0 {
            return Err("default_read_timeout_secs must be > 0".to_string());
        }
        if let Some((model, _)) = self.overrides.iter().find(|(_, secs)| **secs == 0) {
            return Err(format!("read timeout override for {model} must be > 0"));
        }
        Ok(())
    }
}
