//! Process configuration read from the environment
//!
//! Every variable shares the [`ENV_PREFIX`] prefix:
//!
//! - `TF_GO_PROVIDER_CALL_TIMEOUT` seconds before a function call is
//!   abandoned (0 or unset: no deadline)
//! - `TF_GO_PROVIDER_TLS_CERT`, `TF_GO_PROVIDER_TLS_KEY` static TLS files
//! - `TF_GO_PROVIDER_MAX_STEPS` interpreter step budget per call
//! - `TF_GO_PROVIDER_MAX_CALL_DEPTH` interpreter call depth limit

use golite::Options;
use tfplug::{ServerConfig, TfplugError};

pub const ENV_PREFIX: &str = "TF_GO_PROVIDER";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub server: ServerConfig,
    pub interpreter: Options,
}

impl ProviderConfig {
    pub fn from_env() -> tfplug::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> tfplug::Result<Self> {
        let server = ServerConfig::from_lookup(ENV_PREFIX, &lookup)?;

        let mut interpreter = Options::default();
        if let Some(steps) = limit(&lookup, "MAX_STEPS")? {
            interpreter.max_steps = steps;
        }
        if let Some(depth) = limit(&lookup, "MAX_CALL_DEPTH")? {
            interpreter.max_call_depth = depth as usize;
        }

        Ok(Self {
            server,
            interpreter,
        })
    }
}

fn limit(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> tfplug::Result<Option<u64>> {
    let key = format!("{}_{}", ENV_PREFIX, name);
    let Some(raw) = lookup(&key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(TfplugError::InvalidConfiguration(format!(
            "{} must be a positive integer, got {:?}",
            key, raw
        ))),
    }
}
