//! Session tuning, loadable from JSON

use crate::wifi::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Status polls before a connect attempt is abandoned
    pub max_connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    /// Append a payload checksum to RPC responses (BLE-style responses).
    /// Serial frames always carry their own frame checksum.
    pub rpc_response_checksum: bool,
    /// Answer frames that fail their checksum with ERROR_STATE(INVALID_RPC)
    pub report_checksum_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_connect_attempts: retry.max_attempts,
            connect_retry_delay_ms: retry.delay.as_millis() as u64,
            rpc_response_checksum: false,
            report_checksum_errors: false,
        }
    }
}

impl SessionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_connect_attempts,
            delay: Duration::from_millis(self.connect_retry_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_timing() {
        let config = SessionConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy { max_attempts: 20, delay: Duration::from_millis(500) });
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"max_connect_attempts": 3}"#).unwrap();
        assert_eq!(config.max_connect_attempts, 3);
        assert_eq!(config.connect_retry_delay_ms, 500);
        assert!(!config.report_checksum_errors);
    }

    #[test]
    fn buffer_size_is_not_configurable() {
        let config: SessionConfig = serde_json::from_str(r#"{"parser_capacity": 16}"#).unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}
