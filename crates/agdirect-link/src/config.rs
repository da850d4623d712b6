use std::time::Duration;

use agdirect_transport::{ConnectConfig, TraceLevel};
use agdirect_wire::WireConfig;
use serde::{Deserialize, Serialize};

/// Default AGDirect server port.
pub const DEFAULT_PORT: u16 = 3456;

/// Connection settings.
///
/// Deserializes from JSON with every field optional:
///
/// ```json
/// { "host": "db.example", "port": 4567, "timeout_ms": 2000, "trace": "calls" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    /// Connect attempts before giving up (at least one is always made).
    pub poll_count: u32,
    /// Pause between connect attempts.
    pub poll_interval_ms: u64,
    /// Connect timeout per attempt. The greeting may take ten times this.
    /// Zero disables both timeouts.
    pub timeout_ms: u64,
    pub trace: TraceLevel,
    /// Emit DUPLICATE / REPEAT markers in outgoing sequences.
    pub compress_sequences: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            poll_count: 3,
            poll_interval_ms: 1000,
            timeout_ms: 5000,
            trace: TraceLevel::Off,
            compress_sequences: false,
        }
    }
}

impl LinkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// How long to wait for the server's first byte.
    pub fn greeting_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms.saturating_mul(10)))
    }

    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            poll_count: self.poll_count,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.timeout(),
        }
    }

    pub fn wire_config(&self) -> WireConfig {
        WireConfig {
            compress_sequences: self.compress_sequences,
            trace_values: self.trace.values(),
        }
    }
}
