use crate::keepalive::{KeepAlivePolicy, DEFAULT_PING_INTERVAL};
use crate::types::EnvScale;
use std::time::Duration;

/// Upper bound for one blocking read in the capture loop, and therefore for
/// the latency of a stop request.
pub const DEFAULT_READ_TIMEOUT_MS: i32 = 500;

/// Tunables for a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureParams {
    pub read_timeout_ms: i32,
    pub keepalive: KeepAlivePolicy,
    /// Pressure/humidity units used by the connected firmware.
    pub env_scale: EnvScale,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            keepalive: KeepAlivePolicy::default(),
            env_scale: EnvScale::default(),
        }
    }
}

impl CaptureParams {
    /// Defaults overridden by environment variables:
    ///
    /// - `ZED_SENSORS_READ_TIMEOUT_MS`
    /// - `ZED_SENSORS_KEEPALIVE_ITERATIONS` (wins over the interval when set)
    /// - `ZED_SENSORS_KEEPALIVE_MS`
    /// - `ZED_SENSORS_ENV_SCALE` = `current` | `legacy`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read_timeout_ms = read_u64(&lookup, "ZED_SENSORS_READ_TIMEOUT_MS")
            .and_then(|v| i32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_READ_TIMEOUT_MS);

        let keepalive = match read_u64(&lookup, "ZED_SENSORS_KEEPALIVE_ITERATIONS") {
            Some(n) => KeepAlivePolicy::EveryIterations(n.min(u32::MAX as u64) as u32),
            None => KeepAlivePolicy::Interval(
                read_u64(&lookup, "ZED_SENSORS_KEEPALIVE_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_PING_INTERVAL),
            ),
        };

        let env_scale = match read_string(&lookup, "ZED_SENSORS_ENV_SCALE").as_deref() {
            None | Some("current") => EnvScale::Current,
            Some("legacy") => EnvScale::Legacy,
            Some(other) => {
                log::warn!(
                    "Unknown ZED_SENSORS_ENV_SCALE='{}', using current (supported: current|legacy)",
                    other
                );
                EnvScale::Current
            }
        };

        Self {
            read_timeout_ms,
            keepalive,
            env_scale,
        }
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = read_string(lookup, name)?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {}='{}': not an unsigned integer", name, raw);
            None
        }
    }
}
