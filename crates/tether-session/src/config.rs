//! Session-layer settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the session layer.
///
/// Every field has a default, so a config file only needs to name the
/// values it changes. Durations are written in humantime form:
///
/// ```toml
/// auth_grace = "5s"
/// sweep_interval = "2s 500ms"
/// login_frame_limit = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a connection may stay unauthenticated before the reaper
    /// closes it.
    #[serde(with = "humantime_serde")]
    pub auth_grace: Duration,

    /// Time between timer-driven reaper sweeps.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Only this many bytes of the first frame are read as the login
    /// command; the rest is ignored.
    pub login_frame_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_grace: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(5),
            login_frame_limit: 256,
        }
    }
}
