use miniconf::{Leaf, Tree};
use serde::{Deserialize, Serialize};

/// Heater PWM settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Tree, Serialize, Deserialize)]
pub struct Settings {
    /// PWM period shared by all channels.
    ///
    /// # Value
    /// Milliseconds, non-zero.
    pub period: Leaf<u32>,

    /// Upper bound for the on-time extended by derating.
    ///
    /// # Value
    /// Milliseconds
    pub max_timeout: Leaf<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            period: Leaf(1000),
            max_timeout: Leaf(60_000),
        }
    }
}
