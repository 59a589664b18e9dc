use std::time::Duration;

/// Lifecycle settings of the ephemeral store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// How long the connection may sit unused before the reaper releases it
    pub idle_timeout: Duration,

    /// How often the reaper checks for an idle connection
    pub reaper_interval: Duration,

    /// Expiry applied to presence keys so missed cleanups age out
    pub key_ttl: Duration,
}

impl PresenceConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_key_ttl(mut self, key_ttl: Duration) -> Self {
        self.key_ttl = key_ttl;
        self
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            reaper_interval: Duration::from_secs(1),
            key_ttl: Duration::from_secs(3600),
        }
    }
}
