//! Presence configuration.

use std::time::Duration;

/// What to do when a player connects while already online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The newest connection wins. The previous channel receives
    /// `Kicked { DUPLICATE_LOGIN }` and is replaced in the registry.
    #[default]
    KickPrevious,

    /// The existing connection wins. The new channel receives
    /// `Kicked { DUPLICATE_LOGIN }` and is never registered.
    RejectNew,
}

/// Settings for [`PresenceService`](crate::PresenceService).
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Upper bound on a single push. A push that takes longer counts as
    /// a timeout and evicts the recipient.
    pub push_timeout: Duration,

    /// Duplicate-connection handling.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_secs(5),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_config_default() {
        let config = PresenceConfig::default();
        assert_eq!(config.push_timeout, Duration::from_secs(5));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KickPrevious);
    }
}
