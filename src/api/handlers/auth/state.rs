//! Auth configuration and shared state.

use std::sync::Arc;

use super::lockout::LockoutPolicy;

const DEFAULT_PAIRING_CODE_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_DEVICE_CHALLENGE_TTL_SECONDS: i64 = 2 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pairing_code_ttl_seconds: i64,
    device_challenge_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairing_code_ttl_seconds: DEFAULT_PAIRING_CODE_TTL_SECONDS,
            device_challenge_ttl_seconds: DEFAULT_DEVICE_CHALLENGE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_pairing_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.pairing_code_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_device_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.device_challenge_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn pairing_code_ttl_seconds(&self) -> i64 {
        self.pairing_code_ttl_seconds
    }

    #[must_use]
    pub fn device_challenge_ttl_seconds(&self) -> i64 {
        self.device_challenge_ttl_seconds
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    lockout: Arc<dyn LockoutPolicy>,
}

impl AuthState {
    pub fn new(config: AuthConfig, lockout: Arc<dyn LockoutPolicy>) -> Self {
        Self { config, lockout }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn lockout(&self) -> &dyn LockoutPolicy {
        self.lockout.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::lockout::{LockoutPolicy, NoLockout};
    use super::{AuthConfig, AuthState};
    use std::sync::Arc;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(
            config.pairing_code_ttl_seconds(),
            super::DEFAULT_PAIRING_CODE_TTL_SECONDS
        );
        assert_eq!(
            config.device_challenge_ttl_seconds(),
            super::DEFAULT_DEVICE_CHALLENGE_TTL_SECONDS
        );

        let config = config
            .with_pairing_code_ttl_seconds(60)
            .with_device_challenge_ttl_seconds(30);
        assert_eq!(config.pairing_code_ttl_seconds(), 60);
        assert_eq!(config.device_challenge_ttl_seconds(), 30);
    }

    #[test]
    fn auth_config_floors_zero_ttls() {
        let config = AuthConfig::new()
            .with_pairing_code_ttl_seconds(0)
            .with_device_challenge_ttl_seconds(-5);
        assert_eq!(config.pairing_code_ttl_seconds(), 1);
        assert_eq!(config.device_challenge_ttl_seconds(), 1);
    }

    #[test]
    fn auth_state_exposes_policy() {
        let lockout: Arc<dyn LockoutPolicy> = Arc::new(NoLockout);
        let state = AuthState::new(AuthConfig::new(), lockout);
        assert_eq!(state.lockout().threshold(), i32::MAX);
    }
}
