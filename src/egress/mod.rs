//! Egress rotation
//!
//! Every egress profile is one network exit point: a WireGuard tunnel, a
//! SOCKS5 relay, or the machine's own connection. Profiles are used one at a
//! time and in order; each is acquired, used for every unfinished target and
//! released before the next one is touched.

mod provider;
mod rotation;
mod session;

pub use provider::{DirectProvider, EgressProvider, Socks5Provider, WireGuardProvider};
pub use rotation::{probe_identity, EgressRotation};
pub use session::{with_egress, SessionOutcome};

use crate::config::{EgressConfig, ProviderKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One configured egress point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressProfile {
    /// Display name used in logs and the report
    pub name: String,

    /// Provider-specific locator: a config file path or a `host:port` relay
    pub locator: String,
}

impl EgressProfile {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }

    /// Names a WireGuard profile after its config file stem
    pub fn wireguard(path: &str) -> Self {
        let name = Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(path);
        Self::new(name, path)
    }

    pub fn socks5(address: &str) -> Self {
        Self::new(address, address)
    }

    pub fn direct() -> Self {
        Self::new("direct", "")
    }
}

/// What a fetcher needs to know to route through an acquired egress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressRoute {
    /// Name of the profile the route belongs to
    pub profile: String,

    /// Proxy URL requests must go through, if any
    pub proxy: Option<String>,
}

/// An established egress, released exactly once
#[derive(Debug)]
pub struct EgressHandle {
    profile: EgressProfile,
    route: EgressRoute,
    released: bool,
}

impl EgressHandle {
    pub fn new(profile: EgressProfile, proxy: Option<String>) -> Self {
        let route = EgressRoute {
            profile: profile.name.clone(),
            proxy,
        };
        Self {
            profile,
            route,
            released: false,
        }
    }

    pub fn profile(&self) -> &EgressProfile {
        &self.profile
    }

    pub fn route(&self) -> &EgressRoute {
        &self.route
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Marks the handle released; false when it already was
    pub fn mark_released(&mut self) -> bool {
        !std::mem::replace(&mut self.released, true)
    }
}

/// Why an egress could not be established
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("{command} exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run command: {0}")]
    Io(#[from] std::io::Error),

    #[error("acquisition timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid profile '{0}'")]
    InvalidProfile(String),
}

/// Builds the ordered profile list for the configured provider
pub fn profiles_from_config(config: &EgressConfig) -> Vec<EgressProfile> {
    match config.provider {
        ProviderKind::Direct => vec![EgressProfile::direct()],
        ProviderKind::Wireguard => config
            .profiles
            .iter()
            .map(|p| EgressProfile::wireguard(p))
            .collect(),
        ProviderKind::Socks5 => config
            .profiles
            .iter()
            .map(|p| EgressProfile::socks5(p.trim()))
            .collect(),
    }
}

/// Builds the configured provider
pub fn provider_from_config(config: &EgressConfig) -> Arc<dyn EgressProvider> {
    match config.provider {
        ProviderKind::Direct => Arc::new(DirectProvider),
        ProviderKind::Wireguard => Arc::new(WireGuardProvider::new(
            config.use_sudo,
            Duration::from_secs(config.settle_secs),
        )),
        ProviderKind::Socks5 => Arc::new(Socks5Provider::new(config.remote_dns)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_released_once() {
        let mut handle = EgressHandle::new(EgressProfile::direct(), None);
        assert!(!handle.is_released());
        assert!(handle.mark_released());
        assert!(!handle.mark_released());
        assert!(handle.is_released());
    }

    #[test]
    fn test_profile_names() {
        let wg = EgressProfile::wireguard("/etc/wireguard/se-got-wg-001.conf");
        assert_eq!(wg.name, "se-got-wg-001");
        assert_eq!(wg.locator, "/etc/wireguard/se-got-wg-001.conf");

        let socks = EgressProfile::socks5("10.64.0.1:1080");
        assert_eq!(socks.name, "10.64.0.1:1080");
    }

    #[test]
    fn test_profiles_from_config() {
        let mut config = EgressConfig::default();
        assert_eq!(profiles_from_config(&config), vec![EgressProfile::direct()]);

        config.provider = ProviderKind::Socks5;
        config.profiles = vec!["10.64.0.1:1080".to_string(), " 10.124.0.1:1080 ".to_string()];
        let profiles = profiles_from_config(&config);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].locator, "10.124.0.1:1080");
    }

    #[test]
    fn test_route_carries_proxy() {
        let handle = EgressHandle::new(
            EgressProfile::socks5("10.64.0.1:1080"),
            Some("socks5://10.64.0.1:1080".to_string()),
        );
        assert_eq!(handle.route().proxy.as_deref(), Some("socks5://10.64.0.1:1080"));
        assert_eq!(handle.route().profile, "10.64.0.1:1080");
    }
}
