//! Egress providers
//!
//! Implementations:
//! - [`WireGuardProvider`] brings tunnels up and down with `wg-quick`
//! - [`Socks5Provider`] routes the fetcher through a SOCKS5 relay
//! - [`DirectProvider`] leaves the network alone

use crate::egress::{AcquireError, EgressHandle, EgressProfile};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Establishes and tears down egress points
#[async_trait]
pub trait EgressProvider: Send + Sync {
    /// Establishes `profile`; one attempt
    async fn acquire(&self, profile: &EgressProfile) -> Result<EgressHandle, AcquireError>;

    /// Tears down `handle`; idempotent and never fails
    async fn release(&self, handle: &mut EgressHandle);

    /// Cleans up after an acquisition that was abandoned part way
    async fn abort(&self, _profile: &EgressProfile) {}
}

/// WireGuard tunnels managed through `wg-quick`
#[derive(Debug, Clone)]
pub struct WireGuardProvider {
    program: String,
    use_sudo: bool,
    settle: Duration,
}

impl WireGuardProvider {
    pub fn new(use_sudo: bool, settle: Duration) -> Self {
        Self {
            program: "wg-quick".to_string(),
            use_sudo,
            settle,
        }
    }

    /// Overrides the `wg-quick` executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, action: &str, config: &str) -> Command {
        let mut command = if self.use_sudo {
            let mut sudo = Command::new("sudo");
            sudo.arg(&self.program);
            sudo
        } else {
            Command::new(&self.program)
        };

        command
            .arg(action)
            .arg(config)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, action: &str, config: &str) -> Result<Output, std::io::Error> {
        tracing::debug!("{} {} {}", self.program, action, config);
        self.command(action, config).output().await
    }

    async fn down(&self, config: &str) {
        match self.run("down", config).await {
            Ok(output) if output.status.success() => {
                tracing::info!("Tunnel {} down", config);
            }
            Ok(output) => tracing::warn!(
                "{} down {} exited with {}: {}",
                self.program,
                config,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => tracing::warn!("Failed to run {} down {}: {}", self.program, config, e),
        }
    }
}

#[async_trait]
impl EgressProvider for WireGuardProvider {
    async fn acquire(&self, profile: &EgressProfile) -> Result<EgressHandle, AcquireError> {
        if profile.locator.trim().is_empty() {
            return Err(AcquireError::InvalidProfile(profile.name.clone()));
        }

        let output = self.run("up", &profile.locator).await?;
        if !output.status.success() {
            // wg-quick can leave the interface half configured
            self.down(&profile.locator).await;
            return Err(AcquireError::Command {
                command: format!("{} up {}", self.program, profile.locator),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(
            "Tunnel {} up, waiting {:?} to settle",
            profile.name,
            self.settle
        );
        tokio::time::sleep(self.settle).await;

        Ok(EgressHandle::new(profile.clone(), None))
    }

    async fn release(&self, handle: &mut EgressHandle) {
        if !handle.mark_released() {
            return;
        }
        let config = handle.profile().locator.clone();
        self.down(&config).await;
    }

    async fn abort(&self, profile: &EgressProfile) {
        self.down(&profile.locator).await;
    }
}

/// SOCKS5 relays; nothing to set up beyond the proxy URL
#[derive(Debug, Clone, Default)]
pub struct Socks5Provider {
    remote_dns: bool,
}

impl Socks5Provider {
    pub fn new(remote_dns: bool) -> Self {
        Self { remote_dns }
    }

    fn proxy_url(&self, address: &str) -> String {
        let scheme = if self.remote_dns { "socks5h" } else { "socks5" };
        format!("{}://{}", scheme, address)
    }
}

#[async_trait]
impl EgressProvider for Socks5Provider {
    async fn acquire(&self, profile: &EgressProfile) -> Result<EgressHandle, AcquireError> {
        let address = profile.locator.trim();
        let valid = address
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().map_or(false, |p| p > 0))
            .unwrap_or(false);

        if !valid {
            return Err(AcquireError::InvalidProfile(profile.locator.clone()));
        }

        Ok(EgressHandle::new(
            profile.clone(),
            Some(self.proxy_url(address)),
        ))
    }

    async fn release(&self, handle: &mut EgressHandle) {
        handle.mark_released();
    }
}

/// The machine's own connection
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProvider;

#[async_trait]
impl EgressProvider for DirectProvider {
    async fn acquire(&self, profile: &EgressProfile) -> Result<EgressHandle, AcquireError> {
        Ok(EgressHandle::new(profile.clone(), None))
    }

    async fn release(&self, handle: &mut EgressHandle) {
        handle.mark_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_socks5_proxy_url() {
        let provider = Socks5Provider::new(false);
        let handle = provider
            .acquire(&EgressProfile::socks5("10.64.0.1:1080"))
            .await
            .unwrap();
        assert_eq!(handle.route().proxy.as_deref(), Some("socks5://10.64.0.1:1080"));

        let provider = Socks5Provider::new(true);
        let handle = provider
            .acquire(&EgressProfile::socks5("10.64.0.1:1080"))
            .await
            .unwrap();
        assert_eq!(handle.route().proxy.as_deref(), Some("socks5h://10.64.0.1:1080"));
    }

    #[tokio::test]
    async fn test_socks5_rejects_bad_address() {
        let provider = Socks5Provider::default();
        for bad in ["10.64.0.1", ":1080", "host:http"] {
            let result = provider.acquire(&EgressProfile::socks5(bad)).await;
            assert!(matches!(result, Err(AcquireError::InvalidProfile(_))));
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let provider = DirectProvider;
        let mut handle = provider.acquire(&EgressProfile::direct()).await.unwrap();
        provider.release(&mut handle).await;
        provider.release(&mut handle).await;
        assert!(handle.is_released());
    }

    #[tokio::test]
    async fn test_wireguard_missing_program_is_acquire_error() {
        let provider = WireGuardProvider::new(false, Duration::ZERO)
            .with_program("/nonexistent/wg-quick");
        let result = provider
            .acquire(&EgressProfile::wireguard("/etc/wireguard/test.conf"))
            .await;
        assert!(matches!(result, Err(AcquireError::Io(_))));
    }

    #[tokio::test]
    async fn test_wireguard_failed_up_is_acquire_error() {
        // `false` ignores its arguments and exits non-zero
        let provider = WireGuardProvider::new(false, Duration::ZERO).with_program("false");
        let result = provider
            .acquire(&EgressProfile::wireguard("/etc/wireguard/test.conf"))
            .await;
        assert!(matches!(result, Err(AcquireError::Command { .. })));
    }

    #[tokio::test]
    async fn test_wireguard_up_and_down() {
        let provider = WireGuardProvider::new(false, Duration::ZERO).with_program("true");
        let mut handle = provider
            .acquire(&EgressProfile::wireguard("/etc/wireguard/test.conf"))
            .await
            .unwrap();
        assert_eq!(handle.route().proxy, None);

        provider.release(&mut handle).await;
        assert!(handle.is_released());
    }
}
