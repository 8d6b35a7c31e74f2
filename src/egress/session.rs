//! Scoped use of one egress profile
//!
//! [`with_egress`] acquires a profile under a watchdog, runs a body with the
//! resulting route and releases the handle on every exit path, including a
//! panic inside the body.

use crate::egress::{EgressProfile, EgressProvider, EgressRoute};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// How a scoped egress session ended
#[derive(Debug)]
pub enum SessionOutcome<T> {
    /// The body ran to completion
    Completed(T),

    /// The profile could not be established; the body never ran
    AcquireFailed(String),

    /// The body panicked; the handle was still released
    Panicked(String),
}

/// Runs `body` with `profile` established, releasing it afterwards
///
/// # Arguments
///
/// * `provider` - Provider that owns the profile
/// * `profile` - Profile to establish
/// * `acquire_timeout` - Watchdog for the acquisition
/// * `body` - Work to do while the egress is up
pub async fn with_egress<T, F, Fut>(
    provider: &dyn EgressProvider,
    profile: &EgressProfile,
    acquire_timeout: Duration,
    body: F,
) -> SessionOutcome<T>
where
    F: FnOnce(EgressRoute) -> Fut,
    Fut: Future<Output = T>,
{
    let mut handle = match tokio::time::timeout(acquire_timeout, provider.acquire(profile)).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            tracing::warn!("Skipping egress {}: {}", profile.name, e);
            return SessionOutcome::AcquireFailed(e.to_string());
        }
        Err(_) => {
            tracing::warn!(
                "Skipping egress {}: acquisition timed out after {:?}",
                profile.name,
                acquire_timeout
            );
            provider.abort(profile).await;
            return SessionOutcome::AcquireFailed(format!(
                "acquisition timed out after {:?}",
                acquire_timeout
            ));
        }
    };

    tracing::info!("Egress {} established", profile.name);
    let route = handle.route().clone();

    let result = AssertUnwindSafe(async move { body(route).await })
        .catch_unwind()
        .await;

    provider.release(&mut handle).await;
    tracing::info!("Egress {} released", profile.name);

    match result {
        Ok(value) => SessionOutcome::Completed(value),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("Session on {} panicked: {}", profile.name, message);
            SessionOutcome::Panicked(message)
        }
    }
}

/// Extracts the message of a caught panic
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
