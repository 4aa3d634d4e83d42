//! Expiry of time-limited modules.
//!
//! A module invocation may carry `expires = "<RFC 3339>"`. A background
//! task periodically drops every invocation past that time and persists
//! the configuration. It runs independently of renders, so a module can
//! still be applied once shortly after it expired.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigStore, RelayConfig};
use crate::constants::MIN_CLEANUP_INTERVAL;
use crate::modules::ModuleInvocation;

/// A module removed by [`expire_modules`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredModule {
    pub profile: String,
    /// Position in the profile's list before removal
    pub index: usize,
    pub module: ModuleInvocation,
}

/// Remove every module whose expiry is at or before `now`.
///
/// Expiry values that are not RFC 3339 are logged and the module is kept.
pub fn expire_modules(config: &mut RelayConfig, now: DateTime<Utc>) -> Vec<ExpiredModule> {
    let mut expired = Vec::new();

    for (name, profile) in config.profiles.iter_mut() {
        let modules = std::mem::take(&mut profile.modules);

        for (index, module) in modules.into_iter().enumerate() {
            if is_expired(name, &module, now) {
                expired.push(ExpiredModule {
                    profile: name.clone(),
                    index,
                    module,
                });
            } else {
                profile.modules.push(module);
            }
        }
    }

    expired
}

fn is_expired(profile: &str, module: &ModuleInvocation, now: DateTime<Utc>) -> bool {
    let Some(expires) = module.expires.as_deref().map(str::trim) else {
        return false;
    };
    if expires.is_empty() {
        return false;
    }

    match DateTime::parse_from_rfc3339(expires) {
        Ok(at) => at.with_timezone(&Utc) <= now,
        Err(e) => {
            warn!(
                profile,
                module = %module.name,
                expires,
                "Ignoring unparseable module expiry: {}",
                e
            );
            false
        }
    }
}

/// The interval actually slept between passes.
pub fn effective_interval(interval: Duration) -> Duration {
    interval.max(MIN_CLEANUP_INTERVAL)
}

/// Periodic expiry over a [`ConfigStore`].
pub struct CleanupTask;

impl CleanupTask {
    /// Spawn the cleanup loop on the current runtime. It runs until the
    /// returned handle is aborted; a failed pass is logged and the loop
    /// carries on.
    pub fn spawn(store: Arc<ConfigStore>, interval: Duration) -> JoinHandle<()> {
        let interval = effective_interval(interval);
        info!(interval = %humantime::format_duration(interval), "Starting cleanup timer");

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                match store.cleanup_expired(Utc::now()).await {
                    Ok(expired) if expired.is_empty() => debug!("No expired modules"),
                    Ok(expired) => info!(count = expired.len(), "Expired modules removed"),
                    Err(e) => error!("Cleanup failed: {}", e),
                }
            }
        })
    }
}
