//! Shared constants.

use std::time::Duration;

/// PRODID written into calendars the relay creates from scratch.
pub const PRODID: &str = "-//icalrelay//icalrelay//EN";

/// How often expired modules are swept from profiles.
pub const DEFAULT_CLEANUP_INTERVAL: &str = "1h";

/// Floor for the cleanup interval so a zero interval cannot spin.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request limit for remote calendar fetches.
pub const DEFAULT_FETCH_TIMEOUT: &str = "30s";

/// DESCRIPTION of alarms added by `add-reminder`.
pub const REMINDER_DESCRIPTION: &str = "Reminder";
