//! Typed access to a module's string parameters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::{RelayError, RelayResult};
use crate::time_window::TimeBound;

/// A module's parameter map plus the module name for error messages.
/// Empty values count as absent.
pub(crate) struct Params<'a> {
    module: &'static str,
    map: &'a BTreeMap<String, String>,
}

impl<'a> Params<'a> {
    pub fn new(module: &'static str, map: &'a BTreeMap<String, String>) -> Self {
        Params { module, map }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.map
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn required(&self, key: &str) -> RelayResult<&'a str> {
        self.optional(key)
            .ok_or_else(|| RelayError::missing(self.module, key))
    }

    pub fn invalid(&self, key: &str, reason: impl ToString) -> RelayError {
        RelayError::invalid(self.module, key, reason)
    }

    pub fn regex(&self, key: &str) -> RelayResult<Regex> {
        let pattern = self.required(key)?;
        Regex::new(pattern).map_err(|e| self.invalid(key, e))
    }

    pub fn time_bound(&self, key: &str) -> RelayResult<TimeBound> {
        TimeBound::parse(self.optional(key)).map_err(|e| self.invalid(key, e))
    }

    pub fn rfc3339(&self, key: &str) -> RelayResult<Option<DateTime<Utc>>> {
        self.optional(key)
            .map(|s| {
                DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| self.invalid(key, format!("'{}' is not an RFC 3339 time: {}", s, e)))
            })
            .transpose()
    }

    /// A duration with an optional leading sign, e.g. `-1h 30m`.
    pub fn signed_duration(&self, key: &str) -> RelayResult<Option<Duration>> {
        self.optional(key)
            .map(|s| parse_signed_duration(s).map_err(|e| self.invalid(key, e)))
            .transpose()
    }

    /// Entries whose key starts with `prefix`, with the prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.map
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|name| (name, v.as_str())))
    }
}

/// Parse a humantime duration with an optional `+`/`-` sign.
pub fn parse_signed_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (negative, magnitude) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    let std_dur = humantime::parse_duration(magnitude.trim())
        .map_err(|e| format!("'{}' is not a duration: {}", input, e))?;
    let duration =
        Duration::from_std(std_dur).map_err(|_| format!("duration '{}' is too large", input))?;

    Ok(if negative { -duration } else { duration })
}
