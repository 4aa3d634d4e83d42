//! RRULE editing.
//!
//! Recurrence rules are handled as `KEY=VALUE` parts only. The relay never
//! expands occurrences; it only bounds a rule so that a deleted range cannot
//! come back when a client expands the series later.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Compact UTC form used inside rules, e.g. `20250101T000000Z`.
const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const UNTIL_DATE_FORMAT: &str = "%Y%m%d";

/// An RRULE value split into its parts. Keys are unique; parts keep the
/// position they first appeared at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    parts: Vec<(String, String)>,
}

/// What [`RecurrenceRule::truncate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    /// UNTIL was after the cutoff and was moved back to it
    Shortened { previous: String },
    /// The rule was open-ended and received an UNTIL
    UntilAdded,
    /// UNTIL was already at or before the cutoff
    AlreadyBounded,
    /// The rule is bounded by COUNT, which is not rewritten
    CountUnsupported,
}

impl Truncation {
    pub fn changed(&self) -> bool {
        matches!(self, Truncation::Shortened { .. } | Truncation::UntilAdded)
    }
}

impl FromStr for RecurrenceRule {
    type Err = String;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let mut parsed = RecurrenceRule { parts: Vec::new() };

        for part in rule.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| format!("malformed RRULE part '{}' in '{}'", part, rule))?;
            // Later duplicates win
            parsed.set(key, value);
        }

        Ok(parsed)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&joined.join(";"))
    }
}

impl RecurrenceRule {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.parts.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.parts.push((key.to_string(), value.to_string())),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(k, _)| k.as_str())
    }

    /// Bound the rule so it produces no occurrences after `cutoff`.
    ///
    /// An existing UNTIL is only ever moved earlier. COUNT-bounded rules are
    /// left as they are and reported as [`Truncation::CountUnsupported`].
    pub fn truncate(&mut self, cutoff: DateTime<Utc>) -> Result<Truncation, String> {
        if let Some(until) = self.get("UNTIL").map(str::to_string) {
            let (current, date_only) = parse_until(&until)?;
            if current <= cutoff {
                return Ok(Truncation::AlreadyBounded);
            }

            let replacement = if date_only {
                cutoff.format(UNTIL_DATE_FORMAT).to_string()
            } else {
                cutoff.format(UNTIL_FORMAT).to_string()
            };
            self.set("UNTIL", &replacement);
            Ok(Truncation::Shortened { previous: until })
        } else if self.get("COUNT").is_some() {
            Ok(Truncation::CountUnsupported)
        } else {
            self.set("UNTIL", &cutoff.format(UNTIL_FORMAT).to_string());
            Ok(Truncation::UntilAdded)
        }
    }
}

/// Parse an UNTIL value; the flag tells whether it was a plain date.
fn parse_until(value: &str) -> Result<(DateTime<Utc>, bool), String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, UNTIL_FORMAT) {
        return Ok((dt.and_utc(), false));
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, UNTIL_DATE_FORMAT) {
        return Ok((d.and_time(NaiveTime::MIN).and_utc(), true));
    }
    Err(format!(
        "invalid UNTIL '{}', expected the form YYYYMMDDThhmmssZ",
        value
    ))
}

/// Truncate a rule string at `cutoff`, returning the rule to store and
/// what happened. Unchanged rules come back verbatim.
pub fn truncate_rule(rule: &str, cutoff: DateTime<Utc>) -> Result<(String, Truncation), String> {
    let mut parsed: RecurrenceRule = rule.parse()?;
    let truncation = parsed.truncate(cutoff)?;

    if truncation.changed() {
        Ok((parsed.to_string(), truncation))
    } else {
        Ok((rule.to_string(), truncation))
    }
}
