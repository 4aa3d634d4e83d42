//! Time windows for filtering events by start time.

use chrono::{DateTime, NaiveDate, Utc};

use crate::event::Event;

/// Earliest instant a window can start at.
pub fn min_instant() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Latest instant a window can end at.
pub fn max_instant() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// One side of a window as configured, before "now" is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Unbounded,
    Now,
    At(DateTime<Utc>),
}

impl TimeBound {
    /// Parse a bound parameter.
    /// - absent or empty: unbounded
    /// - `now`: the time the module runs
    /// - otherwise RFC 3339, e.g. `2025-01-01T00:00:00Z`
    pub fn parse(input: Option<&str>) -> Result<Self, String> {
        match input.map(str::trim) {
            None | Some("") => Ok(TimeBound::Unbounded),
            Some("now") => Ok(TimeBound::Now),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| TimeBound::At(dt.with_timezone(&Utc)))
                .map_err(|e| format!("'{}' is neither 'now' nor an RFC 3339 time: {}", s, e)),
        }
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, TimeBound::Unbounded)
    }

    fn resolve(&self, now: DateTime<Utc>, unbounded: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeBound::Unbounded => unbounded,
            TimeBound::Now => now,
            TimeBound::At(dt) => *dt,
        }
    }
}

/// Open interval `(after, before)` of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow {
            after: min_instant(),
            before: max_instant(),
        }
    }
}

impl TimeWindow {
    pub fn resolve(after: TimeBound, before: TimeBound, now: DateTime<Utc>) -> Self {
        TimeWindow {
            after: after.resolve(now, min_instant()),
            before: before.resolve(now, max_instant()),
        }
    }

    /// Parse textual bounds into a window, resolving `now` at `now`.
    pub fn from_args(
        after: Option<&str>,
        before: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        Ok(Self::resolve(
            TimeBound::parse(after)?,
            TimeBound::parse(before)?,
            now,
        ))
    }

    pub fn is_unbounded(&self) -> bool {
        *self == TimeWindow::default()
    }

    /// Strict on both sides: an instant on a boundary is outside.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.after < instant && instant < self.before
    }

    /// Whether the event starts inside the window. Events without a
    /// readable start never match a bounded window.
    pub fn matches(&self, event: &Event) -> bool {
        if self.is_unbounded() {
            return true;
        }
        event
            .start()
            .is_some_and(|start| self.contains(start.to_utc()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_bounds_use_sentinels() {
        let window = TimeWindow::from_args(None, Some(""), now()).unwrap();

        assert_eq!(window.after, min_instant());
        assert_eq!(window.before, max_instant());
        assert!(window.is_unbounded());
    }

    #[test]
    fn test_now_resolves_to_evaluation_time() {
        let window = TimeWindow::from_args(Some("now"), None, now()).unwrap();
        assert_eq!(window.after, now());
    }

    #[test]
    fn test_boundaries_are_excluded() {
        let t = "2025-01-01T00:00:00Z";
        let window = TimeWindow::from_args(Some(t), Some("2025-02-01T00:00:00Z"), now()).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert!(!window.contains(at));
        assert!(window.contains(at + chrono::Duration::seconds(1)));
        assert!(!window.contains(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_empty_window_contains_nothing() {
        let t = "2025-01-01T00:00:00+02:00";
        let window = TimeWindow::from_args(Some(t), Some(t), now()).unwrap();

        assert!(!window.contains(window.after));
    }

    #[test]
    fn test_invalid_bound_is_an_error() {
        assert!(TimeBound::parse(Some("tomorrow")).is_err());
        assert!(TimeWindow::from_args(None, Some("2025-13-01T00:00:00Z"), now()).is_err());
    }

    #[test]
    fn test_event_without_start_misses_bounded_window() {
        let event = Event::new("no-start");
        let bounded = TimeWindow::from_args(Some("now"), None, now()).unwrap();

        assert!(!bounded.matches(&event));
        assert!(TimeWindow::default().matches(&event));
    }
}
