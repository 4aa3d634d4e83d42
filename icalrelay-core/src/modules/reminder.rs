//! `add-reminder`: attach a display alarm to every event.

use chrono::Duration;
use tracing::debug;

use super::params::Params;
use crate::constants::REMINDER_DESCRIPTION;
use crate::document::CalendarDocument;
use crate::error::RelayResult;
use crate::event::Alarm;

#[derive(Debug, Clone)]
pub struct AddReminder {
    /// How long before the start the alarm fires
    pub before: Duration,
}

impl AddReminder {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        let time = params.required("time")?;
        let before = parse_reminder_offset(time).map_err(|e| params.invalid("time", e))?;

        Ok(AddReminder { before })
    }

    pub fn apply(&self, doc: &mut CalendarDocument) -> i64 {
        let mut count = 0;
        for event in doc.events_mut() {
            event.add_alarm(Alarm::display_before(self.before, REMINDER_DESCRIPTION));
            count += 1;
        }
        debug!(count, before = %self.before, "Added reminders");
        0
    }
}

/// Parse a reminder offset.
///
/// Accepts:
/// - ISO 8601 durations: `PT15M`, `P1D`
/// - the time part alone, as older configurations write it: `15M`, `1H30M`
/// - humantime: `15m`, `1h 30m`
fn parse_reminder_offset(input: &str) -> Result<Duration, String> {
    let input = input.trim();

    let iso = if input.starts_with('P') {
        Some(input.to_string())
    } else if input.chars().all(|c| c.is_ascii_digit() || "HMS".contains(c)) {
        Some(format!("PT{input}"))
    } else {
        None
    };

    let std_dur = match iso {
        Some(iso) => iso8601::duration(&iso)
            .map(std::time::Duration::from)
            .map_err(|e| format!("'{}' is not a duration: {}", input, e))?,
        None => humantime::parse_duration(input)
            .map_err(|e| format!("'{}' is not a duration: {}", input, e))?,
    };

    Duration::from_std(std_dur).map_err(|_| format!("duration '{}' is too large", input))
}
