//! Edit modules: rewrite fields of existing events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::debug;

use super::params::Params;
use crate::document::CalendarDocument;
use crate::error::{RelayError, RelayResult};
use crate::event::{Event, EventTime, TextField};
use crate::time_window::{TimeBound, TimeWindow};

/// How a new text value meets an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// `true`: replace outright
    #[default]
    Replace,
    /// `false`: append, separated by `"; "`
    Append,
    /// `fillempty`: only set when the current value is empty
    FillEmpty,
}

impl FromStr for OverwriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(OverwriteMode::Replace),
            "false" => Ok(OverwriteMode::Append),
            "fillempty" => Ok(OverwriteMode::FillEmpty),
            other => Err(format!(
                "'{}' is not one of 'true', 'false', 'fillempty'",
                other
            )),
        }
    }
}

impl fmt::Display for OverwriteMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OverwriteMode::Replace => "true",
            OverwriteMode::Append => "false",
            OverwriteMode::FillEmpty => "fillempty",
        })
    }
}

/// The field changes shared by both edit modules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldEdits {
    pub overwrite: OverwriteMode,
    pub text: Vec<(TextField, String)>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl FieldEdits {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        let overwrite = match params.optional("overwrite") {
            Some(mode) => mode.parse().map_err(|e| params.invalid("overwrite", e))?,
            None => OverwriteMode::default(),
        };

        let text = TextField::ALL
            .into_iter()
            .filter_map(|field| {
                params
                    .optional(&format!("new-{field}"))
                    .map(|value| (field, value.to_string()))
            })
            .collect();

        Ok(FieldEdits {
            overwrite,
            text,
            start: params.rfc3339("new-start")?,
            end: params.rfc3339("new-end")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.start.is_none() && self.end.is_none()
    }

    pub fn apply(&self, event: &mut Event) {
        for (field, value) in &self.text {
            let current = event.text(*field);
            // A field that does not exist yet can only be created
            let mode = if current.is_some() {
                self.overwrite
            } else {
                OverwriteMode::Replace
            };

            match mode {
                OverwriteMode::Replace => event.set_text(*field, value),
                OverwriteMode::Append => {
                    let joined = format!("{}; {}", current.unwrap_or_default(), value);
                    event.set_text(*field, &joined);
                }
                OverwriteMode::FillEmpty => {
                    if current.unwrap_or_default().is_empty() {
                        event.set_text(*field, value);
                    }
                }
            }
            debug!(uid = event.uid(), %field, %mode, "Edited event field");
        }

        if let Some(start) = self.start {
            event.set_start(EventTime::DateTimeUtc(start));
        }
        if let Some(end) = self.end {
            event.set_end(EventTime::DateTimeUtc(end));
        }
    }
}

/// `edit-byid`: edit the first event with the given UID.
#[derive(Debug, Clone)]
pub struct EditById {
    pub id: String,
    pub edits: FieldEdits,
}

impl EditById {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        Ok(EditById {
            id: params.required("id")?.to_string(),
            edits: FieldEdits::from_params(params)?,
        })
    }

    pub fn apply(&self, doc: &mut CalendarDocument) -> i64 {
        match doc.events_mut().find(|event| event.uid() == self.id) {
            Some(event) => self.edits.apply(event),
            None => debug!(uid = %self.id, "No event with this id, nothing to edit"),
        }
        0
    }
}

/// `edit-bysummary-regex`: edit every event whose summary matches and
/// that starts inside the optional window.
#[derive(Debug, Clone)]
pub struct EditBySummaryRegex {
    pub regex: Regex,
    pub after: TimeBound,
    pub before: TimeBound,
    pub edits: FieldEdits,
    /// Shifts start and end together
    pub move_time: Option<Duration>,
}

impl EditBySummaryRegex {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        let edits = FieldEdits::from_params(params)?;
        let move_time = params.signed_duration("move-time")?;

        if move_time.is_some() && (edits.start.is_some() || edits.end.is_some()) {
            return Err(params.invalid(
                "move-time",
                "cannot be combined with 'new-start' or 'new-end'",
            ));
        }

        Ok(EditBySummaryRegex {
            regex: params.regex("regex")?,
            after: params.time_bound("after")?,
            before: params.time_bound("before")?,
            edits,
            move_time,
        })
    }

    /// Fails without touching any event when `move-time` would push a
    /// matching event outside the representable range.
    pub fn apply(&self, doc: &mut CalendarDocument, now: DateTime<Utc>) -> RelayResult<i64> {
        let window = TimeWindow::resolve(self.after, self.before, now);

        let mut targets = Vec::new();
        for (position, event) in doc.events().enumerate() {
            let summary = event.summary().unwrap_or_default();
            if !self.regex.is_match(&summary) || !window.matches(event) {
                continue;
            }

            let moved = match self.move_time {
                Some(offset) => Some(moved_times(event, offset).ok_or_else(|| {
                    RelayError::invalid(
                        "edit-bysummary-regex",
                        "move-time",
                        format!("moves event '{}' out of range", event.uid()),
                    )
                })?),
                None => None,
            };
            targets.push((position, moved));
        }

        let mut targets = targets.into_iter().peekable();
        for (position, event) in doc.events_mut().enumerate() {
            let Some((_, moved)) = targets.next_if(|(p, _)| *p == position) else {
                continue;
            };

            self.edits.apply(event);
            if let (Some((start, end)), Some(offset)) = (moved, self.move_time) {
                if let Some(start) = start {
                    event.set_start(start);
                }
                if let Some(end) = end {
                    event.set_end(end);
                }
                debug!(uid = event.uid(), offset = %offset, "Moved event");
            }
        }
        Ok(0)
    }
}

type MovedTimes = (Option<EventTime>, Option<EventTime>);

/// Start and end of `event` moved by `offset`, `None` if either overflows.
fn moved_times(event: &Event, offset: Duration) -> Option<MovedTimes> {
    let start = match event.start() {
        Some(start) => Some(start.shifted(offset)?),
        None => None,
    };
    let end = match event.end() {
        Some(end) => Some(end.shifted(offset)?),
        None => None,
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn standup() -> CalendarDocument {
        let mut event = Event::new("s1");
        event.set_text(TextField::Summary, "Standup");
        event.set_start(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
        ));
        event.set_end(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 15, 0).unwrap(),
        ));

        let mut doc = CalendarDocument::new();
        doc.push_event(event);
        doc
    }

    fn edit_by_id(pairs: &[(&str, &str)]) -> EditById {
        let map = params(pairs);
        EditById::from_params(&Params::new("edit-byid", &map)).unwrap()
    }

    fn summary(doc: &CalendarDocument) -> Option<String> {
        doc.events().next().and_then(|e| e.summary())
    }

    #[test]
    fn test_overwrite_false_appends() {
        let module = edit_by_id(&[("id", "s1"), ("overwrite", "false"), ("new-summary", "moved")]);
        let mut doc = standup();

        assert_eq!(module.apply(&mut doc), 0);
        assert_eq!(summary(&doc).as_deref(), Some("Standup; moved"));
    }

    #[test]
    fn test_overwrite_fillempty_keeps_existing_value() {
        let module = edit_by_id(&[
            ("id", "s1"),
            ("overwrite", "fillempty"),
            ("new-summary", "other"),
        ]);
        let mut doc = standup();

        module.apply(&mut doc);
        assert_eq!(summary(&doc).as_deref(), Some("Standup"));
    }

    #[test]
    fn test_missing_field_is_created_whatever_the_mode() {
        let module = edit_by_id(&[
            ("id", "s1"),
            ("overwrite", "false"),
            ("new-location", "Room 4"),
        ]);
        let mut doc = standup();

        module.apply(&mut doc);
        let location = doc.events().next().and_then(|e| e.location());
        assert_eq!(location.as_deref(), Some("Room 4"));
    }

    #[test]
    fn test_default_overwrite_replaces() {
        let module = edit_by_id(&[("id", "s1"), ("new-summary", "Retro")]);
        let mut doc = standup();

        module.apply(&mut doc);
        assert_eq!(summary(&doc).as_deref(), Some("Retro"));
    }

    #[test]
    fn test_new_start_replaces_and_bad_start_is_rejected() {
        let module = edit_by_id(&[("id", "s1"), ("new-start", "2025-02-01T10:00:00+01:00")]);
        let mut doc = standup();
        module.apply(&mut doc);

        let start = doc.events().next().and_then(|e| e.start()).unwrap();
        assert_eq!(start.to_utc(), Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap());

        let map = params(&[("id", "s1"), ("new-start", "yesterday")]);
        assert!(matches!(
            EditById::from_params(&Params::new("edit-byid", &map)),
            Err(RelayError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_overwrite_mode() {
        let map = params(&[("id", "s1"), ("overwrite", "maybe")]);
        assert!(matches!(
            EditById::from_params(&Params::new("edit-byid", &map)),
            Err(RelayError::InvalidParameter { ref parameter, .. }) if parameter == "overwrite"
        ));
    }

    #[test]
    fn test_move_time_shifts_start_and_end() {
        let map = params(&[("regex", "Stand"), ("move-time", "-30m")]);
        let module =
            EditBySummaryRegex::from_params(&Params::new("edit-bysummary-regex", &map)).unwrap();
        let mut doc = standup();

        assert_eq!(module.apply(&mut doc, Utc::now()).unwrap(), 0);
        let event = doc.events().next().unwrap();
        assert_eq!(
            event.start().unwrap().to_utc(),
            Utc.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).unwrap()
        );
        assert_eq!(
            event.end().unwrap().to_utc(),
            Utc.with_ymd_and_hms(2025, 1, 6, 8, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_move_time_out_of_range_is_invalid_and_leaves_events() {
        let map = params(&[
            ("regex", "Stand"),
            ("move-time", "300000years"),
            ("new-summary", "moved"),
        ]);
        let module =
            EditBySummaryRegex::from_params(&Params::new("edit-bysummary-regex", &map)).unwrap();
        let mut doc = standup();

        assert!(matches!(
            module.apply(&mut doc, Utc::now()),
            Err(RelayError::InvalidParameter { ref parameter, .. }) if parameter == "move-time"
        ));
        let event = doc.events().next().unwrap();
        assert_eq!(event.summary().as_deref(), Some("Standup"));
        assert_eq!(
            event.start().unwrap().to_utc(),
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_edit_by_id_edits_only_first_duplicate() {
        let module = edit_by_id(&[("id", "s1"), ("new-summary", "Retro")]);
        let mut doc = standup();
        let mut twin = Event::new("s1");
        twin.set_text(TextField::Summary, "Standup");
        doc.push_event(twin);

        module.apply(&mut doc);
        let summaries: Vec<_> = doc.events().filter_map(|e| e.summary()).collect();
        assert_eq!(summaries, vec!["Retro", "Standup"]);
    }

    #[test]
    fn test_move_time_conflicts_with_new_start() {
        let map = params(&[
            ("regex", "Stand"),
            ("move-time", "1h"),
            ("new-end", "2025-01-06T12:00:00Z"),
        ]);
        assert!(matches!(
            EditBySummaryRegex::from_params(&Params::new("edit-bysummary-regex", &map)),
            Err(RelayError::InvalidParameter { ref parameter, .. }) if parameter == "move-time"
        ));
    }

    #[test]
    fn test_edit_by_regex_respects_window() {
        let map = params(&[
            ("regex", "Stand"),
            ("after", "2025-02-01T00:00:00Z"),
            ("new-summary", "late"),
        ]);
        let module =
            EditBySummaryRegex::from_params(&Params::new("edit-bysummary-regex", &map)).unwrap();
        let mut doc = standup();

        module.apply(&mut doc, Utc::now()).unwrap();
        assert_eq!(summary(&doc).as_deref(), Some("Standup"));
    }
}
