//! Deletion modules.
//!
//! Every deletion collects the positions to drop in one forward pass and
//! then rebuilds the component sequence with
//! [`CalendarDocument::remove_positions`], so removal never shifts a
//! position that is still to be looked at.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use super::params::Params;
use crate::document::CalendarDocument;
use crate::error::{RelayError, RelayResult};
use crate::event::Event;
use crate::recurrence::{Truncation, truncate_rule};
use crate::time_window::{TimeBound, TimeWindow};

fn removed_delta(removed: usize) -> i64 {
    -(removed as i64)
}

/// `delete-bysummary-regex`: drop events whose summary matches.
#[derive(Debug, Clone)]
pub struct DeleteBySummaryRegex {
    pub regex: Regex,
    /// Only set when both `from` and `until` are given
    pub window: Option<(TimeBound, TimeBound)>,
}

impl DeleteBySummaryRegex {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        let regex = params.regex("regex")?;
        let from = params.time_bound("from")?;
        let until = params.time_bound("until")?;

        let window = match (from.is_bounded(), until.is_bounded()) {
            (true, true) => Some((from, until)),
            (false, false) => None,
            _ => {
                warn!(
                    module = params.module(),
                    "Only one of 'from'/'until' given, the time filter needs both and is ignored"
                );
                None
            }
        };

        Ok(DeleteBySummaryRegex { regex, window })
    }

    pub fn apply(&self, doc: &mut CalendarDocument, now: DateTime<Utc>) -> i64 {
        let window = self
            .window
            .map(|(from, until)| TimeWindow::resolve(from, until, now));

        let doomed: BTreeSet<usize> = doc
            .event_positions()
            .filter(|(_, event)| {
                let summary = event.summary().unwrap_or_default();
                self.regex.is_match(&summary) && window.is_none_or(|w| w.matches(event))
            })
            .inspect(|(_, event)| debug!(event = %event, "Deleting event by summary"))
            .map(|(i, _)| i)
            .collect();

        removed_delta(doc.remove_positions(&doomed))
    }
}

/// `delete-byid`: drop the first event with the given UID.
#[derive(Debug, Clone)]
pub struct DeleteById {
    pub id: String,
}

impl DeleteById {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        Ok(DeleteById {
            id: params.required("id")?.to_string(),
        })
    }

    pub fn apply(&self, doc: &mut CalendarDocument) -> i64 {
        let position = doc
            .event_positions()
            .find(|(_, event)| event.uid() == self.id)
            .map(|(i, _)| i);

        match position {
            Some(index) => {
                doc.remove(index);
                debug!(uid = %self.id, "Deleted event by id");
                -1
            }
            None => {
                debug!(uid = %self.id, "No event with this id, nothing to delete");
                0
            }
        }
    }
}

/// `delete-timeframe`: drop events starting strictly inside the window,
/// after bounding every recurrence at the window start.
#[derive(Debug, Clone)]
pub struct DeleteTimeframe {
    pub after: TimeBound,
    pub before: TimeBound,
}

impl DeleteTimeframe {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        // `from`/`until` are accepted as older spellings
        let after = match params.optional("after") {
            Some(_) => params.time_bound("after")?,
            None => params.time_bound("from")?,
        };
        let before = match params.optional("before") {
            Some(_) => params.time_bound("before")?,
            None => params.time_bound("until")?,
        };

        if !after.is_bounded() && !before.is_bounded() {
            return Err(RelayError::missing(params.module(), "after' or 'before"));
        }

        Ok(DeleteTimeframe { after, before })
    }

    pub fn apply(&self, doc: &mut CalendarDocument, now: DateTime<Utc>) -> RelayResult<i64> {
        let window = TimeWindow::resolve(self.after, self.before, now);

        for event in doc.events_mut() {
            truncate_recurrence(event, window.after)?;
        }

        let doomed: BTreeSet<usize> = doc
            .event_positions()
            .filter(|(_, event)| {
                event
                    .start()
                    .is_some_and(|start| window.contains(start.to_utc()))
            })
            .inspect(|(_, event)| debug!(event = %event, "Deleting event in timeframe"))
            .map(|(i, _)| i)
            .collect();

        Ok(removed_delta(doc.remove_positions(&doomed)))
    }
}

fn truncate_recurrence(event: &mut Event, cutoff: DateTime<Utc>) -> RelayResult<()> {
    let Some(rule) = event.rrule() else {
        return Ok(());
    };

    let (truncated, truncation) = truncate_rule(rule, cutoff).map_err(|e| {
        RelayError::invalid("delete-timeframe", "RRULE", format!("event {}: {}", event, e))
    })?;

    match truncation {
        Truncation::CountUnsupported => {
            warn!(event = %event, "COUNT-bounded recurrence is not truncated");
        }
        Truncation::Shortened { .. } | Truncation::UntilAdded => {
            debug!(event = %event, rule = %truncated, "Truncated recurrence");
            event.set_rrule(&truncated);
        }
        Truncation::AlreadyBounded => {}
    }

    Ok(())
}

/// `delete-duplicates`: among events with the same start, end and
/// summary, keep only the last one in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteDuplicates;

impl DeleteDuplicates {
    pub fn apply(&self, doc: &mut CalendarDocument) -> i64 {
        let events: Vec<(usize, &Event)> = doc.event_positions().collect();
        let mut seen = HashSet::new();
        let mut doomed = BTreeSet::new();

        for (index, event) in events.into_iter().rev() {
            if !seen.insert(identity_key(event)) {
                debug!(event = %event, "Deleting duplicate event");
                doomed.insert(index);
            }
        }

        removed_delta(doc.remove_positions(&doomed))
    }
}

fn identity_key(event: &Event) -> String {
    let start = event.start().map(|t| t.to_string()).unwrap_or_default();
    let end = event.end().map(|t| t.to_string()).unwrap_or_default();
    let summary = event.summary().unwrap_or_default();

    format!("{start}{end}{summary}")
}
