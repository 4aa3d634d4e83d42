//! Event-level types of the calendar document model.
//!
//! An [`Event`] keeps every property it was parsed with, in order, so that
//! a relayed feed round-trips untouched fields verbatim. Typed accessors
//! read and write the handful of fields the transformation modules care
//! about.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use icalendar::{Component as _, Trigger};

use crate::document::{Param, Property, RawComponent};

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// A VEVENT component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub properties: Vec<Property>,
    pub alarms: Vec<Alarm>,
    /// Subcomponents other than VALARM, passed through untouched
    pub components: Vec<RawComponent>,
}

/// Free-text fields the edit modules can rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Summary,
    Description,
    Location,
}

impl TextField {
    pub const ALL: [TextField; 3] = [TextField::Summary, TextField::Description, TextField::Location];

    pub fn property_name(&self) -> &'static str {
        match self {
            TextField::Summary => "SUMMARY",
            TextField::Description => "DESCRIPTION",
            TextField::Location => "LOCATION",
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.property_name().to_lowercase())
    }
}

impl Event {
    pub fn new(uid: &str) -> Self {
        Event {
            properties: vec![Property::new("UID", uid)],
            alarms: Vec::new(),
            components: Vec::new(),
        }
    }

    pub(crate) fn from_raw(raw: RawComponent) -> Self {
        let (alarms, components): (Vec<_>, Vec<_>) =
            raw.components.into_iter().partition(|c| c.name == "VALARM");

        Event {
            properties: raw.properties,
            alarms: alarms
                .into_iter()
                .map(|a| Alarm {
                    properties: a.properties,
                    components: a.components,
                })
                .collect(),
            components,
        }
    }

    /// The UID, or an empty string for events that lack one.
    pub fn uid(&self) -> &str {
        self.property("UID").map(|p| p.value.as_str()).unwrap_or("")
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Replace every property called `prop.name` with `prop`, keeping the
    /// position of the first one. Appends if none exists yet.
    pub fn set_property(&mut self, prop: Property) {
        match self.properties.iter().position(|p| p.name == prop.name) {
            Some(first) => {
                let name = prop.name.clone();
                self.properties[first] = prop;
                let mut index = 0;
                self.properties.retain(|p| {
                    let keep = index <= first || p.name != name;
                    index += 1;
                    keep
                });
            }
            None => self.properties.push(prop),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name != name);
        before != self.properties.len()
    }

    // TEXT FIELDS:

    pub fn text(&self, field: TextField) -> Option<String> {
        self.property(field.property_name()).map(|p| p.value.clone())
    }

    pub fn set_text(&mut self, field: TextField, value: &str) {
        self.set_property(Property::new(field.property_name(), value));
    }

    pub fn summary(&self) -> Option<String> {
        self.text(TextField::Summary)
    }

    pub fn description(&self) -> Option<String> {
        self.text(TextField::Description)
    }

    pub fn location(&self) -> Option<String> {
        self.text(TextField::Location)
    }

    // TIMES:

    /// DTSTART, or `None` when it is absent or unparseable.
    pub fn start(&self) -> Option<EventTime> {
        self.property("DTSTART").and_then(EventTime::from_property)
    }

    pub fn end(&self) -> Option<EventTime> {
        self.property("DTEND").and_then(EventTime::from_property)
    }

    pub fn set_start(&mut self, time: EventTime) {
        self.set_property(time.to_property("DTSTART"));
    }

    pub fn set_end(&mut self, time: EventTime) {
        self.set_property(time.to_property("DTEND"));
    }

    // RECURRENCE:

    pub fn rrule(&self) -> Option<&str> {
        self.property("RRULE").map(|p| p.value.as_str())
    }

    /// Install `rule` as the only RRULE of this event.
    pub fn set_rrule(&mut self, rule: &str) {
        self.set_property(Property::new("RRULE", rule));
    }

    pub fn add_alarm(&mut self, alarm: Alarm) {
        self.alarms.push(alarm);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary() {
            Some(summary) => write!(f, "'{}' ({})", summary, self.uid()),
            None => write!(f, "({})", self.uid()),
        }
    }
}

/// A DTSTART/DTEND value, preserving the form it was written in.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Parse a date-time property value.
    ///
    /// Handles:
    /// - `VALUE=DATE`: `DTSTART;VALUE=DATE:20240108`
    /// - TZID parameter: `DTSTART;TZID=Europe/Berlin:20240108T100000`
    /// - UTC: `DTSTART:20240108T100000Z`
    /// - Floating: `DTSTART:20240108T100000`
    pub fn from_property(prop: &Property) -> Option<Self> {
        let value = prop.value.trim();
        let is_date = prop.param("VALUE") == Some("DATE") || !value.contains('T');

        if is_date {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(EventTime::Date)
        } else if let Some(tzid) = prop.param("TZID") {
            NaiveDateTime::parse_from_str(value, LOCAL_FORMAT)
                .ok()
                .map(|datetime| EventTime::DateTimeZoned {
                    datetime,
                    tzid: tzid.to_string(),
                })
        } else if let Some(utc) = value.strip_suffix('Z') {
            NaiveDateTime::parse_from_str(utc, LOCAL_FORMAT)
                .ok()
                .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
        } else {
            NaiveDateTime::parse_from_str(value, LOCAL_FORMAT)
                .ok()
                .map(EventTime::DateTimeFloating)
        }
    }

    pub fn to_property(&self, name: &str) -> Property {
        match self {
            EventTime::Date(d) => {
                Property::new(name, d.format(DATE_FORMAT).to_string()).with_param("VALUE", "DATE")
            }
            EventTime::DateTimeUtc(dt) => Property::new(name, dt.format(UTC_FORMAT).to_string()),
            EventTime::DateTimeFloating(dt) => {
                Property::new(name, dt.format(LOCAL_FORMAT).to_string())
            }
            EventTime::DateTimeZoned { datetime, tzid } => {
                Property::new(name, datetime.format(LOCAL_FORMAT).to_string())
                    .with_param("TZID", tzid)
            }
        }
    }

    /// The instant this time denotes.
    ///
    /// Dates are read as midnight UTC. Floating times and times in a zone
    /// chrono-tz does not know are read as UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
            EventTime::DateTimeUtc(dt) => *dt,
            EventTime::DateTimeFloating(dt) => dt.and_utc(),
            EventTime::DateTimeZoned { datetime, tzid } => tzid
                .parse::<chrono_tz::Tz>()
                .ok()
                .and_then(|tz| tz.from_local_datetime(datetime).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| datetime.and_utc()),
        }
    }

    /// The same kind of time, moved by `offset`. `None` when the result
    /// falls outside chrono's range.
    pub fn shifted(&self, offset: Duration) -> Option<EventTime> {
        Some(match self {
            EventTime::Date(d) => EventTime::Date(d.checked_add_signed(offset)?),
            EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(dt.checked_add_signed(offset)?),
            EventTime::DateTimeFloating(dt) => {
                EventTime::DateTimeFloating(dt.checked_add_signed(offset)?)
            }
            EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
                datetime: datetime.checked_add_signed(offset)?,
                tzid: tzid.clone(),
            },
        })
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%Y-%m-%d %H:%M:%S"), tzid)
            }
        }
    }
}

/// A VALARM subcomponent of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alarm {
    pub properties: Vec<Property>,
    pub components: Vec<RawComponent>,
}

impl Alarm {
    /// A DISPLAY alarm triggering `offset` before the event starts.
    pub fn display_before(offset: Duration, description: &str) -> Self {
        let alarm = icalendar::Alarm::display(description, Trigger::before_start(offset));
        let properties = alarm
            .properties()
            .values()
            .chain(alarm.multi_properties().values().flatten())
            .map(|prop| Property {
                name: prop.key().to_string(),
                params: prop
                    .params()
                    .values()
                    .map(|param| Param {
                        key: param.key().to_string(),
                        value: Some(param.value().to_string()),
                    })
                    .collect(),
                value: prop.value().to_string(),
            })
            .collect();

        Alarm {
            properties,
            components: Vec::new(),
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == "ACTION")
            .map(|p| p.value.as_str())
    }

    /// Signed offset of a relative TRIGGER (-PT30M, -P1D, etc.).
    /// `None` for absolute triggers.
    pub fn trigger_offset(&self) -> Option<Duration> {
        let trigger = self.properties.iter().find(|p| p.name == "TRIGGER")?;
        if trigger.param("VALUE") == Some("DATE-TIME") {
            return None;
        }

        let value = trigger.value.trim();
        let is_before = value.starts_with('-');
        let duration = iso8601::duration(value.trim_start_matches(['-', '+'])).ok()?;
        let std_duration: std::time::Duration = duration.into();
        let offset = Duration::from_std(std_duration).ok()?;

        Some(if is_before { -offset } else { offset })
    }
}
