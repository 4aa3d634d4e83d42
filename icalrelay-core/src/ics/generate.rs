//! ICS generation using the icalendar crate.

use icalendar::{Calendar, Component as _, parser};

use crate::document::{CalendarDocument, Component, Property, RawComponent};
use crate::event::{Alarm, Event};

/// Components that never carry DTSTAMP or UID of their own.
const NO_IDENTITY: [&str; 4] = ["VALARM", "VTIMEZONE", "STANDARD", "DAYLIGHT"];

/// Serialize a calendar document to .ics content (CRLF line endings).
///
/// icalendar handles folding, TEXT escaping and parameter quoting.
pub fn generate_ics(doc: &CalendarDocument) -> String {
    let mut cal = Calendar::empty();

    for prop in &doc.properties {
        cal.append_property(ical_property(prop));
    }
    for component in &doc.components {
        match component {
            Component::Event(event) => cal.push(ical_event(event)),
            Component::Other(raw) => cal.push(parsed_component(raw)),
        };
    }

    strip_injected(&cal.to_string())
}

fn ical_property(prop: &Property) -> icalendar::Property {
    let mut out = icalendar::Property::new(prop.name.as_str(), prop.value.as_str());
    for param in &prop.params {
        out.add_parameter(&param.key, param.value.as_deref().unwrap_or(""));
    }
    out
}

fn ical_event(event: &Event) -> icalendar::Event {
    let mut out = icalendar::Event::new();

    for prop in &event.properties {
        let repeated = event
            .properties
            .iter()
            .filter(|p| p.name == prop.name)
            .nth(1)
            .is_some();
        if repeated {
            out.append_multi_property(ical_property(prop));
        } else {
            out.append_property(ical_property(prop));
        }
    }
    for alarm in &event.alarms {
        out.append_component(alarm_component(alarm));
    }
    for component in &event.components {
        out.append_component(parsed_component(component));
    }

    out
}

fn alarm_component(alarm: &Alarm) -> parser::Component<'static> {
    parsed_component(&RawComponent {
        name: "VALARM".to_string(),
        properties: alarm.properties.clone(),
        components: alarm.components.clone(),
    })
}

// icalendar only builds components with arbitrary names from its parsed form
fn parsed_component(raw: &RawComponent) -> parser::Component<'static> {
    parser::Component {
        name: raw.name.clone().into(),
        properties: raw.properties.iter().map(parsed_property).collect(),
        components: raw.components.iter().map(parsed_component).collect(),
    }
}

fn parsed_property(prop: &Property) -> parser::Property<'static> {
    parser::Property {
        name: prop.name.clone().into(),
        val: prop.value.clone().into(),
        params: prop
            .params
            .iter()
            .map(|p| parser::Parameter {
                key: p.key.clone().into(),
                val: p.value.clone().map(Into::into),
            })
            .collect(),
    }
}

/// Drop the DTSTAMP and UID lines icalendar adds to every component where
/// they do not belong.
fn strip_injected(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut stack: Vec<&str> = Vec::new();
    let mut skipping = false;

    for line in ics.split_terminator("\r\n") {
        // Folded continuation of the line before
        if line.starts_with(' ') {
            if !skipping {
                result.push_str(line);
                result.push_str("\r\n");
            }
            continue;
        }

        if let Some(name) = line.strip_prefix("BEGIN:") {
            stack.push(name);
        } else if line.starts_with("END:") {
            stack.pop();
        }

        let inside = stack.last().is_some_and(|name| NO_IDENTITY.contains(name));
        skipping = inside && (line.starts_with("DTSTAMP:") || line.starts_with("UID:"));
        if skipping {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
