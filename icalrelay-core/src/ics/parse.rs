//! ICS parsing using the icalendar crate's parser.

use icalendar::parser::{self, read_calendar, unfold};

use crate::document::{CalendarDocument, Component, Param, Property, RawComponent};
use crate::error::{RelayError, RelayResult};
use crate::event::Event;

/// Parse ICS content into a calendar document.
///
/// Every property and component is kept; only VEVENTs get a typed view.
pub fn parse_calendar(content: &str) -> RelayResult<CalendarDocument> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| RelayError::IcsParse(e.to_string()))?;
    if calendar.properties.is_empty() && calendar.components.is_empty() {
        return Err(RelayError::IcsParse("no calendar data".into()));
    }

    let mut properties: Vec<Property> = calendar.properties.iter().map(convert_property).collect();
    let mut components = Vec::new();

    for component in &calendar.components {
        let raw = convert_component(component);

        // Concatenated feeds come through as several VCALENDAR blocks
        if raw.name == "VCALENDAR" {
            if properties.is_empty() {
                properties = raw.properties;
            }
            components.extend(raw.components.into_iter().map(into_component));
        } else {
            components.push(into_component(raw));
        }
    }

    Ok(CalendarDocument {
        properties,
        components,
    })
}

fn into_component(raw: RawComponent) -> Component {
    if raw.name == "VEVENT" {
        Component::Event(Event::from_raw(raw))
    } else {
        Component::Other(raw)
    }
}

fn convert_component(component: &parser::Component<'_>) -> RawComponent {
    RawComponent {
        name: component.name.as_ref().to_ascii_uppercase(),
        properties: component.properties.iter().map(convert_property).collect(),
        components: component.components.iter().map(convert_component).collect(),
    }
}

fn convert_property(prop: &parser::Property<'_>) -> Property {
    Property {
        name: prop.name.as_ref().to_ascii_uppercase(),
        params: prop
            .params
            .iter()
            .map(|p| Param {
                key: p.key.as_ref().to_ascii_uppercase(),
                value: p.val.as_ref().map(|v| v.to_string()),
            })
            .collect(),
        value: prop.val.to_string(),
    }
}
