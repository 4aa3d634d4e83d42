//! In-memory calendar document.
//!
//! A [`CalendarDocument`] is what one profile evaluation works on: parsed
//! from a feed (or started empty), mutated in place by the pipeline, then
//! serialized and discarded.

use std::collections::BTreeSet;

use crate::constants::PRODID;
use crate::event::Event;

/// A parsed VCALENDAR.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDocument {
    /// Calendar-level properties (VERSION, PRODID, X-WR-TIMEZONE, ...)
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

/// One entry of a calendar. Only events are inspected by modules.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Event(Event),
    Other(RawComponent),
}

/// A component the relay does not interpret (VTIMEZONE, VTODO, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<RawComponent>,
}

/// A content line: name, parameters and the decoded value (TEXT unescaped).
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub params: Vec<Param>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub key: String,
    pub value: Option<String>,
}

impl Property {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Property {
            name: name.to_string(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.push(Param {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }
}

impl RawComponent {
    pub fn find_prop(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

impl Component {
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Component::Event(event) => Some(event),
            Component::Other(_) => None,
        }
    }

    pub fn as_event_mut(&mut self) -> Option<&mut Event> {
        match self {
            Component::Event(event) => Some(event),
            Component::Other(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Event(_) => "VEVENT",
            Component::Other(raw) => &raw.name,
        }
    }
}

impl Default for CalendarDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarDocument {
    /// The empty template: a calendar with no components.
    pub fn new() -> Self {
        CalendarDocument {
            properties: vec![Property::new("VERSION", "2.0"), Property::new("PRODID", PRODID)],
            components: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.components.iter().filter_map(Component::as_event)
    }

    pub fn events_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.components.iter_mut().filter_map(Component::as_event_mut)
    }

    /// Events paired with their position in the component sequence.
    pub fn event_positions(&self) -> impl Iterator<Item = (usize, &Event)> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_event().map(|e| (i, e)))
    }

    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn push_event(&mut self, event: Event) {
        self.components.push(Component::Event(event));
    }

    /// Remove the component at `index`.
    ///
    /// Positions below `index` keep their meaning, so this is safe while
    /// walking the sequence backwards. Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Component {
        self.components.remove(index)
    }

    /// Drop the components at `positions` in one pass, keeping the relative
    /// order of everything else. Returns how many were removed.
    pub fn remove_positions(&mut self, positions: &BTreeSet<usize>) -> usize {
        if positions.is_empty() {
            return 0;
        }

        let before = self.components.len();
        self.components = std::mem::take(&mut self.components)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(i))
            .map(|(_, c)| c)
            .collect();

        before - self.components.len()
    }
}
