//! Core of the calendar relay.
//!
//! This crate turns a source calendar into the calendar a profile serves:
//! - `ics` and `document` parse feeds into an editable model and write it back
//! - `modules` holds the closed set of transformation modules
//! - `engine` runs a profile's modules in order against one document
//! - `config`, `relay` and `cleanup` tie profiles, rendering and module
//!   expiry together

pub mod cleanup;
pub mod config;
pub mod constants;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod ics;
pub mod modules;
pub mod recurrence;
pub mod relay;
pub mod sink;
pub mod source;
pub mod time_window;

pub use crate::config::{ConfigStore, RelayConfig};
pub use document::CalendarDocument;
pub use engine::{Engine, ErrorPolicy, Pipeline, PipelineReport};
pub use error::{RelayError, RelayResult};
pub use modules::{ModuleInvocation, ModuleKind, ModuleSpec, is_known, is_low_privileged};
pub use relay::{Relay, RenderedProfile};
pub use source::Fetcher;
