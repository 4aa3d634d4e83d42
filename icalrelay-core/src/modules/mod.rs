//! The closed set of transformation modules.
//!
//! A profile names its modules by string; [`ModuleSpec::from_invocation`]
//! turns each name and parameter map into a typed, validated value once,
//! before any calendar is touched. Adding a module is a code change here,
//! never configuration.
//!
//! Modules fall into two trust tiers. Low-privileged modules only rewrite
//! the calendar they are given. Privileged modules reach the network or the
//! filesystem (`add-url` can be pointed at internal hosts, `add-file` can
//! read local files, `save-to-file` can overwrite them), so whoever edits
//! module lists at a restricted tier must be limited to low-privileged
//! modules. Enforcing that is up to the caller; this module only answers
//! [`is_known`] and [`is_low_privileged`].

mod delete;
mod edit;
mod ingest;
mod params;
mod reminder;
mod save;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::CalendarDocument;
use crate::error::{RelayError, RelayResult};
use crate::source::Fetcher;

pub use delete::{DeleteById, DeleteBySummaryRegex, DeleteDuplicates, DeleteTimeframe};
pub use edit::{EditById, EditBySummaryRegex, FieldEdits, OverwriteMode};
pub use ingest::{AddFile, AddUrl};
pub use params::parse_signed_duration;
pub use reminder::AddReminder;
pub use save::SaveToFile;

use params::Params;

/// One configured module: its name, an optional expiry and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInvocation {
    pub name: String,

    /// RFC 3339 time after which the cleanup task drops this invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl ModuleInvocation {
    pub fn new(name: &str) -> Self {
        ModuleInvocation {
            name: name.to_string(),
            expires: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}

/// Every module the relay knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    DeleteBySummaryRegex,
    DeleteById,
    DeleteTimeframe,
    DeleteDuplicates,
    EditById,
    EditBySummaryRegex,
    AddUrl,
    AddFile,
    SaveToFile,
    AddReminder,
}

/// What a module may do to the number of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleClass {
    /// Removes events: delta is zero or negative
    Deletion,
    /// Leaves the event count alone: delta is zero
    Edit,
    /// Brings in events: delta is zero or positive
    Addition,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 10] = [
        ModuleKind::DeleteBySummaryRegex,
        ModuleKind::DeleteById,
        ModuleKind::DeleteTimeframe,
        ModuleKind::DeleteDuplicates,
        ModuleKind::EditById,
        ModuleKind::EditBySummaryRegex,
        ModuleKind::AddUrl,
        ModuleKind::AddFile,
        ModuleKind::SaveToFile,
        ModuleKind::AddReminder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::DeleteBySummaryRegex => "delete-bysummary-regex",
            ModuleKind::DeleteById => "delete-byid",
            ModuleKind::DeleteTimeframe => "delete-timeframe",
            ModuleKind::DeleteDuplicates => "delete-duplicates",
            ModuleKind::EditById => "edit-byid",
            ModuleKind::EditBySummaryRegex => "edit-bysummary-regex",
            ModuleKind::AddUrl => "add-url",
            ModuleKind::AddFile => "add-file",
            ModuleKind::SaveToFile => "save-to-file",
            ModuleKind::AddReminder => "add-reminder",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn class(&self) -> ModuleClass {
        match self {
            ModuleKind::DeleteBySummaryRegex
            | ModuleKind::DeleteById
            | ModuleKind::DeleteTimeframe
            | ModuleKind::DeleteDuplicates => ModuleClass::Deletion,
            ModuleKind::EditById
            | ModuleKind::EditBySummaryRegex
            | ModuleKind::SaveToFile
            | ModuleKind::AddReminder => ModuleClass::Edit,
            ModuleKind::AddUrl | ModuleKind::AddFile => ModuleClass::Addition,
        }
    }

    /// Safe to hand to a restricted editing tier: no network, no filesystem.
    pub fn is_low_privileged(&self) -> bool {
        matches!(
            self,
            ModuleKind::DeleteBySummaryRegex
                | ModuleKind::DeleteById
                | ModuleKind::DeleteTimeframe
                | ModuleKind::DeleteDuplicates
                | ModuleKind::EditById
                | ModuleKind::EditBySummaryRegex
        )
    }

    /// Reject a delta this module's class can never produce.
    pub fn check_delta(&self, delta: i64) -> RelayResult<i64> {
        let plausible = match self.class() {
            ModuleClass::Deletion => delta <= 0,
            ModuleClass::Edit => delta == 0,
            ModuleClass::Addition => delta >= 0,
        };

        if plausible {
            Ok(delta)
        } else {
            Err(RelayError::InvariantViolation {
                module: self.name().to_string(),
                delta,
            })
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RelayError::UnknownModule(s.to_string()))
    }
}

/// Whether `name` is a module the relay can run.
pub fn is_known(name: &str) -> bool {
    ModuleKind::from_name(name).is_some()
}

/// Whether `name` is a known module that is safe for restricted editors.
pub fn is_low_privileged(name: &str) -> bool {
    ModuleKind::from_name(name).is_some_and(|kind| kind.is_low_privileged())
}

/// What a module needs from its surroundings while it runs.
pub struct ExecutionContext<'a> {
    /// The instant `now` bounds resolve to
    pub now: DateTime<Utc>,
    pub fetcher: &'a Fetcher,
}

/// A module with validated parameters, ready to run.
#[derive(Debug, Clone)]
pub enum ModuleSpec {
    DeleteBySummaryRegex(DeleteBySummaryRegex),
    DeleteById(DeleteById),
    DeleteTimeframe(DeleteTimeframe),
    DeleteDuplicates(DeleteDuplicates),
    EditById(EditById),
    EditBySummaryRegex(EditBySummaryRegex),
    AddUrl(AddUrl),
    AddFile(AddFile),
    SaveToFile(SaveToFile),
    AddReminder(AddReminder),
}

impl ModuleSpec {
    pub fn from_invocation(invocation: &ModuleInvocation) -> RelayResult<Self> {
        Self::parse(&invocation.name, &invocation.params)
    }

    pub fn parse(name: &str, params: &BTreeMap<String, String>) -> RelayResult<Self> {
        let kind: ModuleKind = name.parse()?;
        let params = Params::new(kind.name(), params);

        Ok(match kind {
            ModuleKind::DeleteBySummaryRegex => {
                ModuleSpec::DeleteBySummaryRegex(DeleteBySummaryRegex::from_params(&params)?)
            }
            ModuleKind::DeleteById => ModuleSpec::DeleteById(DeleteById::from_params(&params)?),
            ModuleKind::DeleteTimeframe => {
                ModuleSpec::DeleteTimeframe(DeleteTimeframe::from_params(&params)?)
            }
            ModuleKind::DeleteDuplicates => ModuleSpec::DeleteDuplicates(DeleteDuplicates),
            ModuleKind::EditById => ModuleSpec::EditById(EditById::from_params(&params)?),
            ModuleKind::EditBySummaryRegex => {
                ModuleSpec::EditBySummaryRegex(EditBySummaryRegex::from_params(&params)?)
            }
            ModuleKind::AddUrl => ModuleSpec::AddUrl(AddUrl::from_params(&params)?),
            ModuleKind::AddFile => ModuleSpec::AddFile(AddFile::from_params(&params)?),
            ModuleKind::SaveToFile => ModuleSpec::SaveToFile(SaveToFile::from_params(&params)?),
            ModuleKind::AddReminder => ModuleSpec::AddReminder(AddReminder::from_params(&params)?),
        })
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleSpec::DeleteBySummaryRegex(_) => ModuleKind::DeleteBySummaryRegex,
            ModuleSpec::DeleteById(_) => ModuleKind::DeleteById,
            ModuleSpec::DeleteTimeframe(_) => ModuleKind::DeleteTimeframe,
            ModuleSpec::DeleteDuplicates(_) => ModuleKind::DeleteDuplicates,
            ModuleSpec::EditById(_) => ModuleKind::EditById,
            ModuleSpec::EditBySummaryRegex(_) => ModuleKind::EditBySummaryRegex,
            ModuleSpec::AddUrl(_) => ModuleKind::AddUrl,
            ModuleSpec::AddFile(_) => ModuleKind::AddFile,
            ModuleSpec::SaveToFile(_) => ModuleKind::SaveToFile,
            ModuleSpec::AddReminder(_) => ModuleKind::AddReminder,
        }
    }

    /// Run the module against `doc` and return the raw event delta.
    ///
    /// The delta is not checked against the module's class here; the
    /// engine does that for every step.
    pub async fn apply(
        &self,
        doc: &mut CalendarDocument,
        ctx: &ExecutionContext<'_>,
    ) -> RelayResult<i64> {
        match self {
            ModuleSpec::DeleteBySummaryRegex(m) => Ok(m.apply(doc, ctx.now)),
            ModuleSpec::DeleteById(m) => Ok(m.apply(doc)),
            ModuleSpec::DeleteTimeframe(m) => m.apply(doc, ctx.now),
            ModuleSpec::DeleteDuplicates(m) => Ok(m.apply(doc)),
            ModuleSpec::EditById(m) => Ok(m.apply(doc)),
            ModuleSpec::EditBySummaryRegex(m) => m.apply(doc, ctx.now),
            ModuleSpec::AddUrl(m) => m.apply(doc, ctx.fetcher).await,
            ModuleSpec::AddFile(m) => m.apply(doc),
            ModuleSpec::SaveToFile(m) => m.apply(doc),
            ModuleSpec::AddReminder(m) => Ok(m.apply(doc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_roundtrip() {
        for kind in ModuleKind::ALL {
            assert_eq!(ModuleKind::from_name(kind.name()), Some(kind));
            assert!(is_known(kind.name()));
        }
        assert!(!is_known("delete-everything"));
    }

    #[test]
    fn test_low_privileged_set() {
        let low: Vec<_> = ModuleKind::ALL
            .into_iter()
            .filter(|k| k.is_low_privileged())
            .map(|k| k.name())
            .collect();

        assert_eq!(
            low,
            vec![
                "delete-bysummary-regex",
                "delete-byid",
                "delete-timeframe",
                "delete-duplicates",
                "edit-byid",
                "edit-bysummary-regex",
            ]
        );
        for privileged in ["add-url", "add-file", "save-to-file", "add-reminder"] {
            assert!(!is_low_privileged(privileged), "{} must be privileged", privileged);
        }
        assert!(!is_low_privileged("unknown-module"));
    }

    #[test]
    fn test_positive_delta_from_deletion_is_invariant_violation() {
        let err = ModuleKind::DeleteBySummaryRegex.check_delta(1).unwrap_err();
        assert!(matches!(err, RelayError::InvariantViolation { delta: 1, .. }));

        assert_eq!(ModuleKind::DeleteBySummaryRegex.check_delta(-3).unwrap(), -3);
        assert!(ModuleKind::EditById.check_delta(-1).is_err());
        assert!(ModuleKind::AddFile.check_delta(-1).is_err());
        assert_eq!(ModuleKind::AddFile.check_delta(4).unwrap(), 4);
    }

    #[test]
    fn test_unknown_module_is_rejected_at_parse() {
        let invocation = ModuleInvocation::new("rewrite-everything");
        assert!(matches!(
            ModuleSpec::from_invocation(&invocation),
            Err(RelayError::UnknownModule(name)) if name == "rewrite-everything"
        ));
    }

    #[test]
    fn test_missing_mandatory_parameter_is_reported_before_running() {
        for name in ["delete-byid", "edit-byid", "add-url", "add-file", "save-to-file", "add-reminder"] {
            let err = ModuleSpec::from_invocation(&ModuleInvocation::new(name)).unwrap_err();
            assert!(
                matches!(err, RelayError::MissingParameter { .. }),
                "{} should require a parameter, got {:?}",
                name,
                err
            );
        }
    }
}
