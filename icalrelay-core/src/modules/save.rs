//! `save-to-file`: write the document as it stands at this step.

use std::path::PathBuf;

use super::params::Params;
use crate::document::CalendarDocument;
use crate::error::RelayResult;
use crate::sink;

#[derive(Debug, Clone)]
pub struct SaveToFile {
    pub path: PathBuf,
}

impl SaveToFile {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        Ok(SaveToFile {
            path: PathBuf::from(params.required("file")?),
        })
    }

    pub fn apply(&self, doc: &CalendarDocument) -> RelayResult<i64> {
        sink::save_to_file(doc, &self.path)?;
        Ok(0)
    }
}
