//! Writing calendars and configuration to disk.

use std::path::Path;

use tracing::debug;

use crate::document::CalendarDocument;
use crate::error::{RelayError, RelayResult};
use crate::ics::generate_ics;

/// Serialize `doc` and write it to `path`, replacing what was there.
pub fn save_to_file(doc: &CalendarDocument, path: &Path) -> RelayResult<()> {
    let content = generate_ics(doc);

    write_private(path, &content).map_err(|e| {
        RelayError::PersistenceFailure(format!("Could not write {}: {}", path.display(), e))
    })?;

    debug!(path = %path.display(), events = doc.event_count(), "Saved calendar");
    Ok(())
}

/// Write `contents` to `path`, owner-only on unix.
pub(crate) fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // The mode only applies when the file is created
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    std::fs::write(path, contents)?;

    Ok(())
}
