mod common;

use std::path::Path;
use std::sync::Arc;

use icalrelay_core::ics::parse_calendar;
use icalrelay_core::{ConfigStore, ErrorPolicy, Relay, RelayError};

fn write_config(dir: &Path, body: &str) -> Arc<ConfigStore> {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    Arc::new(ConfigStore::open(&path).unwrap())
}

#[test_log::test(tokio::test)]
async fn test_render_profile_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ics");
    let extra = dir.path().join("extra.ics");
    let saved = dir.path().join("saved.ics");
    std::fs::write(&base, common::calendar("base", 4)).unwrap();
    std::fs::write(&extra, common::calendar("extra", 2)).unwrap();

    let store = write_config(
        dir.path(),
        &format!(
            r#"
[profiles.team]
source = "{base}"
public = true

[[profiles.team.modules]]
name = "delete-bysummary-regex"
regex = "^base [01]$"

[[profiles.team.modules]]
name = "edit-byid"
id = "base-2"
overwrite = "false"
new-summary = "moved"

[[profiles.team.modules]]
name = "add-file"
filename = "{extra}"

[[profiles.team.modules]]
name = "add-reminder"
time = "15M"

[[profiles.team.modules]]
name = "save-to-file"
file = "{saved}"
"#,
            base = base.display(),
            extra = extra.display(),
            saved = saved.display(),
        ),
    );

    let relay = Relay::from_store(store).await.unwrap();
    let rendered = relay
        .render_profile("team", ErrorPolicy::Abort)
        .await
        .unwrap();

    assert!(rendered.report.is_success());
    assert_eq!(rendered.report.delta, 0, "two removed, two added");
    assert_eq!(rendered.report.applied, 5);

    let uids: Vec<_> = rendered.document.events().map(|e| e.uid().to_string()).collect();
    assert_eq!(uids, vec!["base-2", "base-3", "extra-0", "extra-1"]);
    assert_eq!(
        rendered.document.events().next().and_then(|e| e.summary()).as_deref(),
        Some("base 2; moved")
    );
    assert!(rendered.document.events().all(|e| e.alarms.len() == 1));

    let on_disk = parse_calendar(&std::fs::read_to_string(&saved).unwrap()).unwrap();
    let saved_uids: Vec<_> = on_disk.events().map(|e| e.uid().to_string()).collect();
    assert_eq!(saved_uids, uids);
    assert_eq!(
        on_disk.events().next().and_then(|e| e.summary()).as_deref(),
        Some("base 2; moved")
    );
    assert!(on_disk.events().all(|e| e.alarms.len() == 1));

    let served = parse_calendar(&rendered.to_ics()).unwrap();
    assert_eq!(served.event_count(), 4);
}

#[test_log::test(tokio::test)]
async fn test_render_with_keep_going_collects_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_config(
        dir.path(),
        r#"
[profiles.empty]
source = ""

[[profiles.empty.modules]]
name = "add-file"
filename = "/nonexistent/calendar.ics"

[[profiles.empty.modules]]
name = "no-such-module"

[[profiles.empty.modules]]
name = "delete-duplicates"
"#,
    );
    let relay = Relay::from_store(store).await.unwrap();

    let rendered = relay
        .render_profile("empty", ErrorPolicy::Continue)
        .await
        .unwrap();
    assert_eq!(rendered.report.errors.len(), 2);
    assert_eq!(rendered.report.applied, 1);
    assert_eq!(rendered.document.event_count(), 0);

    let aborted = relay
        .render_profile("empty", ErrorPolicy::Abort)
        .await
        .unwrap();
    assert_eq!(aborted.report.errors.len(), 1);
    assert_eq!(aborted.report.applied, 0);
}

#[test_log::test(tokio::test)]
async fn test_invalid_module_under_abort_runs_no_step() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ics");
    let saved = dir.path().join("saved.ics");
    std::fs::write(&base, common::calendar("base", 2)).unwrap();

    let store = write_config(
        dir.path(),
        &format!(
            r#"
[profiles.team]
source = "{base}"

[[profiles.team.modules]]
name = "save-to-file"
file = "{saved}"

[[profiles.team.modules]]
name = "delete-byid"
id = "base-0"

[[profiles.team.modules]]
name = "delete-bysummary-regex"
regex = "("
"#,
            base = base.display(),
            saved = saved.display(),
        ),
    );
    let relay = Relay::from_store(store).await.unwrap();

    let aborted = relay
        .render_profile("team", ErrorPolicy::Abort)
        .await
        .unwrap();
    assert_eq!(aborted.report.errors.len(), 1);
    assert_eq!(aborted.report.errors[0].index, 2);
    assert_eq!(aborted.report.applied, 0);
    assert_eq!(aborted.report.delta, 0);
    assert!(!saved.exists());

    let continued = relay
        .render_profile("team", ErrorPolicy::Continue)
        .await
        .unwrap();
    assert_eq!(continued.report.applied, 2);
    assert!(saved.exists());
    assert_eq!(continued.document.event_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_render_remote_source() {
    let addr = common::serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = write_config(
        dir.path(),
        &format!(
            r#"
[profiles.remote]
source = "http://{addr}/feed.ics"

[[profiles.remote.modules]]
name = "delete-byid"
id = "remote-1"

[profiles.down]
source = "http://{addr}/down.ics"
"#
        ),
    );
    let relay = Relay::from_store(store).await.unwrap();

    let remote = relay
        .render_profile("remote", ErrorPolicy::Abort)
        .await
        .unwrap();
    assert_eq!(remote.report.delta, -1);
    assert_eq!(remote.document.event_count(), 1);
    assert_eq!(
        remote
            .document
            .property("X-WR-TIMEZONE")
            .map(|p| p.value.as_str()),
        Some("America/New_York")
    );

    let down = relay.render_profile("down", ErrorPolicy::Abort).await.unwrap();
    assert_eq!(down.document.event_count(), 0);
    assert!(down.document.property("PRODID").is_some());
}

#[test_log::test(tokio::test)]
async fn test_unknown_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_config(dir.path(), "[profiles.a]\nsource = \"\"\n");
    let relay = Relay::from_store(store).await.unwrap();

    let result = relay.render_profile("b", ErrorPolicy::Abort).await;
    assert!(matches!(result, Err(RelayError::NotFound(_))));
}
