use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use icalrelay_core::sink::save_to_file;
use icalrelay_core::{ConfigStore, ErrorPolicy, Relay};
use owo_colors::OwoColorize;

use crate::render::Render;

pub async fn run(
    store: Arc<ConfigStore>,
    profile: &str,
    output: Option<&Path>,
    keep_going: bool,
) -> Result<()> {
    let relay = Relay::from_store(store).await?;
    let policy = if keep_going {
        ErrorPolicy::Continue
    } else {
        ErrorPolicy::Abort
    };

    let rendered = relay.render_profile(profile, policy).await?;
    eprintln!("{} {}", profile.bold(), rendered.report.render());

    if policy == ErrorPolicy::Abort && !rendered.report.is_success() {
        anyhow::bail!("Rendering '{}' stopped at a failing module", profile);
    }

    match output {
        Some(path) => {
            save_to_file(&rendered.document, path)?;
            eprintln!(
                "Wrote {} events to {}",
                rendered.document.event_count(),
                path.display()
            );
        }
        None => print!("{}", rendered.to_ics()),
    }

    Ok(())
}
