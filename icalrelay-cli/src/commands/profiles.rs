use std::sync::Arc;

use anyhow::Result;
use icalrelay_core::ConfigStore;
use owo_colors::OwoColorize;

use crate::render::pluralize;

pub async fn run(store: Arc<ConfigStore>) -> Result<()> {
    let config = store.snapshot().await;

    if config.profiles.is_empty() {
        println!("{}", "No profiles configured".dimmed());
        return Ok(());
    }

    for (name, profile) in &config.profiles {
        let visibility = if profile.public {
            "public".green().to_string()
        } else {
            "private".dimmed().to_string()
        };
        let source = if profile.source.is_empty() {
            "(empty)"
        } else {
            profile.source.as_str()
        };
        let count = profile.modules.len();

        println!(
            "{} {} {} {}",
            name.bold(),
            visibility,
            source.dimmed(),
            format!("{} {}", count, pluralize("module", count)).dimmed()
        );
    }

    Ok(())
}
