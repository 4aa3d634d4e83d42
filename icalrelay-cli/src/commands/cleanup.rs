use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use icalrelay_core::ConfigStore;
use icalrelay_core::cleanup::CleanupTask;
use owo_colors::OwoColorize;

use crate::render::pluralize;

pub async fn run(store: Arc<ConfigStore>, watch: bool) -> Result<()> {
    if !watch {
        let expired = store.cleanup_expired(Utc::now()).await?;
        for module in &expired {
            println!(
                "{} {} #{} {}",
                "-".red(),
                module.profile.bold(),
                module.index + 1,
                module.module.name
            );
        }
        println!(
            "Removed {} expired {}",
            expired.len(),
            pluralize("module", expired.len())
        );
        return Ok(());
    }

    let interval = store.read(|c| c.server.cleanup_interval()).await?;
    let handle = CleanupTask::spawn(store, interval);

    tokio::signal::ctrl_c().await?;
    handle.abort();
    eprintln!("{}", "Cleanup stopped".dimmed());

    Ok(())
}
