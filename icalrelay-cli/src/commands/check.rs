use std::sync::Arc;

use anyhow::Result;
use icalrelay_core::ConfigStore;
use owo_colors::OwoColorize;

use crate::render::{Render, pluralize};

pub async fn run(store: Arc<ConfigStore>) -> Result<()> {
    let config = store.snapshot().await;
    let mut invalid = 0;

    for (name, profile) in &config.profiles {
        match profile.validate() {
            Ok(pipeline) => {
                println!(
                    "{} {} ({} {})",
                    "✓".green(),
                    name,
                    pipeline.len(),
                    pluralize("module", pipeline.len())
                );

                // Only admins should be able to add these
                for step in pipeline.steps() {
                    let kind = step.kind();
                    if !kind.is_low_privileged() {
                        println!("   {} {}", "privileged".magenta(), kind.name());
                    }
                }
            }
            Err(errors) => {
                invalid += 1;
                println!("{} {}", "✗".red(), name);
                for error in &errors {
                    println!("   {}", error.render());
                }
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!(
            "{} {} with invalid modules",
            invalid,
            pluralize("profile", invalid)
        );
    }

    Ok(())
}
