//! Colored terminal rendering for relay types.

use icalrelay_core::engine::{PipelineReport, StepError};
use icalrelay_core::modules::{ModuleClass, ModuleKind};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for ModuleClass {
    fn render(&self) -> String {
        match self {
            ModuleClass::Deletion => "deletion".red().to_string(),
            ModuleClass::Edit => "edit".yellow().to_string(),
            ModuleClass::Addition => "addition".green().to_string(),
        }
    }
}

impl Render for ModuleKind {
    fn render(&self) -> String {
        let tier = if self.is_low_privileged() {
            "low-privileged".dimmed().to_string()
        } else {
            "privileged".magenta().to_string()
        };

        format!("{:<24} {:<10} {}", self.name(), self.class().render(), tier)
    }
}

impl Render for StepError {
    fn render(&self) -> String {
        format!(
            "{} {} {}",
            format!("#{}", self.index + 1).dimmed(),
            self.module.bold(),
            self.error.to_string().red()
        )
    }
}

impl Render for PipelineReport {
    fn render(&self) -> String {
        let delta = match self.delta {
            d if d > 0 => format!("+{d}").green().to_string(),
            d if d < 0 => d.to_string().red().to_string(),
            d => d.to_string(),
        };

        let mut lines = vec![format!(
            "{} {} events, {} {} applied",
            "delta".dimmed(),
            delta,
            self.applied,
            pluralize("module", self.applied)
        )];
        lines.extend(self.errors.iter().map(|e| format!("   {}", e.render())));
        lines.join("\n")
    }
}

pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
