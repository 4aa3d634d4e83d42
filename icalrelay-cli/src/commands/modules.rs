use anyhow::Result;
use icalrelay_core::ModuleKind;

use crate::render::Render;

pub fn run() -> Result<()> {
    for kind in ModuleKind::ALL {
        println!("{}", kind.render());
    }
    Ok(())
}
