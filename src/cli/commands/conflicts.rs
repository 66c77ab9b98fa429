//! conflicts command - list conflicted paths in the index

use anyhow::{bail, Result};

use crate::cli::Context;
use crate::core::conflict::ConflictIndex;
use crate::ui::output;

/// List every conflict, or show the sides of one path.
pub fn conflicts(ctx: &Context, path: Option<&str>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;
    let index = ConflictIndex::new(&git);

    if let Some(path) = path {
        let Some(conflict) = index.get(path)? else {
            bail!("No conflict at '{path}'");
        };
        output::print(output::format_conflict(&conflict), verbosity);
        output::print(output::format_conflict_sides(&conflict), verbosity);
        return Ok(());
    }

    let all = index.all()?;
    if all.is_empty() {
        output::print("No conflicts", verbosity);
        return Ok(());
    }
    let lines: Vec<String> = all.iter().map(output::format_conflict).collect();
    output::print(output::format_list(&lines, ""), verbosity);
    Ok(())
}
