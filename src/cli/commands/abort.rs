//! abort command - discard the rebase and restore the original branch

use anyhow::Result;

use crate::cli::Context;
use crate::rebase::{AbortOutcome, RebaseSequencer};
use crate::ui::output;

/// Abort the rebase in progress. Without one this is a no-op.
pub fn abort(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;

    match RebaseSequencer::abort_in(&git)? {
        AbortOutcome::Aborted { restored, branch } => {
            let target = branch
                .map(|b| b.to_string())
                .unwrap_or_else(|| "HEAD".to_string());
            output::success(
                format!("Aborted; {} is back at {}", target, restored.short(7)),
                verbosity,
            );
        }
        AbortOutcome::Discarded => output::warn(
            "the rebase state was unreadable and has been removed; HEAD was left where it is",
            verbosity,
        ),
        AbortOutcome::NothingToAbort => output::print("No rebase in progress", verbosity),
    }
    Ok(())
}
