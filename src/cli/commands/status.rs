//! status command - show progress of the rebase in progress

use anyhow::Result;

use crate::cli::Context;
use crate::core::ops::{HaltReason, SequencePhase};
use crate::rebase::RebaseSequencer;
use crate::ui::output;

pub fn status(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;

    if !RebaseSequencer::in_progress(&git)? {
        output::print("No rebase in progress", verbosity);
        return Ok(());
    }
    let seq = RebaseSequencer::open(git)?;

    let target = seq
        .branch()
        .map(|b| b.to_string())
        .unwrap_or_else(|| "detached HEAD".to_string());
    output::print(
        format!(
            "Rebasing {} onto {} ({}/{} done)",
            target,
            seq.onto().short(7),
            seq.completed_step_count(),
            seq.total_step_count()
        ),
        verbosity,
    );
    let phase = match seq.phase() {
        SequencePhase::NotStarted => "not started",
        SequencePhase::StepInProgress => "in progress",
        SequencePhase::Halted(HaltReason::Conflicts) => "stopped on conflicts",
        SequencePhase::Halted(HaltReason::Stop) => "stopped for you",
        SequencePhase::Complete => "complete",
    };
    output::print(format!("State: {phase}"), verbosity);

    let current = seq.current_step_index();
    for step in seq.steps() {
        let marker = match current {
            Some(i) if step.index < i => "  done ",
            Some(i) if step.index == i => "  next>",
            None => "  done ",
            _ => "       ",
        };
        output::print(format!("{marker} {}", step.todo_line()), verbosity);
    }
    Ok(())
}
