//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads configuration
//! 2. Drives the sequencer
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.

mod abort;
mod conflicts;
mod continue_cmd;
mod skip;
mod start;
mod status;

pub use abort::abort;
pub use conflicts::conflicts;
pub use continue_cmd::continue_op;
pub use skip::skip;
pub use start::{start, StartArgs};
pub use status::status;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::{Config, RebaseConfig};
use crate::core::paths::RebasePaths;
use crate::core::step::RebaseStepKind;
use crate::git::{Git, MergeSettings};
use crate::rebase::{RebaseOptions, RebaseResult, RebaseSequencer, RebaseStatus, StepOutcome};
use crate::ui::output::{self, Verbosity};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Start {
            upstream,
            onto,
            branch,
            first_parent,
            exec,
            edit,
        } => start(
            ctx,
            StartArgs {
                upstream,
                onto,
                branch,
                first_parent,
                exec,
                edit,
            },
        ),
        Command::Continue { message } => continue_op(ctx, message),
        Command::Skip => skip(ctx),
        Command::Abort => abort(ctx),
        Command::Status => status(ctx),
        Command::Conflicts { path } => conflicts(ctx, path.as_deref()),
    }
}

/// Global and repo configuration for the repository `git` is opened on.
fn load_config(git: &Git) -> Result<Config> {
    let paths = RebasePaths::from_repo_info(&git.info()?);
    Config::load(Some(&paths)).context("Failed to load configuration")
}

/// Options that print each step as it finishes.
fn rebase_options(config: &RebaseConfig, verbosity: Verbosity) -> RebaseOptions<'static> {
    RebaseOptions::new()
        .with_merge(MergeSettings::from(config))
        .on_step_starting(move |info| output::debug(format!("applying {info}"), verbosity))
        .on_step_completed(move |done| {
            let line = match &done.outcome {
                StepOutcome::Committed(oid) => format!("{} -> {}", done.step, oid.short(7)),
                StepOutcome::AlreadyApplied => format!("{} (already applied)", done.step),
                StepOutcome::Skipped => format!("{} (skipped)", done.step),
                StepOutcome::Executed => format!("{} (done)", done.step),
            };
            output::print(line, verbosity);
        })
}

/// Print how a continue/skip call ended and what to do next.
fn report(seq: &RebaseSequencer, result: &RebaseResult, verbosity: Verbosity) -> Result<()> {
    match result.status {
        RebaseStatus::Complete => {
            let target = seq
                .branch()
                .map(|b| b.to_string())
                .unwrap_or_else(|| "detached HEAD".to_string());
            output::success(
                format!(
                    "Successfully rebased {} onto {} ({} step(s))",
                    target,
                    seq.onto().short(7),
                    result.total_step_count
                ),
                verbosity,
            );
        }
        RebaseStatus::Conflicts => {
            if let Some(info) = &result.current_step_info {
                output::print(format!("Conflicts while applying {info}"), verbosity);
            }
            let lines: Vec<String> = seq
                .conflicts()
                .all()?
                .iter()
                .map(output::format_conflict)
                .collect();
            output::print(output::format_list(&lines, "    "), verbosity);
            output::hint(
                "resolve the conflicts, stage them with `git add`, then run `stepwise continue`",
                verbosity,
            );
            output::hint(
                "or run `stepwise skip` to drop this commit, `stepwise abort` to give up",
                verbosity,
            );
        }
        RebaseStatus::Stop => {
            let Some(info) = &result.current_step_info else {
                return Ok(());
            };
            output::print(format!("Stopped at {info}"), verbosity);
            match (info.kind, &info.exec) {
                (RebaseStepKind::Exec, Some(cmd)) => output::hint(
                    format!("run `{cmd}`, then `stepwise continue`"),
                    verbosity,
                ),
                _ => output::hint(
                    "stage any amendments with `git add`, then run `stepwise continue [-m MESSAGE]`",
                    verbosity,
                ),
            }
        }
    }
    Ok(())
}
