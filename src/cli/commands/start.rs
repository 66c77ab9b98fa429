//! start command - plan a rebase and run it until it completes or halts

use anyhow::{anyhow, Context as _, Result};

use super::{load_config, rebase_options, report};
use crate::cli::Context;
use crate::core::step::RebaseStepKind;
use crate::rebase::{InitOptions, RebaseSequencer};
use crate::ui::output;

/// Arguments for `stepwise start`.
#[derive(Debug, Clone, Default)]
pub struct StartArgs {
    pub upstream: Option<String>,
    pub onto: Option<String>,
    pub branch: Option<String>,
    pub first_parent: bool,
    pub exec: Option<String>,
    pub edit: bool,
}

/// Start a rebase.
///
/// The upstream falls back to the repo config's `upstream`; the committer
/// comes from `user.name` / `user.email`.
pub fn start(ctx: &Context, args: StartArgs) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;
    let config = load_config(&git)?;
    let rebase_config = config.rebase();

    let upstream = args
        .upstream
        .or_else(|| config.default_upstream().map(str::to_string))
        .ok_or_else(|| {
            anyhow!("No upstream given and none configured (set `upstream` in the repo config)")
        })?;
    let committer = git
        .default_identity()
        .context("Cannot determine committer identity")?;

    let mut init = InitOptions::new()
        .first_parent_only(args.first_parent || rebase_config.first_parent_only);
    if let Some(onto) = args.onto {
        init = init.onto(onto);
    }
    if let Some(branch) = args.branch {
        init = init.branch(branch);
    }
    let exec = args.exec;
    let edit = args.edit;
    if exec.is_some() || edit {
        init = init.edit_todo(move |todo| {
            if edit {
                for i in 0..todo.len() {
                    todo.set_kind(i, RebaseStepKind::Edit)?;
                }
            }
            if let Some(cmd) = &exec {
                todo.exec_after_each(cmd);
            }
            Ok(())
        });
    }

    let mut seq =
        RebaseSequencer::init(git, &upstream, init).context("Failed to start rebase")?;
    output::print(
        format!(
            "Rebasing {} step(s) onto {}",
            seq.total_step_count(),
            seq.onto().short(7)
        ),
        verbosity,
    );

    let mut opts = rebase_options(&rebase_config, verbosity);
    let result = seq.continue_rebase(&committer, &mut opts)?;
    report(&seq, &result, verbosity)
}
