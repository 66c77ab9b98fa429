//! continue command - finish the halted step and keep going

use anyhow::{Context as _, Result};

use super::{load_config, rebase_options, report};
use crate::cli::Context;
use crate::rebase::RebaseSequencer;

/// Continue the rebase in progress.
///
/// `message` replaces the commit message of the halted step.
pub fn continue_op(ctx: &Context, message: Option<String>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;
    let config = load_config(&git)?;
    let committer = git
        .default_identity()
        .context("Cannot determine committer identity")?;

    let mut seq = RebaseSequencer::open(git)?;
    let mut opts = rebase_options(&config.rebase(), verbosity);
    opts.message = message;

    let result = seq.continue_rebase(&committer, &mut opts)?;
    report(&seq, &result, verbosity)
}
