//! skip command - drop the halted step and keep going

use anyhow::{Context as _, Result};

use super::{load_config, rebase_options, report};
use crate::cli::Context;
use crate::rebase::RebaseSequencer;

pub fn skip(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let git = ctx.open_repo()?;
    let config = load_config(&git)?;
    let committer = git
        .default_identity()
        .context("Cannot determine committer identity")?;

    let mut seq = RebaseSequencer::open(git)?;
    let mut opts = rebase_options(&config.rebase(), verbosity);
    let result = seq.skip(&committer, &mut opts)?;
    report(&seq, &result, verbosity)
}
