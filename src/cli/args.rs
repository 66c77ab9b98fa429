//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stepwise - a resumable rebase sequencer
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if stepwise was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the current branch's commits onto a new base
    Start {
        /// Commits reachable from here are not replayed [default: repo config `upstream`]
        upstream: Option<String>,

        /// New base for the replayed commits [default: upstream]
        #[arg(long)]
        onto: Option<String>,

        /// Branch to rebase [default: current branch]
        #[arg(long)]
        branch: Option<String>,

        /// Only follow first parents when collecting commits
        #[arg(long)]
        first_parent: bool,

        /// Stop after each replayed commit so this command can be run
        #[arg(short = 'x', long)]
        exec: Option<String>,

        /// Stop at every commit so it can be amended before committing
        #[arg(long)]
        edit: bool,
    },

    /// Finish the current step and keep going
    Continue {
        /// Message for the commit made from the stopped step
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Drop the current step and keep going
    Skip,

    /// Stop rebasing and restore the branch as it was
    Abort,

    /// Show progress of the rebase in progress
    Status,

    /// List conflicted paths in the index
    Conflicts {
        /// Show the three sides of one path
        path: Option<String>,
    },
}
