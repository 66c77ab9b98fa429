//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All terminal output from the CLI goes through this module so that
//! `--quiet` and `--debug` behave the same everywhere.

pub mod output;
