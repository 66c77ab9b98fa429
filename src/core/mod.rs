//! core
//!
//! Core domain types, schemas, and operations for stepwise.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, RefName, Identity, etc.
//! - [`step`] - Rebase step kinds and descriptors
//! - [`conflict`] - Three-way conflict model over a staging store
//! - [`ops`] - Sequence state persistence and locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Where stepwise keeps its files
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Nothing in here talks to git2; see [`crate::git`] for that

pub mod config;
pub mod conflict;
pub mod ops;
pub mod paths;
pub mod step;
pub mod types;
