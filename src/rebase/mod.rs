//! rebase
//!
//! The rebase sequencer.
//!
//! # Modules
//!
//! - [`sequencer`] - The state machine: init, continue, skip, abort
//! - [`todo`] - Editable step plan used at init
//! - [`options`] - Callbacks and merge settings
//! - [`result`] - Per-call results and per-step reports
//! - [`error`] - Sequencer errors
//!
//! # Supported step kinds
//!
//! | Kind | Behavior |
//! |------|----------|
//! | `pick` | Applied and committed automatically |
//! | `reword`, `edit` | Applied and staged, then the sequence stops; `continue` commits the index |
//! | `exec` | The sequence stops with the command in the step info; `continue` moves on |
//! | `squash`, `fixup` | Rejected with [`RebaseError::UnsupportedOperation`] |
//!
//! The sequencer never runs exec commands itself.
//!
//! # Example
//!
//! ```ignore
//! use stepwise::git::Git;
//! use stepwise::rebase::{InitOptions, RebaseOptions, RebaseSequencer, RebaseStatus};
//!
//! let git = Git::open(Path::new("."))?;
//! let committer = git.default_identity()?;
//! let mut seq = RebaseSequencer::init(git, "main", InitOptions::new())?;
//! let result = seq.continue_rebase(&committer, &mut RebaseOptions::new())?;
//! if result.status == RebaseStatus::Conflicts {
//!     for conflict in seq.conflicts().all()? {
//!         println!("{}: {}", conflict.path(), conflict.describe());
//!     }
//! }
//! ```

pub mod error;
pub mod options;
pub mod result;
pub mod sequencer;
pub mod todo;

pub use error::RebaseError;
pub use options::{InitOptions, RebaseOptions};
pub use result::{AbortOutcome, AfterStepInfo, RebaseResult, RebaseStatus, StepOutcome};
pub use sequencer::RebaseSequencer;
pub use todo::TodoList;
