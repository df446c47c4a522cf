//! Error type for task service operations.
//!
//! The store itself never fails: absence is reported as `None` / `false`. The
//! service turns that into [`Error::NotFound`], the only failure a caller can
//! observe. Nonexistent tasks and tasks owned by someone else are reported
//! identically.

use crate::PublicId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `taskvault` can emit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No task with this identifier exists in the caller's partition.
    #[error("task {id} not found")]
    NotFound { id: PublicId },
}
