//! At-most-once archive outcome for every route input. See `SPEC_FULL.md`
//! §5.7.

pub mod archiver;
pub mod error;

pub use archiver::{Archiver, Category};
pub use error::{ArchiveError, ArchiveResult};
