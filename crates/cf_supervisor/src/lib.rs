//! Supervisor: loads route configuration and runs the set of route
//! processors it describes. See `SPEC_FULL.md` §5.10.

pub mod supervisor;

pub use supervisor::{load_config, Supervisor};
