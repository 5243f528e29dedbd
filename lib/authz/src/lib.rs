//! Build ownership checks for skygate.
//!
//! A caller may write to a build only when both the caller's team and the
//! team named in the request own it. Builds are read through the `BuildsDb`
//! collaborator; this crate never writes them.

mod error;
mod policy;
mod types;

pub use error::{BuildAccessError, BuildLookupError};
pub use policy::BuildWritePolicy;
pub use types::{Build, BuildsDb};
