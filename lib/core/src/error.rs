//! Result alias for collaborator boundaries.
//!
//! Domain error enums live in the crate that owns them. Calls that cross
//! into persistence or other external collaborators return them wrapped in
//! a rootcause `Report`, so the failure chain survives to the log line.

use rootcause::Report;

/// A `Result` whose error is a `Report` carrying context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
