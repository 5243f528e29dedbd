//! Core types shared by the skygate crates.
//!
//! This crate provides the identifier newtypes for externally-owned entities
//! (teams and builds) and the `Result` alias used for collaborator calls.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{BuildId, ParseIdError, TeamId};
