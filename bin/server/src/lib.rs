//! skygate web server.
//!
//! This crate wires the login flow, session access gates, and build write
//! access checks into an axum application backed by Postgres.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

#[cfg(test)]
mod test_support;
