//! SceneCast Core
//!
//! Core types and abstractions for the SceneCast batch generator.
//!
//! This crate contains:
//! - Domain types: jobs, sessions, artifacts and the run status record
//! - Collaborator contracts: the UI driver, page check and authenticator traits
//!   the orchestration core depends on
//! - Error types raised across those contracts

pub mod domain;
pub mod error;
pub mod ui;

pub use error::{AuthError, DriverError};
pub use ui::{Authenticator, UiDriver, UiProbe};
