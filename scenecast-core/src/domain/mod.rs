//! Core domain types
//!
//! These types are shared between the runner (which drives jobs through their
//! lifecycle) and the driver (which produces sessions and artifact references).

pub mod job;
pub mod run;
