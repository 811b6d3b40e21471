//! Service layer
//!
//! Services handle everything the run touches on local disk: saving
//! artifacts, indexing them per scene, and reporting the run status.
//!
//! Artifact storage is trait-based so the scheduler can be tested without a
//! filesystem.

mod reporter;
mod scenes;
mod storage;

// Re-export traits
pub use storage::ArtifactStore;

// Re-export implementations
pub use reporter::StatusReporter;
pub use scenes::SceneIndex;
pub use storage::FsArtifactStore;
