//! Response models for the admin endpoint
//!
//! Serde DTOs serialized into the admin JSON responses.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, SnapshotResponse, StatsResponse};
