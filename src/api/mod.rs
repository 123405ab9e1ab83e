//! API Module
//!
//! Read-only admin HTTP endpoint over the cache metrics.
//!
//! # Endpoints
//! - `GET /admin` - HTML metrics page
//! - `GET /stats` - Metrics as JSON
//! - `GET /health` - Health check endpoint
//! - `POST /snapshot` - Persist the cache now

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
