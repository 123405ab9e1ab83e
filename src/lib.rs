//! Cache Machine - A size-bounded in-memory cache server
//!
//! Provides an LRU/LFU key/value cache behind a RESP-style protocol, with an
//! admin metrics endpoint and snapshot persistence.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, PolicyKind, StringCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use protocol::{RespClient, RespServer};
pub use tasks::spawn_snapshot_task;
