#![forbid(unsafe_code)]

//! `metagen-queue`: generation session queue and pipeline orchestrator.
//!
//! Sessions are enqueued with an immutable input snapshot, run through
//! optional keyword grounding and metadata generation under a concurrency
//! ceiling, and settle as `completed`, `failed`, or `cancelled`.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod store;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
