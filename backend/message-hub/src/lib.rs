//! Message hub
//!
//! Stores messages, comments, likes and per-user visibility overrides for the
//! users homed on this hub, and serves them to users of other hubs holding a
//! capability token signed by their home hub.
//!
//! - [`capability`]: token verification
//! - [`db`]: content store (Postgres)
//! - [`services`]: message operations and the attachment pipeline
//! - [`notifications`]: fire-and-forget fan-out
//! - [`storage`]: blob store (S3)

pub mod bootstrap;
pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notifications;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use services::MessageService;
