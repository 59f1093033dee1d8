//! BITS Server Library
//!
//! Server side of the BITS upload protocol. The protocol engine in `bits`
//! is transport-independent; `routes` mounts it on an axum router.
//!
//! # Modules
//!
//! - `bits`: sessions, fragment reassembly, dispatch and wire responses
//! - `placement`: listener that moves completed files into a storage root
//! - `routes`: axum adapter and health check

pub mod bits;
pub mod config;
pub mod error;
pub mod placement;
pub mod routes;
pub mod state;

pub use bits::{BitsEvent, BitsHandler, BitsRequest, BitsResponse, EventListener};
pub use config::{BitsConfig, Config, ServerConfig};
pub use error::{BitsError, ConfigError};
pub use state::AppState;
