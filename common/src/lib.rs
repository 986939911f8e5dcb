//! Leaf types shared by every crate in the bridge workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error locations and secret-bearing value types
//! - **bridge-core**: actors, caches, hub and IPC transport
//! - **bridge-service**: host wiring (logging, start-up, shutdown)

pub mod account_token;
pub mod error;

pub use account_token::AccountToken;
pub use error::error_location::ErrorLocation;
