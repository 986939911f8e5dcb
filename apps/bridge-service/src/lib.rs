// Host wiring for the bridge: logging, start-up and shutdown.
// A host embeds `BridgeService` with its own `DaemonConnector`.

pub mod error;
pub mod logger;
pub mod service;

pub use error::ServiceError;
pub use service::BridgeService;
