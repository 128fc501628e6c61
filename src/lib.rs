pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod server;

pub use config::GateConfig;
pub use credentials::{AuthDecision, CredentialStore};
pub use error::AuthFailure;
pub use middleware::{AuthGate, BypassSet, GateOutcome};
pub use proxy::UpstreamProxy;
