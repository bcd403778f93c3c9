//! Wires the Command Registry, Input Validator, Temp Artifact Manager,
//! Executor Pool, Output Parser Framework, Stream Manager, and Resilience
//! Layer into one constructed [`BridgeService`] (§2, §9).

mod collaborators;
mod config;
mod context;
mod error;
mod service;

pub use collaborators::{AuthProvider, CliBinaryLocator, FixedCliBinaryLocator, StaticAuthProvider};
pub use config::BridgeConfig;
pub use context::RequestContext;
pub use error::{BridgeError, ErrorBody};
pub use service::{BridgeService, SubmitOutcome};
