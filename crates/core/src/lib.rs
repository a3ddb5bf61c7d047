//! Edgegate core types and collaborator interfaces
//!
//! The gateway never talks to the overlay, the credential store or the type
//! registry directly. It goes through the traits defined here so the HTTP
//! and proxy crates stay independent of any particular overlay runtime.

pub mod error;
pub mod message;
pub mod overlay;
pub mod security;
pub mod service;
pub mod validation;

#[cfg(feature = "tracing")]
pub mod telemetry;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use error::{CoreError, CoreResult, OverlayError, ProviderError};
pub use message::{
    JsonCodec, ListAggregator, Message, MessageCodec, Query, ResultAggregator,
};
pub use overlay::{Action, Addressing, Overlay, OverlayCall, RoutingMethod};
pub use security::{AuthOutcome, SecurityProvider, TfaSetup, TokenValidation};
pub use service::{ServiceEndpoint, WebService, WebServiceBuilder};
pub use validation::{ValidateConfig, validators};
