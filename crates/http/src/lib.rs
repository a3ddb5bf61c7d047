//! Edgegate HTTP gateway
//!
//! Exposes overlay services over HTTP, or HTTPS when a certificate is
//! configured. Every registered web service gets an endpoint at
//! `{prefix}{area}/{name}`; requests are authenticated against the
//! network's security provider (with cross-network federation), decoded
//! into the service's message type and forwarded into the overlay. The
//! `client` feature provides the matching REST and GraphQL clients.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod types;

#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod dispatcher;
#[cfg(feature = "server")]
pub mod middleware;
#[cfg(feature = "server")]
pub mod registry;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod services;
#[cfg(feature = "server")]
pub mod state;
#[cfg(feature = "server")]
pub mod tls;

#[cfg(feature = "client")]
pub mod client;

pub use error::{HttpError, Result};

#[cfg(feature = "server")]
pub use crate::config::GatewayConfig;
#[cfg(feature = "server")]
pub use registry::EndpointRegistry;
#[cfg(feature = "server")]
pub use server::{Gateway, GatewayBuilder};
#[cfg(feature = "server")]
pub use state::AppState;
