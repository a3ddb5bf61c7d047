//! SNI-based multi-port TLS reverse proxy
//!
//! Every configured listener terminates TLS on its own port, picks a
//! certificate from the ClientHello server name and forwards the decrypted
//! HTTP traffic to the backend port of the route whose domain matches the
//! request's Host header.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod forward;
pub mod listener;
pub mod router;
pub mod sni;
pub mod supervisor;

#[cfg(test)]
mod test_utils;

pub use config::{FailurePolicy, ListenerConfig, ProxyConfig, Route};
pub use error::{ProxyError, Result};
pub use forward::{BackendForwarder, BackendHost};
pub use listener::ProxyListener;
pub use router::DomainRouter;
pub use sni::SniCertResolver;
pub use supervisor::{ListenerHealth, ListenerManager, ListenerState};
