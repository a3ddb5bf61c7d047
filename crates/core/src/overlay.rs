//! Overlay request abstraction
//!
//! The overlay is the service-mesh style network that hosts the backend
//! services. The gateway only needs one capability from it: send a typed
//! request to a `(service name, service area)` pair and collect the
//! returned elements.

use crate::error::OverlayError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Operation requested from an overlay service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Post,
    Put,
    Patch,
    Delete,
    Get,
    MapRPost,
    MapRPut,
    MapRPatch,
    MapRDelete,
    MapRGet,
}

impl Action {
    /// Map an HTTP method onto an action. Unknown methods read as `Get`.
    pub fn from_method(method: &http::Method) -> Self {
        match *method {
            http::Method::POST => Self::Post,
            http::Method::PUT => Self::Put,
            http::Method::PATCH => Self::Patch,
            http::Method::DELETE => Self::Delete,
            _ => Self::Get,
        }
    }

    /// The fan-out variant of this action
    pub fn map_reduce(self) -> Self {
        match self {
            Self::Post | Self::MapRPost => Self::MapRPost,
            Self::Put | Self::MapRPut => Self::MapRPut,
            Self::Patch | Self::MapRPatch => Self::MapRPatch,
            Self::Delete | Self::MapRDelete => Self::MapRDelete,
            Self::Get | Self::MapRGet => Self::MapRGet,
        }
    }

    pub fn is_map_reduce(self) -> bool {
        matches!(
            self,
            Self::MapRPost | Self::MapRPut | Self::MapRPatch | Self::MapRDelete | Self::MapRGet
        )
    }

    /// Pick the action for a decoded request.
    ///
    /// A generic query whose text mentions `mapreduce` upgrades the action
    /// to its fan-out variant.
    pub fn for_request(method: &http::Method, payload: &dyn Message) -> Self {
        let action = Self::from_method(method);
        match payload.downcast_ref::<crate::message::Query>() {
            Some(query) if query.is_map_reduce() => action.map_reduce(),
            _ => action,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the gateway picks a service instance when no explicit target is set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMethod {
    #[default]
    Leader,
    Local,
    Proximity,
}

/// Resolved addressing mode for a single overlay call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// A specific node identified by its address
    Direct(String),
    Leader,
    Local,
    Proximity,
}

impl Addressing {
    /// An explicit, non-empty target overrides the routing method
    pub fn resolve(target: Option<&str>, method: RoutingMethod) -> Self {
        match target.map(str::trim) {
            Some(target) if !target.is_empty() => Self::Direct(target.to_string()),
            _ => match method {
                RoutingMethod::Leader => Self::Leader,
                RoutingMethod::Local => Self::Local,
                RoutingMethod::Proximity => Self::Proximity,
            },
        }
    }
}

/// One request into the overlay
#[derive(Debug)]
pub struct OverlayCall {
    pub service_name: String,
    pub service_area: u8,
    pub action: Action,
    pub payload: Box<dyn Message>,
    pub timeout: Duration,
    /// Identity of the authenticated caller, when authentication is enabled
    pub identity: Option<String>,
    pub addressing: Addressing,
}

/// Request capability of the overlay runtime
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Deliver `call` and return the response elements.
    ///
    /// An empty vector is a valid answer.
    async fn request(&self, call: OverlayCall) -> Result<Vec<Box<dyn Message>>, OverlayError>;
}
