//! Application state management

use crate::config::GatewayConfig;
use crate::middleware::AuthResolver;
use crate::registry::EndpointRegistry;
use crate::services::LoginService;
use edgegate_core::{Overlay, SecurityProvider};
use std::sync::Arc;

/// Shared state handed to every handler
///
/// All fields are reference counted; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub overlay: Arc<dyn Overlay>,
    /// Security provider of the primary network
    pub security: Arc<dyn SecurityProvider>,
    pub auth: Arc<AuthResolver>,
    pub login: LoginService,
    pub registry: Arc<EndpointRegistry>,
}
