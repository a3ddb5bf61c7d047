//! The gateway owner type
//!
//! A [`Gateway`] owns everything a running gateway shares between requests:
//! the endpoint registry, the federation map and the authentication switch.
//! Two gateways in the same process never see each other's state.

use crate::config::GatewayConfig;
use crate::dispatcher;
use crate::middleware::AuthResolver;
use crate::registry::EndpointRegistry;
use crate::routes;
use crate::services::{FederationMap, LoginService};
use crate::state::AppState;
use crate::tls;
use axum::Router;
use edgegate_core::{CoreError, Overlay, SecurityProvider, ValidateConfig, WebService};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct Gateway {
    state: AppState,
    federation: Arc<FederationMap>,
}

impl Gateway {
    pub fn builder(
        overlay: Arc<dyn Overlay>,
        security: Arc<dyn SecurityProvider>,
    ) -> GatewayBuilder {
        GatewayBuilder {
            config: GatewayConfig::default(),
            overlay,
            security,
            adjacent: Vec::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    /// Expose a web service. Returns `false` if its endpoint already exists.
    pub fn register(&self, service: WebService) -> bool {
        self.state.registry.register(service)
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.state.registry
    }

    pub fn federation(&self) -> &FederationMap {
        &self.federation
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router serving the auth endpoints and every registered service
    ///
    /// Services registered after the router is built are served as well.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::router())
            .fallback(dispatcher::dispatch)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until the server fails.
    ///
    /// With a configured certificate and key the gateway speaks HTTPS. If
    /// they cannot be loaded it logs the error and serves plain HTTP.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let prefix = self.state.config.prefix.clone();
        let router = self.router();

        if let Some((cert_file, key_file)) = self.state.config.tls_files() {
            match tls::load_acceptor(cert_file, key_file) {
                Ok(acceptor) => {
                    info!(%addr, %prefix, "gateway listening with TLS");
                    return tls::serve_tls(listener, acceptor, router).await;
                }
                Err(e) => warn!("failed to load gateway certificate, serving plain HTTP: {e}"),
            }
        }

        info!(%addr, %prefix, "gateway listening");
        axum::serve(listener, router).await
    }
}

pub struct GatewayBuilder {
    config: GatewayConfig,
    overlay: Arc<dyn Overlay>,
    security: Arc<dyn SecurityProvider>,
    adjacent: Vec<Arc<dyn SecurityProvider>>,
}

impl GatewayBuilder {
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an adjacent network whose logins are federated with the primary
    pub fn adjacent(mut self, security: Arc<dyn SecurityProvider>) -> Self {
        self.adjacent.push(security);
        self
    }

    pub fn build(self) -> Result<Gateway, CoreError> {
        self.config
            .validate()
            .map_err(|e| CoreError::invalid_config(e.to_string()))?;

        let config = Arc::new(self.config);
        let federation = Arc::new(FederationMap::new());
        let adjacent: Arc<[Arc<dyn SecurityProvider>]> = self.adjacent.into();

        let auth = AuthResolver::new(
            config.authentication,
            config.cookie_name.clone(),
            self.security.clone(),
            adjacent.clone(),
            federation.clone(),
        );
        let login = LoginService::new(self.security.clone(), adjacent, federation.clone());

        let state = AppState {
            registry: Arc::new(EndpointRegistry::new(config.prefix.clone())),
            config,
            overlay: self.overlay,
            security: self.security,
            auth: Arc::new(auth),
            login,
        };

        Ok(Gateway { state, federation })
    }
}
