//! Startup and supervision of every configured listener

use crate::config::{FailurePolicy, ListenerConfig, ProxyConfig};
use crate::error::{ProxyError, Result};
use crate::forward::BackendHost;
use crate::listener::ProxyListener;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Lifecycle of one listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    Serving,
    Failed(String),
    /// Shut down because a sibling listener failed
    Stopped,
}

/// Per-port listener state, shared with whoever wants to report it
#[derive(Debug, Clone, Default)]
pub struct ListenerHealth {
    states: Arc<DashMap<u16, ListenerState>>,
}

impl ListenerHealth {
    pub fn get(&self, port: u16) -> Option<ListenerState> {
        self.states.get(&port).map(|state| state.clone())
    }

    /// States of every listener, ordered by port
    pub fn snapshot(&self) -> Vec<(u16, ListenerState)> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        states.sort_by_key(|(port, _)| *port);
        states
    }

    pub fn all_serving(&self) -> bool {
        self.states
            .iter()
            .all(|entry| *entry.value() == ListenerState::Serving)
    }

    fn set(&self, port: u16, state: ListenerState) {
        self.states.insert(port, state);
    }

    fn stop(&self, port: u16) {
        if let Some(mut state) = self.states.get_mut(&port)
            && !matches!(*state, ListenerState::Failed(_))
        {
            *state = ListenerState::Stopped;
        }
    }
}

/// Owns and starts every listener of the topology
pub struct ListenerManager {
    listeners: Vec<ListenerConfig>,
    policy: FailurePolicy,
    bind_address: IpAddr,
    backend: BackendHost,
    health: ListenerHealth,
}

impl ListenerManager {
    /// Backend host is taken from `NODE_IP` at this point
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            listeners: config.listeners.clone(),
            policy: config.failure_policy,
            bind_address: config.server.bind_address,
            backend: BackendHost::from_env(),
            health: ListenerHealth::default(),
        }
    }

    pub fn with_backend_host(mut self, backend: BackendHost) -> Self {
        self.backend = backend;
        self
    }

    pub fn health(&self) -> ListenerHealth {
        self.health.clone()
    }

    /// Start every listener and wait for the first one to fail.
    ///
    /// The failure is returned. Under [`FailurePolicy::ShutdownAll`] every
    /// other listener has been stopped by then; under
    /// [`FailurePolicy::KeepRunning`] they keep serving in the background.
    pub async fn start(self) -> Result<()> {
        let (failures, mut first_failure) = mpsc::channel(self.listeners.len().max(1));
        let mut tasks = JoinSet::new();

        for config in &self.listeners {
            let port = config.listen_port;
            self.health.set(port, ListenerState::Starting);

            let config = config.clone();
            let backend = self.backend.clone();
            let address = self.bind_address;
            let health = self.health.clone();
            let failures = failures.clone();

            tasks.spawn(
                async move {
                    let error = match run_listener(&config, backend, address, &health).await {
                        Ok(()) => ProxyError::ListenerStopped(port),
                        Err(e) => e,
                    };
                    health.set(port, ListenerState::Failed(error.to_string()));
                    let _ = failures.send((port, error)).await;
                }
                .instrument(info_span!("listener", listen_port = port)),
            );
        }
        drop(failures);

        info!(
            listeners = self.listeners.len(),
            backend = %self.backend,
            "proxy listeners started"
        );

        let Some((port, error)) = first_failure.recv().await else {
            return Ok(());
        };
        error!(listen_port = port, "listener failed: {error}");

        match self.policy {
            FailurePolicy::ShutdownAll => {
                tasks.shutdown().await;
                for config in &self.listeners {
                    self.health.stop(config.listen_port);
                }
                warn!("all listeners stopped");
            }
            FailurePolicy::KeepRunning => {
                tasks.detach_all();
                let serving = self
                    .health
                    .snapshot()
                    .into_iter()
                    .filter(|(_, state)| *state == ListenerState::Serving)
                    .count();
                warn!(serving, "remaining listeners keep serving");
            }
        }

        Err(error)
    }
}

async fn run_listener(
    config: &ListenerConfig,
    backend: BackendHost,
    address: IpAddr,
    health: &ListenerHealth,
) -> Result<()> {
    let listener = ProxyListener::new(config, backend)?;
    let tcp = listener.bind(address).await?;
    health.set(config.listen_port, ListenerState::Serving);
    listener.serve(tcp).await
}
