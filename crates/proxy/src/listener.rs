//! A single TLS listener

use crate::config::ListenerConfig;
use crate::error::{ProxyError, Result};
use crate::forward::{BackendForwarder, BackendHost};
use crate::router::DomainRouter;
use crate::sni::SniCertResolver;
use axum::{Router, extract::ConnectInfo};
use hyper::{Request, body::Incoming};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::Instrument;

/// Terminates TLS on one port and routes requests by Host
pub struct ProxyListener {
    port: u16,
    resolver: Arc<SniCertResolver>,
    acceptor: TlsAcceptor,
    router: Router,
    connections: Arc<Semaphore>,
    handshake_timeout: Duration,
}

impl ProxyListener {
    pub fn new(config: &ListenerConfig, backend: BackendHost) -> Result<Self> {
        let resolver = Arc::new(SniCertResolver::new(config));

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut tls = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_cert_resolver(resolver.clone());
        tls.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        let router = DomainRouter::new(config, BackendForwarder::new(backend)?).into_router();

        Ok(Self {
            port: config.listen_port,
            resolver,
            acceptor: TlsAcceptor::from(Arc::new(tls)),
            router,
            connections: Arc::new(Semaphore::new(config.max_connections)),
            handshake_timeout: config.handshake_timeout(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn resolver(&self) -> &Arc<SniCertResolver> {
        &self.resolver
    }

    pub async fn bind(&self, address: IpAddr) -> Result<TcpListener> {
        TcpListener::bind((address, self.port))
            .await
            .map_err(|source| ProxyError::Bind {
                port: self.port,
                source,
            })
    }

    /// Accept connections on `listener` until accepting fails.
    ///
    /// Connection tasks belong to this future: dropping or aborting it
    /// also aborts every connection it accepted.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "proxy listener serving");

        let mut connections = JoinSet::new();
        loop {
            let permit = self
                .connections
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ProxyError::Connection(e.to_string()))?;

            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                Some(_) = connections.join_next() => continue,
            };

            let acceptor = self.acceptor.clone();
            let router = self.router.clone();
            let handshake_timeout = self.handshake_timeout;

            connections.spawn(
                async move {
                    debug!("new connection");
                    if let Err(e) =
                        handle_connection(acceptor, router, stream, peer_addr, handshake_timeout)
                            .await
                    {
                        debug!("connection closed with error: {e}");
                    }
                    drop(permit);
                }
                .instrument(info_span!(
                    "proxy_connection",
                    %peer_addr,
                    listen_port = self.port
                )),
            );
        }
    }
}

async fn handle_connection(
    acceptor: TlsAcceptor,
    router: Router,
    stream: TcpStream,
    peer_addr: SocketAddr,
    handshake_timeout: Duration,
) -> Result<()> {
    let tls = timeout(handshake_timeout, acceptor.accept(stream))
        .await
        .map_err(|_| ProxyError::HandshakeTimeout)??;
    debug!(
        server_name = tls.get_ref().1.server_name(),
        "TLS handshake completed"
    );

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer_addr));
        router.clone().call(request)
    });

    auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(tls), service)
        .await
        .map_err(|e| ProxyError::Connection(e.to_string()))
}
