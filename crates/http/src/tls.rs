//! HTTPS serving for the gateway

use axum::Router;
use edgegate_core::CoreError;
use hyper::{Request, body::Incoming};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::Instrument;

/// Build a TLS acceptor from a PEM certificate chain and private key
pub fn load_acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor, CoreError> {
    let certs = CertificateDer::pem_file_iter(cert_file)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CoreError::invalid_config(format!("{}: {e}", cert_file.display())))?;
    if certs.is_empty() {
        return Err(CoreError::invalid_config(format!(
            "{}: no certificates found",
            cert_file.display()
        )));
    }
    let key = PrivateKeyDer::from_pem_file(key_file)
        .map_err(|e| CoreError::invalid_config(format!("{}: {e}", key_file.display())))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .and_then(|builder| builder.with_no_client_auth().with_single_cert(certs, key))
        .map_err(|e| CoreError::invalid_config(format!("TLS setup failed: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Serve `router` over TLS until accepting fails.
///
/// Dropping the returned future aborts every open connection.
pub async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
) -> std::io::Result<()> {
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            Some(_) = connections.join_next() => continue,
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        connections.spawn(
            async move {
                let tls = match acceptor.accept(stream).await {
                    Ok(tls) => tls,
                    Err(e) => {
                        debug!("TLS handshake failed: {e}");
                        return;
                    }
                };

                let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                    router.clone().call(request)
                });
                if let Err(e) = auto::Builder::new(TokioExecutor::new())
                    .serve_connection_with_upgrades(TokioIo::new(tls), service)
                    .await
                {
                    debug!("connection closed with error: {e}");
                }
            }
            .instrument(debug_span!("gateway_connection", %peer_addr)),
        );
    }
}
