//! Certificates and TLS backends for tests

use crate::config::Route;
use axum::{
    Json, Router,
    extract::Request,
    http::HeaderMap,
};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use parking_lot::Mutex;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::Service;

/// Self-signed certificates written to a temporary directory
pub struct CertFixture {
    dir: TempDir,
    ders: Mutex<HashMap<String, Vec<u8>>>,
}

impl CertFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            ders: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `{stem}.crt` and `{stem}.key` for `domains`, returning the DER
    fn write_cert(&self, stem: &str, domains: &[&str]) -> Vec<u8> {
        let names: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(names).unwrap();
        std::fs::write(self.path(&format!("{stem}.crt")), cert.pem()).unwrap();
        std::fs::write(self.path(&format!("{stem}.key")), key_pair.serialize_pem()).unwrap();
        cert.der().to_vec()
    }

    /// A route whose certificate covers all of `domains`
    pub fn route(&self, domains: &[&str], target_port: u16) -> Route {
        let stem = domains[0];
        let der = self.write_cert(stem, domains);
        let mut ders = self.ders.lock();
        for domain in domains {
            ders.insert(domain.to_ascii_lowercase(), der.clone());
        }
        Route {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            target_port,
            cert_file: self.path(&format!("{stem}.crt")),
            key_file: self.path(&format!("{stem}.key")),
        }
    }

    pub fn cert_der(&self, domain: &str) -> Vec<u8> {
        self.ders.lock()[domain].clone()
    }

    /// Overwrite the files of route `stem` with a certificate for
    /// `new_domain` and move their modification time forward
    pub fn rewrite(&self, stem: &str, new_domain: &str) -> Vec<u8> {
        let cert_file = self.path(&format!("{stem}.crt"));
        let before = std::fs::metadata(&cert_file).unwrap().modified().unwrap();

        let der = self.write_cert(stem, &[new_domain]);
        for ext in ["crt", "key"] {
            std::fs::File::options()
                .write(true)
                .open(self.path(&format!("{stem}.{ext}")))
                .unwrap()
                .set_modified(before + Duration::from_secs(5))
                .unwrap();
        }
        der
    }

    fn acceptor(&self, stem: &str) -> TlsAcceptor {
        let certs = CertificateDer::pem_file_iter(self.path(&format!("{stem}.crt")))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let key = PrivateKeyDer::from_pem_file(self.path(&format!("{stem}.key"))).unwrap();
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Start a TLS backend that answers every request with a JSON description
/// of what it received. Returns the backend's port.
pub async fn spawn_echo_backend(fixture: &CertFixture, tag: &'static str) -> u16 {
    fixture.write_cert(tag, &["backend.internal"]);
    let acceptor = fixture.acceptor(tag);

    let app = Router::new().fallback(move |request: Request| async move {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        Json::<Value>(json!({
            "tag": tag,
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "host": header_text(&parts.headers, "host"),
            "forwardedHost": header_text(&parts.headers, "x-forwarded-host"),
            "forwardedProto": header_text(&parts.headers, "x-forwarded-proto"),
            "forwardedFor": header_text(&parts.headers, "x-forwarded-for"),
            "session": header_text(&parts.headers, "x-session"),
            "body": String::from_utf8_lossy(&body),
        }))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            let app = app.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                    app.clone().call(request)
                });
                let _ = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(tls), service)
                    .await;
            });
        }
    });

    port
}
