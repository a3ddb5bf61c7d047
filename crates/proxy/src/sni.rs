//! Certificate selection during the TLS handshake

use crate::config::{ListenerConfig, Route};
use crate::error::{ProxyError, Result};
use parking_lot::RwLock;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Parsed key pair plus the file times it was read at
#[derive(Debug)]
struct CachedKey {
    key: Arc<CertifiedKey>,
    cert_modified: SystemTime,
    key_modified: SystemTime,
}

/// Picks a listener's certificate from the ClientHello server name.
///
/// Parsed certificates are cached per route and re-read when either file's
/// modification time changes, or after [`SniCertResolver::reload`].
#[derive(Debug)]
pub struct SniCertResolver {
    routes: Vec<Route>,
    strict: bool,
    cache: RwLock<Vec<Option<CachedKey>>>,
}

impl SniCertResolver {
    pub fn new(listener: &ListenerConfig) -> Self {
        Self {
            routes: listener.routes.clone(),
            strict: listener.strict_sni,
            cache: RwLock::new(listener.routes.iter().map(|_| None).collect()),
        }
    }

    /// Index of the route whose certificate answers `server_name`
    pub fn select(&self, server_name: Option<&str>) -> Option<usize> {
        let matched =
            server_name.and_then(|name| self.routes.iter().position(|route| route.matches(name)));

        match matched {
            Some(index) => Some(index),
            None if self.strict || self.routes.is_empty() => None,
            None => Some(0),
        }
    }

    /// Certificate of route `index`, from cache when the files are unchanged
    pub fn certified_key(&self, index: usize) -> Option<Arc<CertifiedKey>> {
        let route = self.routes.get(index)?;

        let times = modified(&route.cert_file)
            .and_then(|cert| modified(&route.key_file).map(|key| (cert, key)));
        let (cert_modified, key_modified) = match times {
            Ok(times) => times,
            Err(e) => {
                warn!(route = index, "certificate unavailable: {e}");
                return None;
            }
        };

        if let Some(cached) = &self.cache.read()[index]
            && cached.cert_modified == cert_modified
            && cached.key_modified == key_modified
        {
            return Some(cached.key.clone());
        }

        match load_certified_key(&route.cert_file, &route.key_file) {
            Ok(key) => {
                let key = Arc::new(key);
                debug!(route = index, cert = %route.cert_file.display(), "certificate loaded");
                self.cache.write()[index] = Some(CachedKey {
                    key: key.clone(),
                    cert_modified,
                    key_modified,
                });
                Some(key)
            }
            Err(e) => {
                warn!(route = index, "failed to load certificate: {e}");
                None
            }
        }
    }

    /// Drop every cached certificate so the next handshake re-reads the files
    pub fn reload(&self) {
        for entry in self.cache.write().iter_mut() {
            *entry = None;
        }
        info!("certificate cache cleared");
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let server_name = client_hello.server_name();
        let Some(index) = self.select(server_name) else {
            debug!(server_name, "no certificate for server name");
            return None;
        };
        trace!(server_name, route = index, "certificate selected");
        self.certified_key(index)
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| ProxyError::certificate(path, e))
}

/// Read a PEM certificate chain and private key into a signing key pair
pub fn load_certified_key(cert_file: &Path, key_file: &Path) -> Result<CertifiedKey> {
    let certs = CertificateDer::pem_file_iter(cert_file)
        .and_then(|certs| certs.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| ProxyError::certificate(cert_file, e))?;
    if certs.is_empty() {
        return Err(ProxyError::certificate(cert_file, "no certificates found"));
    }

    let key =
        PrivateKeyDer::from_pem_file(key_file).map_err(|e| ProxyError::certificate(key_file, e))?;
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)?;

    Ok(CertifiedKey::new(certs, signing_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CertFixture;

    fn listener(fixture: &CertFixture, strict_sni: bool) -> ListenerConfig {
        ListenerConfig {
            strict_sni,
            ..ListenerConfig::new(
                443,
                vec![
                    fixture.route(&["layer8vibe.dev"], 1443),
                    fixture.route(&["probler.dev", "www.probler.dev"], 2443),
                ],
            )
        }
    }

    #[test]
    fn test_each_domain_gets_its_certificate() {
        let fixture = CertFixture::new();
        let resolver = SniCertResolver::new(&listener(&fixture, false));

        for domain in ["layer8vibe.dev", "probler.dev", "WWW.Probler.dev"] {
            let index = resolver.select(Some(domain)).unwrap();
            let key = resolver.certified_key(index).unwrap();
            assert_eq!(
                key.cert[0].as_ref(),
                fixture.cert_der(&domain.to_ascii_lowercase()),
                "wrong certificate for {domain}"
            );
        }
    }

    #[test]
    fn test_unknown_name_falls_back_to_first_route() {
        let fixture = CertFixture::new();
        let resolver = SniCertResolver::new(&listener(&fixture, false));

        assert_eq!(resolver.select(Some("unknown.dev")), Some(0));
        assert_eq!(resolver.select(None), Some(0));
        let key = resolver.certified_key(0).unwrap();
        assert_eq!(key.cert[0].as_ref(), fixture.cert_der("layer8vibe.dev"));
    }

    #[test]
    fn test_strict_sni_rejects_unknown_name() {
        let fixture = CertFixture::new();
        let resolver = SniCertResolver::new(&listener(&fixture, true));

        assert_eq!(resolver.select(Some("unknown.dev")), None);
        assert_eq!(resolver.select(None), None);
        assert_eq!(resolver.select(Some("probler.dev")), Some(1));
    }

    #[test]
    fn test_cache_reuses_parsed_key() {
        let fixture = CertFixture::new();
        let resolver = SniCertResolver::new(&listener(&fixture, false));

        let first = resolver.certified_key(1).unwrap();
        let second = resolver.certified_key(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        resolver.reload();
        let third = resolver.certified_key(1).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.cert[0].as_ref(), third.cert[0].as_ref());
    }

    #[test]
    fn test_changed_files_are_reloaded() {
        let fixture = CertFixture::new();
        let resolver = SniCertResolver::new(&listener(&fixture, false));
        let before = resolver.certified_key(0).unwrap();

        // replace the first route's files with a certificate for another name
        let replacement = fixture.rewrite("layer8vibe.dev", "rotated.layer8vibe.dev");
        let after = resolver.certified_key(0).unwrap();

        assert_ne!(before.cert[0].as_ref(), after.cert[0].as_ref());
        assert_eq!(after.cert[0].as_ref(), replacement.as_slice());
    }

    #[test]
    fn test_load_failure_fails_only_that_route() {
        let fixture = CertFixture::new();
        let mut config = listener(&fixture, false);
        config.routes[1].key_file = fixture.path("missing.key");
        let resolver = SniCertResolver::new(&config);

        assert!(resolver.certified_key(1).is_none());
        assert!(resolver.certified_key(0).is_some());
        assert!(resolver.certified_key(7).is_none());
    }

    #[test]
    fn test_garbage_pem_is_rejected() {
        let fixture = CertFixture::new();
        let bogus = fixture.path("bogus.crt");
        std::fs::write(&bogus, "not a certificate").unwrap();

        let err = load_certified_key(&bogus, &fixture.path("layer8vibe.dev.key")).unwrap_err();
        assert!(matches!(err, ProxyError::Certificate { .. }));
    }
}
