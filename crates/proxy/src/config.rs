//! Proxy topology configuration
//!
//! The topology is read once at startup and never changes while the proxy
//! runs. Certificates are the exception: the SNI resolver notices when the
//! files behind a route change on disk.

use ::config::{Config, ConfigError, Environment, File};
use edgegate_core::{ValidateConfig, validators};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Domains served by one backend port, with the certificate presented for them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub domains: Vec<String>,
    pub target_port: u16,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl Route {
    /// Case-insensitive exact match against the route's domains
    pub fn matches(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|domain| domain.eq_ignore_ascii_case(host))
    }
}

/// One TLS port and its routes. The first route is the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub listen_port: u16,
    pub routes: Vec<Route>,
    /// Abort handshakes for unconfigured server names instead of
    /// answering with the first route's certificate
    #[serde(default)]
    pub strict_sni: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn new(listen_port: u16, routes: Vec<Route>) -> Self {
        Self {
            listen_port,
            routes,
            strict_sni: false,
            max_connections: default_max_connections(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }

    /// Index and route serving `host`
    pub fn route_for(&self, host: &str) -> Option<(usize, &Route)> {
        self.routes
            .iter()
            .enumerate()
            .find(|(_, route)| route.matches(host))
    }

    pub fn fallback(&self) -> Option<&Route> {
        self.routes.first()
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    fn validate_at(&self, field: &str) -> Result<(), ConfigError> {
        validators::validate_port(self.listen_port, &format!("{field}.listen_port"))?;
        validators::validate_range(
            self.max_connections,
            1,
            100_000,
            &format!("{field}.max_connections"),
        )?;
        validators::validate_range(
            self.handshake_timeout_secs,
            1,
            300,
            &format!("{field}.handshake_timeout_secs"),
        )?;

        if self.routes.is_empty() {
            return Err(ConfigError::Message(format!(
                "{field}.routes: at least one route is required"
            )));
        }

        for (i, route) in self.routes.iter().enumerate() {
            let route_field = format!("{field}.routes[{i}]");
            validators::validate_port(route.target_port, &format!("{route_field}.target_port"))?;
            validators::validate_not_empty(
                &route.cert_file.to_string_lossy(),
                &format!("{route_field}.cert_file"),
            )?;
            validators::validate_not_empty(
                &route.key_file.to_string_lossy(),
                &format!("{route_field}.key_file"),
            )?;
            if route.domains.is_empty() {
                return Err(ConfigError::Message(format!(
                    "{route_field}.domains: at least one domain is required"
                )));
            }
            for domain in &route.domains {
                validators::validate_domain(domain, &format!("{route_field}.domains"))?;
            }
        }

        let domains: Vec<String> = self
            .routes
            .iter()
            .flat_map(|route| route.domains.iter().map(|d| d.to_ascii_lowercase()))
            .collect();
        validators::validate_unique(domains.iter(), &format!("{field}.domains"))
    }
}

/// What the supervisor does when one listener fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop every listener on the first failure
    #[default]
    ShutdownAll,
    /// Report the failure and leave the other listeners serving
    KeepRunning,
}

/// Process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    /// Address every listener binds on
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            bind_address: default_bind_address(),
        }
    }
}

/// Complete proxy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_max_connections() -> usize {
    1000
}

fn default_handshake_timeout() -> u64 {
    10
}

impl ProxyConfig {
    /// Load configuration from the first config file found in the usual
    /// locations, overridden by `EDGEGATE__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let config_paths = [
            "edgegate-proxy.toml",
            "config/proxy.toml",
            "/etc/edgegate/proxy.toml",
        ];
        for path in &config_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(env_source());
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("EDGEGATE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl ValidateConfig for ProxyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.server.log_level.as_str()) {
            return Err(ConfigError::Message(format!(
                "server.log_level must be one of: {valid_log_levels:?}"
            )));
        }

        if self.listeners.is_empty() {
            return Err(ConfigError::Message(
                "listeners: at least one listener is required".to_string(),
            ));
        }

        for (i, listener) in self.listeners.iter().enumerate() {
            listener.validate_at(&format!("listeners[{i}]"))?;
        }

        let ports: Vec<u16> = self.listeners.iter().map(|l| l.listen_port).collect();
        validators::validate_unique(ports.iter(), "listeners.listen_port")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn route(domains: &[&str], target_port: u16) -> Route {
        Route {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            target_port,
            cert_file: PathBuf::from("/certs/site.crt"),
            key_file: PathBuf::from("/certs/site.key"),
        }
    }

    fn config(listeners: Vec<ListenerConfig>) -> ProxyConfig {
        ProxyConfig {
            listeners,
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn test_route_matching_is_case_insensitive() {
        let listener = ListenerConfig::new(
            443,
            vec![
                route(&["layer8vibe.dev", "www.layer8vibe.dev"], 1443),
                route(&["probler.dev"], 2443),
            ],
        );

        assert_eq!(listener.route_for("PROBLER.dev").unwrap().0, 1);
        assert_eq!(listener.route_for("www.layer8vibe.dev").unwrap().1.target_port, 1443);
        assert!(listener.route_for("probler.dev.evil").is_none());
        assert_eq!(listener.fallback().unwrap().target_port, 1443);
    }

    #[test]
    fn test_valid_topology() {
        let config = config(vec![
            ListenerConfig::new(443, vec![route(&["a.dev"], 1443), route(&["b.dev"], 2443)]),
            ListenerConfig::new(9092, vec![route(&["a.dev"], 9093)]),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_domain_in_listener() {
        let config = config(vec![ListenerConfig::new(
            443,
            vec![route(&["a.dev"], 1443), route(&["A.dev"], 2443)],
        )]);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate entry 'a.dev'"), "{err}");
    }

    #[test]
    fn test_duplicate_listen_port() {
        let config = config(vec![
            ListenerConfig::new(443, vec![route(&["a.dev"], 1443)]),
            ListenerConfig::new(443, vec![route(&["b.dev"], 2443)]),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_listeners() {
        assert!(config(Vec::new()).validate().is_err());
        assert!(
            config(vec![ListenerConfig::new(443, Vec::new())])
                .validate()
                .is_err()
        );
        assert!(
            config(vec![ListenerConfig::new(0, vec![route(&["a.dev"], 1443)])])
                .validate()
                .is_err()
        );
        assert!(
            config(vec![ListenerConfig::new(443, vec![route(&["a.dev"], 0)])])
                .validate()
                .is_err()
        );
        assert!(
            config(vec![ListenerConfig::new(443, vec![route(&[], 1443)])])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
failure_policy = "keep_running"

[server]
log_level = "debug"

[[listeners]]
listen_port = 443
strict_sni = true

[[listeners.routes]]
domains = ["layer8vibe.dev"]
target_port = 1443
cert_file = "/certs/layer8vibe.crt"
key_file = "/certs/layer8vibe.key"

[[listeners.routes]]
domains = ["probler.dev"]
target_port = 2443
cert_file = "/certs/probler.crt"
key_file = "/certs/probler.key"
"#
        )
        .unwrap();

        let config = ProxyConfig::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.failure_policy, FailurePolicy::KeepRunning);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.bind_address, default_bind_address());

        let listener = &config.listeners[0];
        assert!(listener.strict_sni);
        assert_eq!(listener.max_connections, 1000);
        assert_eq!(listener.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(listener.routes[1].target_port, 2443);
    }
}
