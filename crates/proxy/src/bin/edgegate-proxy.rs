//! Edgegate SNI reverse proxy binary

use anyhow::Result;
use clap::Parser;
use edgegate_core::ValidateConfig;
use edgegate_core::telemetry::{InstrumentationConfig, LogFormat, init_tracing};
use edgegate_proxy::{ListenerManager, ProxyConfig};
use tracing::{info, warn};

/// Edgegate proxy - terminates TLS per domain and forwards to backend ports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Log level filter, overrides RUST_LOG and the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProxyConfig::load_from_file(path)?,
        None => ProxyConfig::load()?,
    };

    let log_level = resolve_log_level(
        cli.log_level.clone(),
        std::env::var("RUST_LOG").ok(),
        &config.server.log_level,
    );
    let format = if cli.json_logs || config.server.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(
        &InstrumentationConfig::default()
            .with_service_name("edgegate-proxy")
            .with_log_level(log_level)
            .with_format(format),
    )?;

    config.validate()?;
    for listener in &config.listeners {
        let domains: Vec<&str> = listener
            .routes
            .iter()
            .flat_map(|route| route.domains.iter().map(String::as_str))
            .collect();
        info!(
            listen_port = listener.listen_port,
            strict_sni = listener.strict_sni,
            ?domains,
            "listener configured"
        );
    }

    let manager = ListenerManager::new(&config);
    tokio::select! {
        result = manager.start() => result?,
        _ = tokio::signal::ctrl_c() => warn!("Shutting down..."),
    }

    Ok(())
}

/// CLI flag, then `RUST_LOG`, then the config file
fn resolve_log_level(cli: Option<String>, env: Option<String>, configured: &str) -> String {
    cli.or(env.filter(|level| !level.trim().is_empty()))
        .unwrap_or_else(|| configured.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_precedence() {
        assert_eq!(
            resolve_log_level(Some("debug".into()), Some("warn".into()), "info"),
            "debug"
        );
        assert_eq!(resolve_log_level(None, Some("warn".into()), "info"), "warn");
        assert_eq!(resolve_log_level(None, Some(" ".into()), "info"), "info");
        assert_eq!(resolve_log_level(None, None, "error"), "error");
    }

    #[test]
    fn test_cli_level_reaches_the_filter() {
        let level = resolve_log_level(Some("trace".into()), Some("warn".into()), "info");
        let config = InstrumentationConfig::default().with_log_level(level);
        assert_eq!(edgegate_core::telemetry::env_filter(&config).to_string(), "trace");
    }
}

