//! Daemon runner
//!
//! Builds the [`Server`] from the configuration, binds one listener per
//! incoming address and serves them all until shutdown is signalled.

use crate::access::{ConfigRuleSet, PasswordAuthenticator};
use crate::config::{Config, IncomingConfig};
use crate::dialer::create_dialer;
use crate::socks::Server;
use crate::stats::ProxyStats;
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Build a server from a prepared configuration, reporting to `stats`.
///
/// Must be called inside a tokio runtime: the DNSBL prober is spawned here
/// when outgoing addresses are configured.
pub fn create_server(config: &Config, stats: Arc<ProxyStats>) -> Result<Server> {
    let dialer = create_dialer(&config.outgoing).context("Failed to create dialer")?;

    let mut server = Server::new(dialer)
        .with_rules(Arc::new(ConfigRuleSet::from_config(config)))
        .with_observer(stats)
        .with_silence_logs(config.log.silence_access);

    if let Some((username, password)) = config.incoming.credentials() {
        server = server.with_authenticator(Arc::new(PasswordAuthenticator::new(username, password)));
    }

    Ok(server)
}

/// Addresses to listen on; all IPv4 interfaces when none are configured
pub fn listen_addrs(incoming: &IncomingConfig) -> Vec<SocketAddr> {
    if incoming.addresses.is_empty() {
        return vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), incoming.port)];
    }
    incoming
        .addresses
        .iter()
        .map(|&ip| SocketAddr::new(ip, incoming.port))
        .collect()
}

/// Bind every incoming address
pub async fn bind_listeners(incoming: &IncomingConfig) -> Result<Vec<TcpListener>> {
    let mut listeners = Vec::new();
    for addr in listen_addrs(incoming) {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        listeners.push(listener);
    }
    Ok(listeners)
}

/// Run the proxy until `shutdown_rx` fires
pub async fn run_daemon(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let stats = Arc::new(ProxyStats::new());
    let server = create_server(&config, stats.clone())?;
    let listeners = bind_listeners(&config.incoming).await?;

    info!(
        listeners = listeners.len(),
        outgoing_addresses = config.outgoing.addresses.len(),
        "socksgate started"
    );

    let handles: Vec<_> = listeners
        .into_iter()
        .map(|listener| {
            let server = server.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            tokio::spawn(async move { server.serve(listener, shutdown_rx).await })
        })
        .collect();

    let mut result = Ok(());
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Listener failed: {:#}", e);
                result = Err(e);
            }
            Err(e) => {
                error!("Listener task panicked: {}", e);
                result = Err(e.into());
            }
        }
    }

    let totals = stats.snapshot();
    info!(
        accepted_socks4 = totals.accepted_socks4,
        accepted_socks5 = totals.accepted_socks5,
        auth_failures = totals.auth_failures,
        rule_denials = totals.rule_denials,
        dial_failures = totals.dial_failures,
        relays_succeeded = totals.relays_succeeded,
        relays_failed = totals.relays_failed,
        bytes_tx = totals.bytes_tx,
        bytes_rx = totals.bytes_rx,
        "socksgate stopped"
    );
    result
}
