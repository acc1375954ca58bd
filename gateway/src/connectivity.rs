use crate::config::ConnectivityMode;
use std::time::Duration;
use telemetry::{ConnectivityProbe, NativeProbe, NetworkStatus, NetworkStatusSource, WebProbe};
use tokio::net::TcpStream;
use tracing::debug;

/// Network status from TCP connects: the record store address decides
/// `is_connected`, an optional outside address decides reachability.
#[derive(Debug, Clone)]
pub struct TcpStatusSource {
    store_addr: String,
    reachability_addr: Option<String>,
    timeout: Duration,
}

impl TcpStatusSource {
    pub fn new(store_addr: String, reachability_addr: Option<String>, timeout: Duration) -> Self {
        Self {
            store_addr,
            reachability_addr,
            timeout,
        }
    }
}

impl NetworkStatusSource for TcpStatusSource {
    async fn status(&self) -> NetworkStatus {
        let is_connected = can_connect(&self.store_addr, self.timeout).await;
        let is_internet_reachable = match &self.reachability_addr {
            Some(addr) if is_connected => Some(can_connect(addr, self.timeout).await),
            Some(_) => Some(false),
            None => None,
        };

        debug!(
            "Network status: connected={}, reachable={:?}",
            is_connected, is_internet_reachable
        );

        NetworkStatus {
            is_connected,
            is_internet_reachable,
        }
    }
}

async fn can_connect(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Probe connect to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Probe connect to {} timed out", addr);
            false
        }
    }
}

/// Probe picked once at startup from [`ConnectivityMode`]
#[derive(Debug, Clone)]
pub enum HostProbe {
    Native(NativeProbe<TcpStatusSource>),
    Web(WebProbe<TcpStatusSource>),
}

impl HostProbe {
    pub fn new(mode: ConnectivityMode, source: TcpStatusSource) -> Self {
        match mode {
            ConnectivityMode::Native => HostProbe::Native(NativeProbe::new(source)),
            ConnectivityMode::Web => HostProbe::Web(WebProbe::new(source)),
        }
    }
}

impl ConnectivityProbe for HostProbe {
    async fn is_usable(&self) -> bool {
        match self {
            HostProbe::Native(probe) => probe.is_usable().await,
            HostProbe::Web(probe) => probe.is_usable().await,
        }
    }
}
