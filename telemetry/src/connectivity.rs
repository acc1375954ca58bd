use std::future::Future;

/// Raw network state as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStatus {
    pub is_connected: bool,
    /// `None` when the host could not determine reachability
    pub is_internet_reachable: Option<bool>,
}

/// Source of [`NetworkStatus`] snapshots
pub trait NetworkStatusSource {
    fn status(&self) -> impl Future<Output = NetworkStatus> + Send;
}

/// Decides whether a usable network path exists right now
pub trait ConnectivityProbe {
    fn is_usable(&self) -> impl Future<Output = bool> + Send;
}

/// Requires both a connection and confirmed reachability.
#[derive(Debug, Clone)]
pub struct NativeProbe<S> {
    source: S,
}

impl<S> NativeProbe<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: NetworkStatusSource + Sync> ConnectivityProbe for NativeProbe<S> {
    async fn is_usable(&self) -> bool {
        let status = self.source.status().await;
        status.is_connected && status.is_internet_reachable == Some(true)
    }
}

/// Accepts the connection flag alone.
///
/// For hosts where reachability probing is unavailable or unreliable, such as
/// browsers where the probe request is blocked cross-origin.
#[derive(Debug, Clone)]
pub struct WebProbe<S> {
    source: S,
}

impl<S> WebProbe<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: NetworkStatusSource + Sync> ConnectivityProbe for WebProbe<S> {
    async fn is_usable(&self) -> bool {
        self.source.status().await.is_connected
    }
}
