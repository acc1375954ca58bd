use crate::backoff::{backoff_delay, with_jitter};
use crate::cancel::CancelSignal;
use crate::connectivity::ConnectivityProbe;
use crate::errors::{LinkError, LinkResult, StoreError};
use crate::model::{DeviceLinkRecord, DeviceLinkRequest, RequiredFields};
use crate::transient::is_transient;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Persistence side of the device-user association
pub trait RecordStore {
    /// The persisted row echoed back on success
    type Record: Send;

    fn insert(
        &self,
        record: DeviceLinkRecord,
    ) -> impl Future<Output = Result<Self::Record, StoreError>> + Send;
}

/// Retry policy and validation rules for linking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
    pub required: RequiredFields,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(5000),
            max_delay: Duration::from_millis(30000),
            max_jitter: Duration::from_millis(1000),
            required: RequiredFields::Full,
        }
    }
}

impl LinkPolicy {
    /// Shorter base delay, links on user and device ids alone
    pub fn minimal() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            required: RequiredFields::Minimal,
            ..Default::default()
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    pub fn with_required(mut self, required: RequiredFields) -> Self {
        self.required = required;
        self
    }

    /// Sleep before the attempt following `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        with_jitter(
            backoff_delay(self.base_delay, attempt, self.max_delay),
            self.max_jitter,
        )
    }
}

/// Links provisioned devices to user accounts, retrying through outages
#[derive(Debug, Clone)]
pub struct DeviceLinker<P, S> {
    probe: P,
    store: S,
    policy: LinkPolicy,
}

impl<P, S> DeviceLinker<P, S>
where
    P: ConnectivityProbe + Sync,
    S: RecordStore + Sync,
{
    pub fn new(probe: P, store: S, policy: LinkPolicy) -> Self {
        Self {
            probe,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn link_device(&self, request: &DeviceLinkRequest) -> LinkResult<S::Record> {
        self.link_device_with_cancel(request, &CancelSignal::never())
            .await
    }

    /// Links a device, giving up early once `cancel` fires.
    ///
    /// Cancellation is checked before every attempt and interrupts a pending
    /// backoff sleep; an insert already in flight is allowed to finish.
    pub async fn link_device_with_cancel(
        &self,
        request: &DeviceLinkRequest,
        cancel: &CancelSignal,
    ) -> LinkResult<S::Record> {
        let record = request.to_record(self.policy.required).map_err(|e| {
            warn!("Rejecting link request for device '{}': {}", request.device_id, e);
            e
        })?;

        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;

        while attempts < max_attempts {
            if cancel.is_cancelled() {
                info!("Link of device {} cancelled before attempt {}", record.device_id, attempts + 1);
                return Err(LinkError::Cancelled);
            }

            debug!(
                "Linking device {} to user {} (attempt {}/{})",
                record.device_id,
                record.user_id,
                attempts + 1,
                max_attempts
            );

            if self.probe.is_usable().await {
                match self.store.insert(record.clone()).await {
                    Ok(persisted) => {
                        if attempts > 0 {
                            info!(
                                "Device {} linked to user {} after {} attempts",
                                record.device_id,
                                record.user_id,
                                attempts + 1
                            );
                        } else {
                            debug!("Device {} linked to user {}", record.device_id, record.user_id);
                        }
                        return Ok(persisted);
                    }
                    Err(e) if is_transient(&e.message) => {
                        warn!(
                            "Transient error linking device {} (attempt {}/{}): {}",
                            record.device_id,
                            attempts + 1,
                            max_attempts,
                            e
                        );
                    }
                    Err(e) => {
                        error!("Linking device {} failed permanently: {}", record.device_id, e);
                        return Err(LinkError::Rejected(e.message));
                    }
                }
            } else {
                warn!(
                    "No usable network for linking device {} (attempt {}/{})",
                    record.device_id,
                    attempts + 1,
                    max_attempts
                );
            }

            if attempts + 1 < max_attempts {
                let delay = self.policy.delay_for_attempt(attempts);
                debug!("Retrying link of device {} in {}ms", record.device_id, delay.as_millis());

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        info!("Link of device {} cancelled during backoff", record.device_id);
                        return Err(LinkError::Cancelled);
                    }
                }
            }

            attempts += 1;
        }

        error!(
            "Failed to link device {} to user {} after {} attempts",
            record.device_id, record.user_id, max_attempts
        );
        Err(LinkError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Online;

    impl ConnectivityProbe for Online {
        async fn is_usable(&self) -> bool {
            true
        }
    }

    /// Goes online after `offline_checks` probes
    struct FlakyNetwork {
        offline_checks: u32,
        checks: AtomicU32,
    }

    impl ConnectivityProbe for FlakyNetwork {
        async fn is_usable(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) >= self.offline_checks
        }
    }

    #[derive(Default, Clone)]
    struct AlwaysTransient {
        calls: Arc<AtomicU32>,
    }

    impl RecordStore for AlwaysTransient {
        type Record = DeviceLinkRecord;

        async fn insert(&self, _record: DeviceLinkRecord) -> Result<DeviceLinkRecord, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::new("service unavailable"))
        }
    }

    #[derive(Default)]
    struct Echo {
        calls: AtomicU32,
    }

    impl RecordStore for Echo {
        type Record = DeviceLinkRecord;

        async fn insert(&self, record: DeviceLinkRecord) -> Result<DeviceLinkRecord, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(record)
        }
    }

    fn request() -> DeviceLinkRequest {
        DeviceLinkRequest::new("user-1", "relay-9")
            .with_device_type("relay")
            .with_device_name("Aeration fan")
    }

    #[test]
    fn test_default_policy() {
        let policy = LinkPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.base_delay, Duration::from_millis(5000));
        assert_eq!(policy.max_delay, Duration::from_millis(30000));
        assert_eq!(policy.required, RequiredFields::Full);

        let minimal = LinkPolicy::minimal();
        assert_eq!(minimal.base_delay, Duration::from_millis(1000));
        assert_eq!(minimal.required, RequiredFields::Minimal);
        assert_eq!(minimal.max_attempts, 10);
    }

    #[test]
    fn test_delay_for_attempt_without_jitter() {
        let policy = LinkPolicy::default().with_jitter(Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20000));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_millis(30000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_network() {
        let probe = FlakyNetwork {
            offline_checks: 2,
            checks: AtomicU32::new(0),
        };
        let linker = DeviceLinker::new(probe, Echo::default(), LinkPolicy::default());

        let linked = linker.link_device(&request()).await.unwrap();

        assert_eq!(linked.device_id, "relay-9");
        assert_eq!(linker.store().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_exhausts_without_inserting() {
        let probe = FlakyNetwork {
            offline_checks: u32::MAX,
            checks: AtomicU32::new(0),
        };
        let policy = LinkPolicy::minimal().with_attempts(4);
        let linker = DeviceLinker::new(probe, Echo::default(), policy);

        let result = linker.link_device(&request()).await;

        assert_eq!(result, Err(LinkError::Exhausted));
        assert_eq!(linker.store().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let store = AlwaysTransient::default();
        let calls = store.calls.clone();
        let linker = Arc::new(DeviceLinker::new(Online, store, LinkPolicy::default()));
        let handle = CancelHandle::new();
        let signal = handle.signal();

        let task = {
            let linker = linker.clone();
            tokio::spawn(async move { linker.link_device_with_cancel(&request(), &signal).await })
        };

        // First insert fails, then the linker sleeps at least 5s
        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.cancel();

        assert_eq!(task.await.unwrap(), Err(LinkError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let linker = DeviceLinker::new(Online, Echo::default(), LinkPolicy::default());
        let handle = CancelHandle::new();
        handle.cancel();

        let result = linker
            .link_device_with_cancel(&request(), &handle.signal())
            .await;

        assert_eq!(result, Err(LinkError::Cancelled));
        assert_eq!(linker.store().calls.load(Ordering::SeqCst), 0);
    }
}
