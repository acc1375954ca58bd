//! Device provisioning and time-series helpers for grain-bin telemetry.
//!
//! Two independent pieces live here: [`linker::DeviceLinker`], which persists a
//! device-to-user association while riding out transient outages, and
//! [`downsample`], a largest-triangle-three-buckets reducer for chart series.

pub mod backoff;
pub mod cache;
pub mod cancel;
pub mod connectivity;
pub mod downsample;
pub mod errors;
pub mod linker;
pub mod model;
pub mod transient;

pub use cache::SeriesCache;
pub use cancel::{CancelHandle, CancelSignal};
pub use connectivity::{ConnectivityProbe, NativeProbe, NetworkStatus, NetworkStatusSource, WebProbe};
pub use downsample::{downsample, select_indices};
pub use errors::{LinkError, LinkResult, StoreError};
pub use linker::{DeviceLinker, LinkPolicy, RecordStore};
pub use model::{DeviceLinkRecord, DeviceLinkRequest, RequiredFields, TimeSeriesPoint, Timestamped};
