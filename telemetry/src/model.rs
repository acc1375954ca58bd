use crate::errors::{LinkError, LinkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Device categories the provisioning flow knows about
pub const KNOWN_DEVICE_TYPES: &[&str] = &["sensor", "relay"];

/// Which request fields must be present before a link is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredFields {
    /// user, device, type and name
    #[default]
    Full,
    /// user and device only
    Minimal,
}

impl std::str::FromStr for RequiredFields {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "minimal" => Ok(Self::Minimal),
            other => Err(format!("unknown required field set: {}", other)),
        }
    }
}

/// Request to associate a provisioned device with a user account.
///
/// Missing JSON fields deserialize as empty so that validation, not the
/// decoder, reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLinkRequest {
    pub user_id: String,
    pub device_id: String,
    pub device_type: Option<String>,
    pub device_name: Option<String>,
}

/// Flat record persisted in the device-user association table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLinkRecord {
    pub user_id: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl DeviceLinkRequest {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
            device_type: None,
            device_name: None,
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    /// Validates the request and builds the record handed to the store.
    ///
    /// Whitespace-only values count as missing. Optional fields are carried
    /// over only when they hold something.
    pub fn to_record(&self, required: RequiredFields) -> LinkResult<DeviceLinkRecord> {
        let device_type = non_empty(self.device_type.as_deref());
        let device_name = non_empty(self.device_name.as_deref());

        if non_empty(Some(self.user_id.as_str())).is_none()
            || non_empty(Some(self.device_id.as_str())).is_none()
        {
            return Err(LinkError::InvalidInput);
        }
        if required == RequiredFields::Full && (device_type.is_none() || device_name.is_none()) {
            return Err(LinkError::InvalidInput);
        }

        if let Some(kind) = device_type {
            if !KNOWN_DEVICE_TYPES.contains(&kind) {
                warn!("Unknown device type '{}' for device {}", kind, self.device_id);
            }
        }

        Ok(DeviceLinkRecord {
            user_id: self.user_id.clone(),
            device_id: self.device_id.clone(),
            device_type: device_type.map(str::to_string),
            device_name: device_name.map(str::to_string),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Anything that sits on a time axis
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A single sensor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Timestamped for TimeSeriesPoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
