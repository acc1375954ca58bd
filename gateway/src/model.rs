use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry::{LinkResult, TimeSeriesPoint, Timestamped};
use uuid::Uuid;

/// Persisted device-user association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceLink {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub device_type: Option<String>,
    pub device_name: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// Raw grain-bin sensor row; a reading may carry either metric or both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl Timestamped for SensorReading {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
}

impl Metric {
    pub fn value(&self, reading: &SensorReading) -> Option<f64> {
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
        }
    }
}

/// Wire shape of a link attempt outcome
#[derive(Debug, Serialize)]
pub struct LinkResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<LinkResult<T>> for LinkResponse<T> {
    fn from(result: LinkResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Chart series response
#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub device_id: String,
    pub metric: Metric,
    pub threshold: usize,
    /// Readings carrying the metric before downsampling
    pub total: usize,
    pub points: Vec<TimeSeriesPoint>,
}
