use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::payload::Payload;

pub const CONNECTED_SENTINEL: &str = "connected";

#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub last_update: DateTime<Utc>,
    pub device: Option<String>,
    pub details: Payload,
}

impl StatusSnapshot {
    pub fn from_payload(payload: Payload, received_at: DateTime<Utc>) -> Self {
        // Staleness is measured on the server clock, never the device's.
        Self {
            connected: payload.status() == Some(CONNECTED_SENTINEL),
            last_update: received_at,
            device: payload.device_id(),
            details: payload,
        }
    }

    pub fn seconds_since(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_update).num_seconds().max(0)
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        ConnectionQuality::from_dbm(self.details.signal_dbm())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotQuery {
    NoData,
    Reported(Arc<StatusSnapshot>),
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: RwLock<Option<Arc<StatusSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(
        &self,
        payload: Payload,
        received_at: DateTime<Utc>,
    ) -> Arc<StatusSnapshot> {
        let snapshot = Arc::new(StatusSnapshot::from_payload(payload, received_at));
        *self.latest.write().await = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub async fn query(&self) -> SnapshotQuery {
        match self.latest.read().await.as_ref() {
            Some(snapshot) => SnapshotQuery::Reported(Arc::clone(snapshot)),
            None => SnapshotQuery::NoData,
        }
    }

    pub async fn seconds_since_last_update(&self, now: DateTime<Utc>) -> Option<i64> {
        self.latest
            .read()
            .await
            .as_ref()
            .map(|snapshot| snapshot.seconds_since(now))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConnectionQuality {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl ConnectionQuality {
    pub fn from_dbm(dbm: Option<f64>) -> Self {
        match dbm {
            None => ConnectionQuality::Unknown,
            Some(dbm) if dbm > -50.0 => ConnectionQuality::Excellent,
            Some(dbm) if dbm > -60.0 => ConnectionQuality::VeryGood,
            Some(dbm) if dbm > -70.0 => ConnectionQuality::Good,
            Some(dbm) if dbm > -80.0 => ConnectionQuality::Fair,
            Some(_) => ConnectionQuality::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Excellent => "Excellent",
            ConnectionQuality::VeryGood => "Very Good",
            ConnectionQuality::Good => "Good",
            ConnectionQuality::Fair => "Fair",
            ConnectionQuality::Poor => "Poor",
            ConnectionQuality::Unknown => "Unknown",
        }
    }
}
