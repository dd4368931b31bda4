use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::payload::Payload;
use crate::snapshot::{ConnectionQuality, StatusSnapshot};

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
    pub received_data: ReceivedData,
    pub greeting: String,
    pub connection: ConnectionInfo,
    pub server_uptime_seconds: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedData {
    #[serde(rename = "deviceID")]
    pub device_id: Option<Value>,
    pub data_source: Option<Value>,
    pub timestamp: Option<Value>,
}

impl ReceivedData {
    pub fn from_payload(payload: &Payload) -> Self {
        Self {
            device_id: payload.get("deviceID").cloned(),
            data_source: payload.data_source().cloned(),
            timestamp: payload.get("timestamp").cloned(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub device_name: Option<String>,
    #[serde(rename = "clientIP")]
    pub client_ip: Option<String>,
    pub network: Option<String>,
    pub signal_strength: Option<f64>,
    pub connection_quality: ConnectionQuality,
}

#[derive(Serialize)]
pub struct RejectResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
    pub reason: &'static str,
    pub detail: String,
}

#[derive(Serialize)]
pub struct FaultResponse {
    pub success: bool,
    pub message: &'static str,
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum WifiStatusResponse {
    #[serde(rename_all = "camelCase")]
    Reported {
        status: &'static str,
        connected: bool,
        last_update: String,
        device: Option<String>,
        details: Payload,
        seconds_since_update: i64,
        connection_quality: ConnectionQuality,
    },
    NoData {
        status: &'static str,
        message: &'static str,
    },
}

impl WifiStatusResponse {
    pub fn reported(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Self {
        WifiStatusResponse::Reported {
            status: "ok",
            connected: snapshot.connected,
            last_update: iso_timestamp(snapshot.last_update),
            device: snapshot.device.clone(),
            details: snapshot.details.clone(),
            seconds_since_update: snapshot.seconds_since(now),
            connection_quality: snapshot.connection_quality(),
        }
    }

    pub fn no_data() -> Self {
        WifiStatusResponse::NoData {
            status: "no_data",
            message: "No data received from ESP32 yet",
        }
    }
}
