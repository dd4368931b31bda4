use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;

use crate::body::{decode, ContentKind, DecodeFailure, RawBody};
use crate::classify::build_report;
use crate::models::{
    iso_timestamp, ConnectionInfo, HealthResponse, IngestResponse, ReceivedData, RejectResponse,
    WifiStatusResponse,
};
use crate::payload::Payload;
use crate::snapshot::{ConnectionQuality, SnapshotQuery};
use crate::state::AppState;

const BODY_PREVIEW_CHARS: usize = 512;

pub async fn index() -> Html<String> {
    Html(format!(
        r#"<h1>ESP32 Vehicle Telematics Server</h1>
<p>Server is running and ready to receive data from the ESP32.</p>
<p><strong>Endpoints:</strong></p>
<ul>
  <li><code>POST /esp32-status</code> - receive ESP32 telemetry</li>
  <li><code>GET /wifi-status</code> - latest reported device status</li>
  <li><code>GET /health</code> - health check</li>
</ul>
<p><strong>Server Time:</strong> {}</p>
"#,
        iso_timestamp(Utc::now())
    ))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "ESP32 data receiver is running",
        timestamp: iso_timestamp(Utc::now()),
    })
}

pub async fn wifi_status(State(state): State<AppState>) -> Json<WifiStatusResponse> {
    match state.snapshots.query().await {
        SnapshotQuery::Reported(snapshot) => {
            Json(WifiStatusResponse::reported(&snapshot, Utc::now()))
        }
        SnapshotQuery::NoData => Json(WifiStatusResponse::no_data()),
    }
}

pub async fn esp32_status(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = Utc::now();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let kind = ContentKind::from_header(content_type);
    let decoded = decode(RawBody::from_transport(kind, body.clone()), kind);

    if !decoded.structured {
        let failure = decoded.failure.unwrap_or(DecodeFailure::Empty);
        tracing::warn!(
            content_type = content_type.unwrap_or("<none>"),
            content_length = body.len(),
            reason = failure.code(),
            error = %failure,
            raw_body = %preview(&body),
            "no valid JSON data received"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(RejectResponse {
                success: false,
                message: "No valid JSON data received",
                timestamp: iso_timestamp(now),
                reason: failure.code(),
                detail: failure.to_string(),
            }),
        )
            .into_response();
    }

    let payload = decoded.payload;
    build_report(&payload).emit();

    let received_data = ReceivedData::from_payload(&payload);
    let connection = connection_info(&payload, &headers, peer.map(|ConnectInfo(addr)| addr));
    let greeting = format!(
        "Hello {}, your data was received!",
        connection.device_name.as_deref().unwrap_or("ESP32")
    );

    let since_previous = state.snapshots.seconds_since_last_update(now).await;
    let snapshot = state.snapshots.update(payload, now).await;
    tracing::debug!(
        connected = snapshot.connected,
        device = snapshot.device.as_deref().unwrap_or("Unknown"),
        seconds_since_previous = ?since_previous,
        "status snapshot replaced"
    );

    (
        StatusCode::OK,
        Json(IngestResponse {
            success: true,
            message: "Data received successfully",
            timestamp: iso_timestamp(now),
            received_data,
            greeting,
            connection,
            server_uptime_seconds: state.uptime().as_secs(),
        }),
    )
        .into_response()
}

fn connection_info(
    payload: &Payload,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> ConnectionInfo {
    // Device-declared address first; the tunnel hides the real one.
    let client_ip = payload
        .non_empty_text("ip")
        .or_else(|| payload.non_empty_text("ipAddress"))
        .or_else(|| forwarded_for(headers))
        .or_else(|| peer.map(|addr| addr.ip().to_string()));
    let signal_strength = payload.signal_dbm();

    ConnectionInfo {
        device_name: payload.device_id(),
        client_ip,
        network: payload
            .non_empty_text("ssid")
            .or_else(|| payload.non_empty_text("operator")),
        signal_strength,
        connection_quality: ConnectionQuality::from_dbm(signal_strength),
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|first| !first.is_empty())
}

fn preview(body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
