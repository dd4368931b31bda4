use std::any::Any as PanicPayload;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::handlers::{esp32_status, health, index, wifi_status};
use crate::models::FaultResponse;
use crate::state::AppState;

pub fn build_router(state: AppState, config: &ServiceConfig) -> Router {
    with_layers(routes(), config).with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/wifi-status", get(wifi_status))
        .route("/esp32-status", post(esp32_status))
}

fn with_layers(router: Router<AppState>, config: &ServiceConfig) -> Router<AppState> {
    let body_limit = match config.body_limit_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    router
        .layer(body_limit)
        .layer(middleware::from_fn(log_request_headers))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(fault_response))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn log_request_headers(request: Request, next: Next) -> Response {
    log_headers(&request);
    next.run(request).await
}

fn log_headers(request: &Request) {
    let header_text = |name: header::HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("<none>")
            .to_string()
    };
    tracing::info!(
        method = %request.method(),
        uri = %request.uri(),
        content_type = %header_text(header::CONTENT_TYPE),
        content_length = %header_text(header::CONTENT_LENGTH),
        "request received"
    );
}

fn fault_response(fault: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let error = if let Some(message) = fault.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = fault.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown fault".to_string()
    };
    tracing::error!(error = %error, "request processing failed");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FaultResponse {
            success: false,
            message: "Internal server error",
            error,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(state: AppState) -> Router {
        build_router(state, &ServiceConfig::default())
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/esp32-status");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(body.into()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(router(AppState::new()), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let response = router(AppState::new()).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("POST /esp32-status"));
        assert!(html.contains("GET /wifi-status"));
    }

    #[tokio::test]
    async fn json_post_is_acknowledged_and_recorded() {
        let state = AppState::new();
        let payload = json!({
            "deviceID": "esp32-01",
            "dataSource": "veepeak_obd",
            "timestamp": 123456,
            "vin": "WVWZZZ1JZXW000001",
            "rpm": 790,
            "status": "connected",
            "ssid": "Garage AP",
            "rssi": -55,
        });

        let (status, body) = send(
            router(state.clone()),
            post(Some("application/json"), payload.to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["receivedData"],
            json!({ "deviceID": "esp32-01", "dataSource": "veepeak_obd", "timestamp": 123456 })
        );
        assert_eq!(body["connection"]["deviceName"], "esp32-01");
        assert_eq!(body["connection"]["network"], "Garage AP");
        assert_eq!(body["connection"]["connectionQuality"], "Very Good");
        assert_eq!(body["connection"]["clientIP"], Value::Null);
        assert!(body["greeting"].as_str().unwrap().contains("esp32-01"));
        assert!(body["serverUptimeSeconds"].is_u64());

        let (status, wifi) = send(router(state), get("/wifi-status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wifi["status"], "ok");
        assert_eq!(wifi["connected"], true);
        assert_eq!(wifi["device"], "esp32-01");
        assert_eq!(wifi["details"], payload);
    }

    #[tokio::test]
    async fn text_plain_json_matches_json_request() {
        let body = r#"{"status":"connected","device":"ESP32"}"#;
        let (json_status, json_body) =
            send(router(AppState::new()), post(Some("application/json"), body)).await;
        let (text_status, text_body) = send(
            router(AppState::new()),
            post(Some("text/plain"), format!("\n  {body}  \n")),
        )
        .await;

        assert_eq!(json_status, StatusCode::OK);
        assert_eq!(text_status, StatusCode::OK);
        assert_eq!(json_body["receivedData"], text_body["receivedData"]);
        assert_eq!(json_body["connection"], text_body["connection"]);
    }

    #[tokio::test]
    async fn form_post_is_accepted() {
        let state = AppState::new();
        let (status, body) = send(
            router(state.clone()),
            post(
                Some("application/x-www-form-urlencoded"),
                "status=connected&device=ESP32&ip=192.168.4.20",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection"]["clientIP"], "192.168.4.20");

        let (_, wifi) = send(router(state), get("/wifi-status")).await;
        assert_eq!(wifi["connected"], true);
    }

    #[tokio::test]
    async fn json_posted_as_form_is_recorded_as_json() {
        let state = AppState::new();
        let (status, body) = send(
            router(state.clone()),
            post(
                Some("application/x-www-form-urlencoded"),
                r#"{"status":"connected","device":"ESP32","rssi":-45}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection"]["signalStrength"], -45.0);
        assert_eq!(body["connection"]["connectionQuality"], "Excellent");

        let (_, wifi) = send(router(state), get("/wifi-status")).await;
        assert_eq!(wifi["connected"], true);
        assert_eq!(wifi["device"], "ESP32");
        assert_eq!(
            wifi["details"],
            json!({ "status": "connected", "device": "ESP32", "rssi": -45 })
        );
    }

    #[tokio::test]
    async fn unusable_bodies_are_rejected_without_touching_snapshot() {
        let state = AppState::new();
        let cases: [(Option<&str>, &str, &str); 4] = [
            (Some("application/json"), "", "empty_body"),
            (Some("application/json"), "{\"status\": conn", "malformed_json"),
            (Some("text/plain"), "hello from esp32", "unstructured_text"),
            (None, "{}", "empty_object"),
        ];

        for (content_type, body, reason) in cases {
            let (status, response) =
                send(router(state.clone()), post(content_type, body.to_string())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body = {body:?}");
            assert_eq!(response["success"], false);
            assert_eq!(response["message"], "No valid JSON data received");
            assert_eq!(response["reason"], reason);
        }

        let (status, wifi) = send(router(state), get("/wifi-status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            wifi,
            json!({ "status": "no_data", "message": "No data received from ESP32 yet" })
        );
    }

    #[tokio::test]
    async fn last_write_wins_across_posts() {
        let state = AppState::new();
        for n in 1..=4 {
            let status = if n % 2 == 0 { "connected" } else { "disconnected" };
            let body = json!({ "status": status, "deviceID": format!("esp32-{n}"), "seq": n });
            let (code, _) = send(
                router(state.clone()),
                post(Some("application/json"), body.to_string()),
            )
            .await;
            assert_eq!(code, StatusCode::OK);
        }

        let (_, wifi) = send(router(state), get("/wifi-status")).await;
        assert_eq!(wifi["device"], "esp32-4");
        assert_eq!(wifi["connected"], true);
        assert_eq!(
            wifi["details"],
            json!({ "status": "connected", "deviceID": "esp32-4", "seq": 4 })
        );
    }

    async fn explode() -> &'static str {
        panic!("sensor table exploded")
    }

    fn exploding_router() -> Router {
        with_layers(
            Router::new().route("/boom", axum::routing::get(explode)),
            &ServiceConfig::default(),
        )
        .with_state(AppState::new())
    }

    #[tokio::test]
    async fn panics_become_internal_server_errors() {
        let (status, body) = send(exploding_router(), get("/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Internal server error",
                "error": "sensor table exploded",
            })
        );
    }

    #[tokio::test]
    async fn fault_responses_keep_cors_headers() {
        let request = Request::builder()
            .uri("/boom")
            .header(header::ORIGIN, "https://dashboard.example")
            .body(Body::empty())
            .unwrap();
        let response = exploding_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let config = ServiceConfig {
            body_limit_bytes: Some(16),
            ..ServiceConfig::default()
        };
        let app = build_router(AppState::new(), &config);
        let body = json!({ "status": "connected", "padding": "x".repeat(64) }).to_string();
        let response = app
            .oneshot(post(Some("application/json"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
