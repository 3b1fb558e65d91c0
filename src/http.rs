//! HTTP surface for map clients.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `GET`  | `/api/lightning` | current [`Snapshot`](crate::snapshot::Snapshot) as JSON |
//! | `POST` | `/api/strikes`   | `[{"lat", "lon", "time"?, "intensity"?}]` → [`IngestReport`] |
//! | `GET`  | `/health`        | `OK` |
//!
//! Responses carry permissive CORS headers and `Cache-Control: no-cache`,
//! since map clients poll the snapshot endpoint from other origins.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::buffer::StrikeEvent;
use crate::service::{unix_now_ms, IngestReport, StrikeClusterService};

/// One strike as posted by a client. `time` is ms since the Unix epoch and
/// defaults to the receive time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct StrikeInput {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Strike time, ms since the Unix epoch.
    #[serde(default)]
    pub time: Option<u64>,
    /// Relative discharge strength.
    #[serde(default)]
    pub intensity: Option<f64>,
}

impl StrikeInput {
    fn into_event(self, received_at_ms: u64) -> StrikeEvent {
        let event = StrikeEvent::new(self.lat, self.lon, self.time.unwrap_or(received_at_ms));
        match self.intensity {
            Some(v) => event.with_intensity(v),
            None => event,
        }
    }
}

/// Build the router serving `service`.
pub fn router(service: Arc<StrikeClusterService>) -> Router {
    Router::new()
        .route("/api/lightning", get(lightning))
        .route("/api/strikes", post(ingest_strikes))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .with_state(service)
}

async fn lightning(State(service): State<Arc<StrikeClusterService>>) -> Response {
    match service.snapshot().to_json() {
        Ok(body) => ([(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "snapshot serialisation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn ingest_strikes(
    State(service): State<Arc<StrikeClusterService>>,
    Json(strikes): Json<Vec<StrikeInput>>,
) -> Json<IngestReport> {
    let now = unix_now_ms();
    let events = strikes.into_iter().map(|s| s.into_event(now));
    let report = service.ingest_batch_at(events, now);
    tracing::debug!(accepted = report.accepted, rejected = report.rejected, "strikes posted");
    Json(report)
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;

    fn service() -> Arc<StrikeClusterService> {
        Arc::new(StrikeClusterService::new(ClusterConfig::default()).unwrap())
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "OK");
    }

    fn input(lat: f64, lon: f64, time: Option<u64>) -> StrikeInput {
        StrikeInput {
            lat,
            lon,
            time,
            intensity: None,
        }
    }

    #[tokio::test]
    async fn test_post_then_get_snapshot() {
        let svc = service();
        let now = unix_now_ms();
        let posted = vec![
            input(10.0, 10.0, Some(now)),
            input(10.0, 10.01, None),
            input(100.0, 0.0, None),
        ];
        let Json(report) = ingest_strikes(State(Arc::clone(&svc)), Json(posted)).await;
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 1,
            }
        );

        svc.recompute();
        let resp = lightning(State(Arc::clone(&svc))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        assert_eq!(v["strikes"].as_array().map(Vec::len), Some(2));
        assert_eq!(v["clusters"][0]["count"], 2);
    }

    #[test]
    fn test_strike_input_time_is_optional() {
        let s: StrikeInput = serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0}"#).unwrap();
        assert_eq!(s.time, None);
        assert_eq!(s.into_event(42), StrikeEvent::new(1.0, 2.0, 42));
    }

    #[test]
    fn test_strike_input_carries_intensity() {
        let s: StrikeInput =
            serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0, "time": 7, "intensity": 40.5}"#)
                .unwrap();
        let event = s.into_event(42);
        assert_eq!(event.timestamp_ms, 7);
        assert_eq!(event.intensity, 40.5);
    }
}
