//! HTTP surface, driven in-process through the router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use fleet_charge_optimizer::{api, config::Config, controller::AppState};

fn app() -> Router {
    let mut cfg = Config::default();
    cfg.tariff.monthly = (1..=12).map(|m| (m.to_string(), 10.0)).collect();
    let state = AppState::new(cfg.clone()).unwrap();
    api::router(state, &cfg)
}

fn hourly_prices(from: &str, hours: usize) -> Value {
    let start: chrono::DateTime<chrono::Utc> = from.parse().unwrap();
    (0..hours)
        .map(|h| {
            json!({
                "time": start + chrono::TimeDelta::hours(h as i64),
                "price_per_mwh": 1000.0,
            })
        })
        .collect()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_solver() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["solver"], "minilp-dual-simplex");
    assert_eq!(body["default_tariff"], true);
}

#[tokio::test]
async fn optimize_returns_schedule() {
    let body = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [
            {"id": "ev-1", "start_hour": 0, "end_hour": 4, "energy_required_kwh": 20.0}
        ],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 4),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["status"], "OPTIMAL");
    assert_eq!(data["power_method"], "flat_22.1kW");
    let schedule = data["vehicles"][0]["schedule"].as_array().unwrap();
    assert_eq!(schedule.len(), 4);
    for kw in schedule {
        assert!((kw.as_f64().unwrap() - 5.0).abs() < 1e-6);
    }
    assert!(body["metadata"]["duration_ms"].is_u64());
}

#[tokio::test]
async fn optimize_price_gap_is_unprocessable() {
    let body = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [
            {"id": "ev-1", "start_hour": 0, "end_hour": 6, "energy_required_kwh": 20.0}
        ],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 3),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Unprocessable");
}

#[tokio::test]
async fn optimize_departure_past_prices_is_unprocessable() {
    let body = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [{"id": "a", "start_hour": 0, "end_hour": 1u64 << 40, "energy_required_kwh": 5.0}],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 4),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("no entry"));
}

#[tokio::test]
async fn optimize_rejects_invalid_requests() {
    let empty = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 3),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");

    let negative_capacity = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [{"id": "a", "start_hour": 0, "end_hour": 2, "energy_required_kwh": 5.0}],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 3),
        "global_capacity_kw": -5.0,
    });
    let (status, _) = send(app(), post("/api/v1/optimize", negative_capacity)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let overfull = json!({
        "start": "2023-01-02T00:00:00Z",
        "sessions": [{"id": "a", "start_hour": 0, "end_hour": 1, "energy_required_kwh": 50.0}],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 3),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", overfull)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("vehicle a"));
}

#[tokio::test]
async fn optimize_observed_relaxes() {
    let body = json!({
        "start": "2023-01-02T00:00:00Z",
        "power_method": "observed",
        "sessions": [
            {"id": "spiky", "start_hour": 0, "end_hour": 2, "energy_required_kwh": 30.0, "max_power_kw": 10.0}
        ],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 2),
    });
    let (status, body) = send(app(), post("/api/v1/optimize", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["relaxed"], true);
    assert!((body["data"]["exceeded_power"].as_f64().unwrap() - 10.0).abs() < 1e-6);
}

#[tokio::test]
async fn baseline_prices_history() {
    let body = json!({
        "start": "2023-01-02T00:00:00Z",
        "readings": [
            {"session_id": "ev-1", "timestamp": "2022-06-01T17:10:00Z", "charged_energy_kwh": 5.0},
            {"session_id": "ev-1", "timestamp": "2022-06-01T17:25:00Z", "charged_energy_kwh": 5.0},
            {"session_id": "ev-1", "timestamp": "2022-06-01T18:10:00Z", "charged_energy_kwh": 2.0}
        ],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 2),
    });
    let (status, body) = send(app(), post("/api/v1/baseline", body)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert!((data["total_energy_cost"].as_f64().unwrap() - 12.0).abs() < 1e-9);
    assert!((data["monthly"]["1"]["peak_load_kw"].as_f64().unwrap() - 10.0).abs() < 1e-9);
    assert!((data["total_cost"].as_f64().unwrap() - 112.0).abs() < 1e-9);
}

#[tokio::test]
async fn sweep_runs_every_start() {
    let body = json!({
        "starts": ["2023-01-02T00:00:00Z", "2023-01-02T06:00:00Z"],
        "sessions": [
            {"id": "ev-1", "start_hour": 0, "end_hour": 4, "energy_required_kwh": 12.0}
        ],
        "prices": hourly_prices("2023-01-02T00:00:00Z", 12),
    });
    let (status, body) = send(app(), post("/api/v1/sweep", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["total_count"], 2);
    let outcomes = body["data"].as_array().unwrap();
    assert!(outcomes.iter().all(|o| o["status"] == "OPTIMAL"));
    assert_eq!(outcomes[1]["start"], "2023-01-02T06:00:00Z");
}

#[tokio::test]
async fn index_sessions_with_observed_power() {
    let body = json!({
        "sessions": [
            {"id": "a", "start": "2023-01-02T07:20:00Z", "end": "2023-01-02T15:40:00Z", "energy_kwh": 12.0},
            {"id": "b", "start": "2023-01-02T09:05:00Z", "end": "2023-01-03T09:00:00Z", "energy_kwh": 30.0}
        ],
        "readings": [
            {"session_id": "a", "timestamp": "2023-01-02T07:30:00Z", "charged_energy_kwh": 2.73}
        ],
        "departure_cap_hours": 12,
    });
    let (status, body) = send(app(), post("/api/v1/sessions/index", body)).await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions[0]["start_hour"], 0);
    assert_eq!(sessions[0]["end_hour"], 8);
    assert!((sessions[0]["max_power_kw"].as_f64().unwrap() - 11.0).abs() < 1e-9);
    assert_eq!(sessions[1]["start_hour"], 2);
    assert_eq!(sessions[1]["end_hour"], 14);
    assert!(sessions[1].get("max_power_kw").is_none());
}

#[tokio::test]
async fn synthetic_prices_cover_the_year() {
    let req = Request::builder()
        .uri("/api/v1/prices/synthetic?year=2030")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["total_count"], 8760);

    let req = Request::builder()
        .uri("/api/v1/prices/synthetic?year=1900")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
