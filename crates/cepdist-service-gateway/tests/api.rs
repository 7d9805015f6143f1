use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_test::TestServer;
use serde_json::{Value, json};

use cepdist_lib::{HistoryEntry, QueryType, TravelMode, User};
use cepdist_service_calculator::CalculatorState;
use cepdist_service_gateway::{DistanceResponse, GatewayConfig, GatewayState, router};
use cepdist_service_shared::ProblemDetails;
use cepdist_service_shared::test_utils::test_database;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// ViaCEP stand-in knowing two CEPs; counts every request it serves.
async fn fake_viacep(hits: Arc<AtomicUsize>) -> String {
    async fn lookup(
        State(hits): State<Arc<AtomicUsize>>,
        Path(cep): Path<String>,
    ) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        Json(match cep.as_str() {
            "01001000" => json!({
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP",
                "ddd": "11"
            }),
            "20040020" => json!({
                "cep": "20040-020",
                "logradouro": "Avenida Rio Branco",
                "bairro": "Centro",
                "localidade": "Rio de Janeiro",
                "uf": "RJ",
                "ddd": "21"
            }),
            _ => json!({ "erro": true }),
        })
    }

    serve(
        Router::new()
            .route("/ws/{cep}/json/", get(lookup))
            .with_state(hits),
    )
    .await
}

async fn real_calculator() -> (String, CalculatorState) {
    let state = CalculatorState::new(test_database()).unwrap();
    let url = serve(cepdist_service_calculator::router(state.clone())).await;
    (url, state)
}

async fn slow_calculator() -> String {
    async fn calculate() -> StatusCode {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK
    }
    serve(Router::new().route("/calculate", post(calculate))).await
}

async fn rejecting_calculator() -> String {
    async fn calculate() -> impl IntoResponse {
        ProblemDetails::new(
            "/problems/invalid-coordinate",
            "Invalid Coordinate",
            StatusCode::BAD_REQUEST,
        )
        .with_detail("invalid coordinate: latitude = 91 (expected [-90, 90])")
    }
    serve(Router::new().route("/calculate", post(calculate))).await
}

async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

struct Harness {
    server: TestServer,
    viacep_hits: Arc<AtomicUsize>,
}

async fn harness(calculator_url: String) -> Harness {
    let viacep_hits = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig {
        viacep_url: fake_viacep(viacep_hits.clone()).await,
        calculator_url,
        upstream_timeout: Duration::from_millis(1000),
        ..GatewayConfig::default()
    };
    let state = GatewayState::new(test_database(), &config).unwrap();
    Harness {
        server: TestServer::new(router(state)).unwrap(),
        viacep_hits,
    }
}

async fn all_history(server: &TestServer) -> Vec<HistoryEntry> {
    server.get("/history").await.json()
}

async fn history(server: &TestServer, query_type: QueryType) -> Vec<HistoryEntry> {
    all_history(server)
        .await
        .into_iter()
        .filter(|e| e.query_type == query_type)
        .collect()
}

fn distance_body(mode: &str) -> Value {
    json!({
        "origin_cep": "01001-000",
        "destination_cep": "20040020",
        "travel_mode": mode,
    })
}

#[tokio::test]
async fn address_lookup_is_cached() {
    let h = harness(unreachable_url().await).await;

    for cep in ["01001-000", "01001000"] {
        let response = h.server.get(&format!("/address/{cep}")).await;
        response.assert_status_ok();
        let address: Value = response.json();
        assert_eq!(address["localidade"], "São Paulo");
    }

    assert_eq!(h.viacep_hits.load(Ordering::SeqCst), 1);
    assert_eq!(history(&h.server, QueryType::AddressQuery).await.len(), 1);
}

#[tokio::test]
async fn unknown_and_malformed_ceps() {
    let h = harness(unreachable_url().await).await;

    let response = h.server.get("/address/99999999").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/not-found");

    let response = h.server.get("/address/123").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/invalid-request");

    assert!(history(&h.server, QueryType::AddressQuery).await.is_empty());
}

#[tokio::test]
async fn distance_goes_through_the_calculator() {
    let (calculator_url, calculator) = real_calculator().await;
    let h = harness(calculator_url).await;

    let response = h
        .server
        .post("/distances")
        .json(&distance_body("walking"))
        .await;
    response.assert_status_ok();
    let body: DistanceResponse = response.json();

    assert_eq!(body.origin.localidade, "São Paulo");
    assert_eq!(body.destination.uf, "RJ");
    assert_eq!(body.travel_mode, TravelMode::Walking);
    assert!(body.distance > 0.0);

    let stored = calculator
        .calculator()
        .calculations()
        .get(&body.calculation_id)
        .unwrap();
    assert!((stored.distance - body.distance).abs() < 1e-9);
    assert_eq!(stored.origin.city, "São Paulo");
    assert_eq!(stored.origin.address, "Praça da Sé, Sé");

    let recorded = all_history(&h.server).await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].query_type, QueryType::DistanceCalculation);
    let result: DistanceResponse = serde_json::from_str(&recorded[0].result).unwrap();
    assert_eq!(result.calculation_id, body.calculation_id);
    assert_eq!(result.origin, body.origin);
}

#[tokio::test]
async fn travel_mode_defaults_to_direct() {
    let (calculator_url, _calculator) = real_calculator().await;
    let h = harness(calculator_url).await;

    let body: DistanceResponse = h
        .server
        .post("/distances")
        .json(&json!({"origin_cep": "01001000", "destination_cep": "20040-020"}))
        .await
        .json();
    assert_eq!(body.travel_mode, TravelMode::Direct);
}

#[tokio::test]
async fn unsupported_mode_is_rejected_before_any_lookup() {
    let h = harness(unreachable_url().await).await;

    let response = h
        .server
        .post("/distances")
        .json(&distance_body("flying"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/unsupported-mode");
    assert_eq!(h.viacep_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_calculator_times_out_without_history() {
    let h = harness(slow_calculator().await).await;

    let response = h
        .server
        .post("/distances")
        .json(&distance_body("driving"))
        .await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/upstream-timeout");

    assert!(all_history(&h.server).await.is_empty());
}

#[tokio::test]
async fn calculator_problems_are_passed_through() {
    let h = harness(rejecting_calculator().await).await;

    let response = h
        .server
        .post("/distances")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-pass"),
        )
        .json(&distance_body("direct"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/invalid-coordinate");
    assert!(problem.detail.unwrap().contains("latitude"));
    assert_eq!(problem.instance.as_deref(), Some("req-pass"));

    assert!(all_history(&h.server).await.is_empty());
}

#[tokio::test]
async fn unreachable_calculator_is_bad_gateway() {
    let h = harness(unreachable_url().await).await;

    let response = h
        .server
        .post("/distances")
        .json(&distance_body("direct"))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let problem: ProblemDetails = response.json();
    assert_eq!(problem.type_uri, "/problems/upstream-unavailable");
    assert!(all_history(&h.server).await.is_empty());
}

#[tokio::test]
async fn history_paging_and_delete() {
    let h = harness(unreachable_url().await).await;
    h.server.get("/address/01001000").await.assert_status_ok();
    h.server.get("/address/20040020").await.assert_status_ok();

    let entries: Vec<HistoryEntry> = h.server.get("/history").await.json();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].query_data.contains("20040020"));

    let skipped: Vec<HistoryEntry> = h
        .server
        .get("/history")
        .add_query_param("limit", 1)
        .add_query_param("skip", 1)
        .await
        .json();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].id, entries[1].id);

    let path = format!("/history/{}", entries[0].id);
    h.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_lifecycle() {
    let h = harness(unreachable_url().await).await;

    let response = h
        .server
        .post("/users")
        .json(&json!({"name": "Ana Souza", "email": "ana@example.com"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let user: User = response.json();
    assert!(user.preferences.is_empty());

    let duplicate = h
        .server
        .post("/users")
        .json(&json!({"name": "Other Ana", "email": "ana@example.com"}))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    let problem: ProblemDetails = duplicate.json();
    assert_eq!(problem.type_uri, "/problems/conflict");

    let path = format!("/users/{}", user.id);
    let updated: User = h
        .server
        .put(&path)
        .json(&json!({"preferences": {"unit": "mi"}}))
        .await
        .json();
    assert_eq!(updated.name, "Ana Souza");
    assert_eq!(updated.preferences["unit"], "mi");

    h.server
        .put(&path)
        .json(&json!({"name": "Al"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let fetched: User = h.server.get(&path).await.json();
    assert_eq!(fetched, updated);

    h.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .delete(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_cors() {
    let h = harness(unreachable_url().await).await;

    let response = h
        .server
        .get("/health/ready")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("http://localhost:3000"),
        )
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("access-control-allow-origin"), "*");

    let status: Value = response.json();
    assert_eq!(status["service"], "gateway");
    assert_eq!(status["database_ready"], true);
}
