use axum::http::StatusCode;
use refledger::api;
use refledger::config::Config;
use refledger::db::init_db;
use refledger::domain::{Amount, DurationCode, Order, OrderStatus, SalesCode, TimeMs};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<refledger::Repository>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(refledger::Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        clamp_negative_team_share: false,
        default_max_staleness_ms: 60_000,
    };

    let state = api::AppState::new(repo.clone(), config);
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

async fn request(app: axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register_account(app: &axum::Router, sales_code: &str, rate: Option<f64>) {
    let (status, _) = request(
        app.clone(),
        "POST",
        "/v1/accounts",
        Some(serde_json::json!({
            "salesCode": sales_code,
            "name": sales_code,
            "kind": "primary",
            "commissionRate": rate,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn create_order(
    app: &axum::Router,
    sales_code: &str,
    duration: &str,
    amount: f64,
    actual: Option<f64>,
    username: &str,
) -> (StatusCode, serde_json::Value) {
    request(
        app.clone(),
        "POST",
        "/v1/orders",
        Some(serde_json::json!({
            "salesCode": sales_code,
            "duration": duration,
            "amount": amount,
            "actualPaymentAmount": actual,
            "tradingviewUsername": username,
        })),
    )
    .await
}

async fn transition(app: &axum::Router, id: &str, target: &str) -> (StatusCode, serde_json::Value) {
    request(
        app.clone(),
        "POST",
        &format!("/v1/orders/{}/transition", id),
        Some(serde_json::json!({ "targetStatus": target })),
    )
    .await
}

#[tokio::test]
async fn test_create_paid_order_starts_pending_payment() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (status, order) = create_order(&t.app, "P1", "月付", 199.0, None, "alice").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["durationCode"], "month_1");
    assert!(order["orderNo"].as_str().unwrap().starts_with("RL"));
    assert!(order["commissionAmount"].is_null());
    assert!(order["expiresAt"].is_null());
}

#[tokio::test]
async fn test_create_zero_basis_order_skips_payment() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    // Recorded actual payment of zero overrides the listed amount.
    let (status, order) = create_order(&t.app, "P1", "试用7天", 199.0, Some(0.0), "bob").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending_config");
}

#[tokio::test]
async fn test_create_order_unknown_sales_code_is_404() {
    let t = setup_test_app().await;
    let (status, body) = create_order(&t.app, "NOPE", "月付", 100.0, None, "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_create_order_unrecognized_duration_is_400() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;
    let (status, _) = create_order(&t.app, "P1", "fortnightly", 100.0, None, "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_empty_username_is_400() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;
    let (status, _) = create_order(&t.app, "P1", "月付", 100.0, None, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_transition_chain_settles_commission() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (_, order) = create_order(&t.app, "P1", "年付", 1000.0, None, "alice").await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, o) = transition(&t.app, &id, "confirmed_payment").await;
    assert_eq!(status, StatusCode::OK);
    assert!(o["paymentConfirmedAt"].is_i64());
    assert!(o["commissionAmount"].is_null());

    let (_, o) = transition(&t.app, &id, "pending_config").await;
    assert_eq!(o["status"], "pending_config");

    let (status, o) = transition(&t.app, &id, "confirmed_config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(o["status"], "confirmed_config");
    assert!(o["configConfirmedAt"].is_i64());
    assert!(o["effectiveAt"].is_i64());
    // A one-year subscription gets a concrete expiry.
    assert!(o["expiresAt"].is_i64());
    assert_eq!(o["commissionRateUsed"], 0.4);
    assert_eq!(o["commissionAmount"], 400.0);
}

#[tokio::test]
async fn test_illegal_transition_is_409() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (_, order) = create_order(&t.app, "P1", "月付", 100.0, None, "alice").await;
    let id = order["id"].as_str().unwrap();

    let (status, body) = transition(&t.app, id, "active").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pending_payment"));
}

#[tokio::test]
async fn test_terminal_status_rejects_all_transitions() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (_, order) = create_order(&t.app, "P1", "月付", 100.0, None, "alice").await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, o) = transition(&t.app, &id, "cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(o["status"], "cancelled");

    let (status, _) = transition(&t.app, &id, "pending_payment").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rejected_order_carries_no_commission() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (_, order) = create_order(&t.app, "P1", "月付", 100.0, None, "alice").await;
    let id = order["id"].as_str().unwrap().to_string();

    let (_, o) = transition(&t.app, &id, "confirmed_payment").await;
    assert_eq!(o["status"], "confirmed_payment");
    let (status, o) = transition(&t.app, &id, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    assert!(o["commissionAmount"].is_null());
    assert!(o["commissionRateUsed"].is_null());
}

#[tokio::test]
async fn test_duplicate_free_trial_per_username_is_409() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (status, first) = create_order(&t.app, "P1", "trial", 0.0, None, "carol").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create_order(&t.app, "P1", "7days", 0.0, None, "carol").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains(first["orderNo"].as_str().unwrap()));
}

#[tokio::test]
async fn test_cancelled_trial_frees_the_username() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let (_, first) = create_order(&t.app, "P1", "trial", 0.0, None, "dave").await;
    let id = first["id"].as_str().unwrap().to_string();
    let (status, _) = transition(&t.app, &id, "cancelled").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = create_order(&t.app, "P1", "trial", 0.0, None, "dave").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_paid_trial_does_not_trip_the_duplicate_guard() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    // Only zero-basis trials are rationed per username.
    let (status, _) = create_order(&t.app, "P1", "trial", 9.9, None, "erin").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = create_order(&t.app, "P1", "trial", 9.9, None, "erin").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_deactivated_account_cannot_take_orders() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let found = t
        .repo
        .deactivate_account(&SalesCode::new("P1"), TimeMs::now())
        .await
        .unwrap();
    assert!(found);

    let (status, _) = create_order(&t.app, "P1", "月付", 100.0, None, "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_count_tracks_creations() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    assert_eq!(t.repo.count_orders().await.unwrap(), 0);
    create_order(&t.app, "P1", "月付", 100.0, None, "alice").await;
    create_order(&t.app, "P1", "年付", 900.0, None, "bob").await;
    assert_eq!(t.repo.count_orders().await.unwrap(), 2);
}

#[tokio::test]
async fn test_get_unknown_order_is_404() {
    let t = setup_test_app().await;
    let (status, _) = request(
        t.app.clone(),
        "GET",
        &format!("/v1/orders/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expiry_sweep_activates_and_expires() {
    let t = setup_test_app().await;
    register_account(&t.app, "P1", Some(0.4)).await;

    let now = TimeMs::now();
    let past = TimeMs::new(now.as_ms() - 86_400_000);

    let mut due_active = Order::new(
        SalesCode::new("P1"),
        DurationCode::Month1,
        Amount::from(100),
        None,
        "sweep-a".to_string(),
        past,
    );
    due_active.status = OrderStatus::ConfirmedConfig;
    due_active.effective_at = Some(past);
    due_active.expires_at = DurationCode::Month1.expiry_from(past);

    let mut due_expired = Order::new(
        SalesCode::new("P1"),
        DurationCode::Trial7d,
        Amount::from(10),
        None,
        "sweep-b".to_string(),
        past,
    );
    due_expired.status = OrderStatus::Active;
    due_expired.effective_at = Some(past);
    due_expired.expires_at = Some(TimeMs::new(now.as_ms() - 1000));

    t.repo.insert_order(&due_active).await.unwrap();
    t.repo.insert_order(&due_expired).await.unwrap();

    let (status, body) = request(t.app.clone(), "POST", "/v1/orders/expiry-sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activated"], 1);
    assert_eq!(body["expired"], 1);

    let a = t.repo.get_order(due_active.id).await.unwrap().unwrap();
    assert_eq!(a.status, OrderStatus::Active);
    let b = t.repo.get_order(due_expired.id).await.unwrap().unwrap();
    assert_eq!(b.status, OrderStatus::Expired);
}

#[tokio::test]
async fn test_health_and_readiness_probes() {
    let t = setup_test_app().await;

    let (status, body) = request(t.app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // Readiness goes through the repository, so it proves the pool works.
    let (status, body) = request(t.app.clone(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
