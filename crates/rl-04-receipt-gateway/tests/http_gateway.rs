//! HTTP gateway against an in-process backend that checks RL1 signatures.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use rl_04_receipt_gateway::{
    DeskOutcome, FallbackInstruction, GatewayConfig, GatewayError, HttpReceiptGateway,
    IssueReceiptRequest, ReceiptIssuer, ReceiptVerifier, ValidateReceiptRequest,
    VerificationDesk, CONSUME_PATH, ISSUE_PATH, VALIDATE_PATH,
};
use serde_json::{json, Value};
use shared_crypto::{
    RequestSigner, SignedHeaders, HEADER_BODY_HASH, HEADER_NONCE, HEADER_SIGNATURE,
    HEADER_TIMESTAMP,
};
use shared_types::{CartItem, CatalogItem, Money, SessionId, Snapshot, TerminalIdentity};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "backend-shared-secret";
const VERIFIER_KEY: &str = "desk-key-1";
const PREFIX: &str = "/functions/v1";

struct Backend {
    signer: RequestSigner,
    nonces: Mutex<HashSet<String>>,
    bodies: Mutex<Vec<Value>>,
}

type Reply = Result<Json<Value>, (StatusCode, String)>;

fn header(headers: &HeaderMap, name: &str) -> Result<String, (StatusCode, String)> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or((StatusCode::UNAUTHORIZED, format!("missing {name}")))
}

fn authenticate(
    backend: &Backend,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Value, (StatusCode, String)> {
    let signed = SignedHeaders {
        timestamp: header(headers, HEADER_TIMESTAMP)?
            .parse()
            .map_err(|_| (StatusCode::BAD_REQUEST, "bad timestamp".to_string()))?,
        nonce: header(headers, HEADER_NONCE)?,
        body_hash: header(headers, HEADER_BODY_HASH)?,
        signature: header(headers, HEADER_SIGNATURE)?,
    };
    backend
        .signer
        .verify("POST", path, body, &signed)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;
    if !backend.nonces.lock().insert(signed.nonce) {
        return Err((StatusCode::CONFLICT, "nonce replay".to_string()));
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    backend.bodies.lock().push(value.clone());
    Ok(value)
}

fn require_verifier(headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    if header(headers, "x-verifier-key")? != VERIFIER_KEY {
        return Err((StatusCode::FORBIDDEN, "bad verifier key".to_string()));
    }
    Ok(())
}

async fn issue(State(backend): State<Arc<Backend>>, headers: HeaderMap, body: Bytes) -> Reply {
    let value = authenticate(&backend, ISSUE_PATH, &headers, &body)?;
    let token = format!("tok_{}", value["terminal_code"].as_str().unwrap_or("x"));
    Ok(Json(json!({
        "token_id": token,
        "public_url": format!("https://r.test/{token}"),
        "qr_url": format!("https://r.test/{token}/qr"),
        "preview_url": format!("https://r.test/{token}/preview"),
    })))
}

async fn validate(State(backend): State<Arc<Backend>>, headers: HeaderMap, body: Bytes) -> Reply {
    require_verifier(&headers)?;
    let value = authenticate(&backend, VALIDATE_PATH, &headers, &body)?;
    Ok(Json(json!({ "valid": true, "token_id": value["token_id"], "status": "ISSUED" })))
}

async fn consume(State(backend): State<Arc<Backend>>, headers: HeaderMap, body: Bytes) -> Reply {
    require_verifier(&headers)?;
    authenticate(&backend, CONSUME_PATH, &headers, &body)?;
    Ok(Json(json!({ "already_consumed": false, "consumed_at": "2026-03-01T10:00:00.000Z" })))
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}{PREFIX}")
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend {
        signer: RequestSigner::new(SECRET).unwrap(),
        nonces: Mutex::new(HashSet::new()),
        bodies: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route(&format!("{PREFIX}{ISSUE_PATH}"), post(issue))
        .route(&format!("{PREFIX}{VALIDATE_PATH}"), post(validate))
        .route(&format!("{PREFIX}{CONSUME_PATH}"), post(consume))
        .with_state(backend.clone());
    (serve(router).await, backend)
}

fn config(base_url: &str) -> GatewayConfig {
    GatewayConfig::default()
        .with_base_url(base_url)
        .with_signing_secret(SECRET)
        .with_verifier_key(VERIFIER_KEY)
        .with_timeout(Duration::from_millis(1000))
}

fn paid_request() -> IssueReceiptRequest {
    let terminal = TerminalIdentity {
        retailer_id: "ret_1".to_string(),
        store_id: "store_1".to_string(),
        terminal_id: "T-07".to_string(),
    };
    let mut snapshot = Snapshot::initial(SessionId::new(), terminal, "EUR", Utc::now());
    let item = CatalogItem {
        sku: "MILK-1L".to_string(),
        name: "Milk 1L".to_string(),
        unit_price: Money::from_major(0.99),
        vat_rate: 0.06,
    };
    snapshot.cart.items.push(CartItem::new(1, &item, 3));
    snapshot.cart.recompute_totals();
    IssueReceiptRequest::from_snapshot(&snapshot, Utc::now())
}

#[tokio::test]
async fn test_issue_sends_verifiable_signature() {
    let (url, backend) = spawn_backend().await;
    let gateway = HttpReceiptGateway::new(config(&url)).unwrap();

    let receipt = gateway.issue(&paid_request()).await.unwrap();

    assert_eq!(receipt.token_id, "tok_T-07");
    assert_eq!(receipt.public_url, "https://r.test/tok_T-07");
    let bodies = backend.bodies.lock();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["total"], json!(3.15));
    assert_eq!(bodies[0]["items"][0]["quantity"], json!(3));
}

#[tokio::test]
async fn test_each_call_uses_fresh_nonce() {
    let (url, backend) = spawn_backend().await;
    let gateway = HttpReceiptGateway::new(config(&url)).unwrap();

    gateway.issue(&paid_request()).await.unwrap();
    gateway.issue(&paid_request()).await.unwrap();

    assert_eq!(backend.nonces.lock().len(), 2);
}

#[tokio::test]
async fn test_wrong_secret_is_upstream_rejection() {
    let (url, _backend) = spawn_backend().await;
    let gateway =
        HttpReceiptGateway::new(config(&url).with_signing_secret("some-other-secret")).unwrap();

    let err = gateway.issue(&paid_request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { status: 401, .. }));
    assert!(err.is_upstream());
}

#[tokio::test]
async fn test_validate_and_consume_carry_verifier_key() {
    let (url, _backend) = spawn_backend().await;
    let gateway = HttpReceiptGateway::new(config(&url)).unwrap();
    let req = ValidateReceiptRequest::new("tok_T-07", "store_1", "T-07").with_reason("return");

    let verified = gateway.validate(&req).await.unwrap();
    assert!(verified.valid);
    assert_eq!(verified.token_id.as_deref(), Some("tok_T-07"));

    let consumed = gateway.consume(&req).await.unwrap();
    assert!(!consumed.already_consumed);
    assert!(consumed.consumed_at.is_some());
}

#[tokio::test]
async fn test_wrong_verifier_key_is_rejected() {
    let (url, _backend) = spawn_backend().await;
    let gateway = HttpReceiptGateway::new(config(&url).with_verifier_key("nope")).unwrap();

    let err = gateway
        .validate(&ValidateReceiptRequest::new("tok", "store_1", "T-07"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { status: 403, .. }));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    async fn slow() -> Json<Value> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Json(json!({}))
    }
    let router = Router::new().route(&format!("{PREFIX}{ISSUE_PATH}"), post(slow));
    let url = serve(router).await;
    let gateway =
        HttpReceiptGateway::new(config(&url).with_timeout(Duration::from_millis(100))).unwrap();

    let err = gateway.issue(&paid_request()).await.unwrap_err();

    assert_eq!(err, GatewayError::Timeout(100));
    assert!(err.is_network());
}

#[tokio::test]
async fn test_unexpected_body_is_decode_error() {
    async fn garbage() -> Json<Value> {
        Json(json!({ "unexpected": true }))
    }
    let router = Router::new().route(&format!("{PREFIX}{ISSUE_PATH}"), post(garbage));
    let url = serve(router).await;
    let gateway = HttpReceiptGateway::new(config(&url)).unwrap();

    let err = gateway.issue(&paid_request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn test_desk_falls_back_when_backend_fails() {
    async fn broken() -> (StatusCode, &'static str) {
        (StatusCode::BAD_GATEWAY, "upstream unavailable")
    }
    let router = Router::new()
        .route(&format!("{PREFIX}{VALIDATE_PATH}"), post(broken))
        .route(&format!("{PREFIX}{CONSUME_PATH}"), post(broken));
    let url = serve(router).await;
    let desk = VerificationDesk::new(HttpReceiptGateway::new(config(&url)).unwrap());
    let req = ValidateReceiptRequest::new("tok_1", "store_1", "T-07");

    let outcome = desk.verify_or_fallback(&req).await.unwrap();
    match outcome {
        DeskOutcome::Fallback(FallbackInstruction::PrintReceipt { code, message }) => {
            assert_eq!(code, "RL_UPSTREAM_ERROR");
            assert!(message.contains("502"));
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert!(desk.consume_or_fallback(&req).await.unwrap().is_fallback());
}

#[tokio::test]
async fn test_unreachable_backend_falls_back() {
    let desk = VerificationDesk::new(HttpReceiptGateway::new(config("http://127.0.0.1:1")).unwrap());
    let outcome = desk
        .verify_or_fallback(&ValidateReceiptRequest::new("tok_1", "store_1", "T-07"))
        .await
        .unwrap();
    assert!(outcome.is_fallback());
}
