#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::models::Category;

const SECRET: &[u8] = b"api-test-secret-that-is-long-enough";

struct Harness {
    _dir: tempfile::TempDir,
    app: Router,
    token: String,
    groceries: Uuid,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let mut db = Database::open(&path).unwrap();
        let user = db.insert_user("alice@example.com").unwrap();
        let cats = db.get_categories(user.id).unwrap();
        let groceries = Category::find_by_name(&cats, "Groceries").unwrap().id;

        let tokens = TokenIssuer::new(SECRET, chrono::Duration::hours(1)).unwrap();
        let token = tokens.issue(user.id);
        let app = router(AppState::new(path, tokens, Coordinator::default()));
        Self {
            _dir: dir,
            app,
            token,
            groceries,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(&self.token), None).await
    }

    async fn send(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(method, uri, Some(&self.token), Some(body)).await
    }

    fn expense(&self, amount: &str, date: &str) -> Value {
        json!({
            "type": "EXPENSE",
            "amount": amount,
            "categoryId": self.groceries,
            "date": date,
            "source": "MANUAL"
        })
    }
}

#[tokio::test]
async fn health_needs_no_token() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let h = Harness::new();
    for token in [None, Some("garbage")] {
        for uri in ["/api/me", "/api/dashboard", "/api/transactions", "/api/sync/status"] {
            let (status, body) = h.call(Method::GET, uri, token, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["error"].is_string());
        }
    }
    let (status, _) = h
        .call(Method::POST, "/api/sync", None, Some(json!({ "nonsense": true })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_profile_with_settings() {
    let h = Harness::new();
    let (status, body) = h.get("/api/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["settings"]["theme"], "LIGHT");
}

#[tokio::test]
async fn transaction_crud_round_trip() {
    let h = Harness::new();
    let (status, created) = h
        .send(Method::POST, "/api/transactions", h.expense("12.50", "2025-04-01T10:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["amount"], "12.50");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = h.get(&format!("/api/transactions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = h
        .send(
            Method::PUT,
            &format!("/api/transactions/{id}"),
            h.expense("13.00", "2025-04-01T10:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["amount"], "13.00");
    assert!(updated["version"].as_i64().unwrap() > created["version"].as_i64().unwrap());

    let (status, _) = h
        .call(Method::DELETE, &format!("/api/transactions/{id}"), Some(&h.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = h.get(&format!("/api/transactions/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn float_amounts_are_rejected() {
    let h = Harness::new();
    let mut body = h.expense("1", "2025-04-01T10:00:00Z");
    body["amount"] = json!(1.5);
    let (status, body) = h.send(Method::POST, "/api/transactions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn list_transactions_with_filters() {
    let h = Harness::new();
    h.send(Method::POST, "/api/transactions", h.expense("1", "2025-01-10T00:00:00Z")).await;
    h.send(Method::POST, "/api/transactions", h.expense("2", "2025-02-10T00:00:00Z")).await;

    let (status, all) = h.get("/api/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["amount"], "2");

    let (_, feb) = h
        .get("/api/transactions?from=2025-02-01T00:00:00Z&type=EXPENSE&source=MANUAL")
        .await;
    assert_eq!(feb.as_array().unwrap().len(), 1);

    let (status, _) = h.get("/api/transactions?type=REFUND").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_then_pull_changes() {
    let h = Harness::new();
    let id = Uuid::new_v4();
    let mut candidate = h.expense("9.99", "2025-03-03T08:00:00Z");
    candidate["id"] = json!(id);

    let (status, resp) = h
        .send(
            Method::POST,
            "/api/sync",
            json!({ "checkpoint": 0, "transactions": [candidate] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["transactions"][0]["id"], json!(id));
    assert!(resp["conflicts"].as_array().unwrap().is_empty());
    let checkpoint = resp["checkpoint"].as_i64().unwrap();
    assert!(checkpoint > 0);

    let (_, changes) = h.get("/api/sync/changes?since=0").await;
    assert_eq!(changes["transactions"][0]["id"], json!(id));
    assert_eq!(changes["checkpoint"], checkpoint);

    let (_, none) = h.get(&format!("/api/sync/changes?since={checkpoint}")).await;
    assert!(none["transactions"].as_array().unwrap().is_empty());

    let (_, status_report) = h.get("/api/sync/status").await;
    assert_eq!(status_report["last"]["status"], "SYNCED");
}

#[tokio::test]
async fn sync_reports_conflicts() {
    let h = Harness::new();
    let (_, created) = h
        .send(Method::POST, "/api/budgets", json!({
            "categoryId": h.groceries,
            "monthlyLimit": "400",
            "startDate": "2025-01-01"
        }))
        .await;
    let id = created["id"].clone();
    let stale = created["version"].as_i64().unwrap() - 1;

    let (status, resp) = h
        .send(
            Method::POST,
            "/api/sync",
            json!({
                "checkpoint": stale,
                "budgets": [{
                    "id": id,
                    "categoryId": h.groceries,
                    "monthlyLimit": "999",
                    "startDate": "2025-01-01"
                }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["budgets"][0]["monthlyLimit"], "400");
    assert_eq!(resp["conflicts"][0]["kind"], "budget");
    assert_eq!(resp["conflicts"][0]["clientValue"]["monthlyLimit"], "999");
    assert_eq!(resp["conflicts"][0]["serverValue"], created);
}

#[tokio::test]
async fn dashboard_and_categories() {
    let h = Harness::new();
    h.send(Method::POST, "/api/transactions", h.expense("0.10", "2025-01-01T00:00:00Z")).await;
    h.send(Method::POST, "/api/transactions", h.expense("0.20", "2025-01-02T00:00:00Z")).await;

    let (status, dash) = h.get("/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["totalExpenses"], "0.30");
    assert_eq!(dash["recentTransactions"].as_array().unwrap().len(), 2);

    let (status, cat) = h
        .send(Method::POST, "/api/categories", json!({ "name": "Pets" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cat["name"], "Pets");

    let (_, cats) = h.get("/api/categories").await;
    assert!(cats.as_array().unwrap().iter().any(|c| c["name"] == "Pets"));

    let (status, _) = h
        .send(Method::POST, "/api/categories", json!({ "name": "pets" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
