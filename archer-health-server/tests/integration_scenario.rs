use archer_health_server::{server, storage};
use archer_health_shared::api::rest::{self, RestError};
use archer_health_shared::domain::ML_PER_FL_OZ;
use archer_health_shared::jwt::{SessionClaims, encode};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;

const TEST_SECRET: &str = "testsecret";

struct TestServer {
    base: String,
    client: Client,
    store: storage::Store,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        Self::spawn_with(Some(TEST_SECRET)).await
    }

    async fn spawn_with(secret: Option<&str>) -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle, store) = match start_server(&db_path, secret).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            store,
            handle,
            _tempdir: dir,
        })
    }

    /// Mints a session token the way the external identity provider would.
    fn session_token(&self, subject: &str) -> String {
        let claims = SessionClaims {
            sub: subject.to_string(),
            jti: format!("jti-{subject}"),
            exp: Utc::now().timestamp() + 3600,
        };
        encode(&claims, TEST_SECRET.as_bytes()).expect("encode session token")
    }

    /// Provisions the user row for a subject and returns its internal id.
    async fn sync_user(&self, token: &str) -> i64 {
        let body = self
            .request_expect(
                "POST",
                "/api/sync-user",
                Some(token),
                Some(json!({})),
                StatusCode::OK,
            )
            .await;
        body.get("id")
            .and_then(|v| v.as_i64())
            .expect("id missing from sync-user response")
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    tmp_db: &Path,
    secret: Option<&str>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>, storage::Store), std::io::Error> {
    let config = server::AppConfig {
        session_jwt_secret: secret.map(|s| s.to_string()),
        dev_cors_origin: None,
        listen_port: None,
    };

    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");

    let state = server::AppState::new(config, store.clone());
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle, store))
}

fn assert_is_connection_code(code: &str) {
    assert_eq!(code.len(), 32, "connection code must be 32 chars: {code}");
    assert!(
        code.chars().all(|c| c.is_ascii_hexdigit()),
        "connection code must be hex: {code}"
    );
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server
        .request_expect("GET", "/healthz", None, None, StatusCode::OK)
        .await;
    let enabled = server
        .request_expect("GET", "/api/auth-enabled", None, None, StatusCode::OK)
        .await;
    assert_eq!(enabled.get("enabled").and_then(|v| v.as_bool()), Some(true));

    // Request ids are echoed back, generated or caller-provided.
    let resp = server
        .client
        .get(format!("{}/healthz", server.base))
        .header("x-request-id", "rid-test-1")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "rid-test-1"
    );
}

#[tokio::test]
async fn auth_disabled_reports_false_and_rejects_sessions() {
    let Some(server) = TestServer::spawn_with(None).await else {
        return;
    };
    let enabled = server
        .request_expect("GET", "/api/auth-enabled", None, None, StatusCode::OK)
        .await;
    assert_eq!(enabled.get("enabled").and_then(|v| v.as_bool()), Some(false));

    // Even a well-formed token cannot validate without a configured secret.
    let token = server.session_token("user_nobody");
    server
        .request_expect(
            "POST",
            "/api/sync-user",
            Some(&token),
            Some(json!({})),
            StatusCode::UNAUTHORIZED,
        )
        .await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases: Vec<(&str, &str, Option<Value>)> = vec![
        ("POST", "/api/sync-user", Some(json!({}))),
        ("POST", "/api/generate-connection-code", None),
        ("GET", "/api/meals", None),
        (
            "POST",
            "/api/meals",
            Some(json!({"foods": [{"name": "egg"}]})),
        ),
        ("GET", "/api/todays-meals", None),
        ("PUT", "/api/water/goal", Some(json!({"goalOz": 64.0}))),
        (
            "POST",
            "/api/water/daily-goals",
            Some(json!({"date": "2026-03-05", "goalMl": 1500.0})),
        ),
    ];

    for (method, path, body) in cases.iter() {
        server
            .request_expect(method, path, None, body.clone(), StatusCode::UNAUTHORIZED)
            .await;
        server
            .request_expect(
                method,
                path,
                Some("not-a-jwt"),
                body.clone(),
                StatusCode::UNAUTHORIZED,
            )
            .await;
    }
}

#[tokio::test]
async fn sync_user_is_idempotent() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_carol");
    let first = server
        .request_expect(
            "POST",
            "/api/sync-user",
            Some(&token),
            Some(json!({"displayName": "Carol"})),
            StatusCode::OK,
        )
        .await;
    let second = server
        .request_expect(
            "POST",
            "/api/sync-user",
            Some(&token),
            Some(json!({"displayName": "Carol D."})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(first.get("id"), second.get("id"));
    assert_eq!(
        second.get("displayName").and_then(|v| v.as_str()),
        Some("Carol D.")
    );
    assert_eq!(
        second.get("subject").and_then(|v| v.as_str()),
        Some("user_carol")
    );
}

#[tokio::test]
async fn connection_code_lifecycle() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_alice");
    let user_id = server.sync_user(&token).await;

    let first = server
        .request_expect(
            "POST",
            "/api/generate-connection-code",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let first_code = first
        .get("connectionCode")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    assert_is_connection_code(&first_code);

    // A second issuance silently invalidates the first code.
    let second = server
        .request_expect(
            "POST",
            "/api/generate-connection-code",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let second_code = second
        .get("connectionCode")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    assert_is_connection_code(&second_code);
    assert_ne!(first_code, second_code);

    match rest::redeem_connection_code(&server.base, &first_code, "aqua-1").await {
        Err(RestError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("stale code should be gone: {other:?}"),
    }

    // The live code redeems exactly once.
    let redeemed = rest::redeem_connection_code(&server.base, &second_code, "aqua-1")
        .await
        .expect("redeem live code");
    assert!(redeemed.success);
    assert_eq!(i64::from(redeemed.archer_health_user_id), user_id);

    match rest::redeem_connection_code(&server.base, &second_code, "aqua-1").await {
        Err(RestError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("second redemption should fail: {other:?}"),
    }
}

#[tokio::test]
async fn redeem_validates_field_presence() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases = vec![
        json!({}),
        json!({"connectionCode": "0123456789abcdef0123456789abcdef"}),
        json!({"archerAquaUserId": "aqua-1"}),
        json!({"connectionCode": "", "archerAquaUserId": "aqua-1"}),
        json!({"connectionCode": "0123456789abcdef0123456789abcdef", "archerAquaUserId": "  "}),
    ];
    for body in cases {
        server
            .request_expect(
                "POST",
                "/api/redeem-connection-code",
                None,
                Some(body),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }

    // Well-formed but unknown code is NotFound, not BadRequest.
    server
        .request_expect(
            "POST",
            "/api/redeem-connection-code",
            None,
            Some(json!({
                "connectionCode": "ffffffffffffffffffffffffffffffff",
                "archerAquaUserId": "aqua-1"
            })),
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn expired_codes_are_dead() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_dave");
    let user_id = server.sync_user(&token).await;

    // Backdate issuance past the TTL straight in storage.
    let stale_code = "00112233445566778899aabbccddeeff";
    let issued = (Utc::now() - Duration::minutes(16)).naive_utc();
    server
        .store
        .set_connection_code(user_id as i32, stale_code, issued)
        .await
        .expect("backdate code");

    match rest::redeem_connection_code(&server.base, stale_code, "aqua-1").await {
        Err(RestError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expired code should not redeem: {other:?}"),
    }
    match rest::hydration_goals(&server.base, stale_code, None).await {
        Err(RestError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("expired code should not authenticate: {other:?}"),
    }
}

#[tokio::test]
async fn hydration_goal_resolution_order() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_erin");
    server.sync_user(&token).await;
    let code = server
        .request_expect(
            "POST",
            "/api/generate-connection-code",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await
        .get("connectionCode")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    // No daily goal, no stored default: fixed fallback.
    let fallback = rest::hydration_goals(&server.base, &code, None)
        .await
        .expect("hydration fallback");
    assert_eq!(fallback.water_goal, 2000.0);
    assert_eq!(fallback.water_goal_unit, "ml");
    assert!(!fallback.daily_goal);

    // Stored default is ounces, converted with the fixed factor.
    server
        .request_expect(
            "PUT",
            "/api/water/goal",
            Some(&token),
            Some(json!({"goalOz": 67.6})),
            StatusCode::OK,
        )
        .await;
    let converted = rest::hydration_goals(&server.base, &code, None)
        .await
        .expect("hydration from default");
    assert!((converted.water_goal - 67.6 * ML_PER_FL_OZ).abs() < 1e-6);
    assert!(!converted.daily_goal);

    // A per-date goal wins over the default for that date only.
    server
        .request_expect(
            "POST",
            "/api/water/daily-goals",
            Some(&token),
            Some(json!({"date": "2026-03-05", "goalMl": 1500.0})),
            StatusCode::OK,
        )
        .await;
    let daily = rest::hydration_goals(&server.base, &code, Some("2026-03-05"))
        .await
        .expect("hydration daily override");
    assert_eq!(daily.water_goal, 1500.0);
    assert!(daily.daily_goal);

    let other_day = rest::hydration_goals(&server.base, &code, Some("2026-03-06"))
        .await
        .expect("hydration other day");
    assert!((other_day.water_goal - 67.6 * ML_PER_FL_OZ).abs() < 1e-6);
    assert!(!other_day.daily_goal);

    // The read path never invalidates the code.
    rest::hydration_goals(&server.base, &code, None)
        .await
        .expect("code still live after reads");
}

#[tokio::test]
async fn hydration_auth_failures() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_frank");
    server.sync_user(&token).await;
    let code = server
        .request_expect(
            "POST",
            "/api/generate-connection-code",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await
        .get("connectionCode")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    // No Authorization header at all.
    let resp = server
        .client
        .get(format!("{}/api/water/hydration-goals", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Unknown code: also 401, indistinguishable from malformed.
    match rest::hydration_goals(&server.base, "ffffffffffffffffffffffffffffffff", None).await {
        Err(RestError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("unknown code should be unauthorized: {other:?}"),
    }

    // A live code with a malformed date is the caller's fault.
    let resp = server
        .client
        .get(format!(
            "{}/api/water/hydration-goals?date=yesterday",
            server.base
        ))
        .bearer_auth(&code)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hydration_cors_preflight_and_headers() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_grace");
    server.sync_user(&token).await;
    let code = server
        .request_expect(
            "POST",
            "/api/generate-connection-code",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await
        .get("connectionCode")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    let url = format!("{}/api/water/hydration-goals", server.base);
    let resp = server
        .client
        .request(reqwest::Method::OPTIONS, &url)
        .header("origin", "https://aqua.example")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "authorization")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "*",
        "preflight must allow any origin"
    );
    assert!(headers.contains_key("access-control-allow-methods"));
    assert!(headers.contains_key("access-control-allow-headers"));
    assert!(resp.text().await.unwrap().is_empty());

    // The actual GET carries the permissive origin header too.
    let resp = server
        .client
        .get(&url)
        .header("origin", "https://aqua.example")
        .bearer_auth(&code)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn meal_create_validation() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.session_token("user_henry");
    server.sync_user(&token).await;

    // Empty foods array: rejected, nothing persisted.
    server
        .request_expect(
            "POST",
            "/api/meals",
            Some(&token),
            Some(json!({
                "foods": [],
                "totalCalories": 500,
                "totalProtein": 30,
                "totalCarbs": 40,
                "totalFat": 20
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    // Non-numeric macro: rejected.
    server
        .request_expect(
            "POST",
            "/api/meals",
            Some(&token),
            Some(json!({
                "foods": [{"name": "toast"}],
                "totalCalories": "plenty",
                "totalProtein": 30,
                "totalCarbs": 40,
                "totalFat": 20
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    let listed = server
        .request_expect("GET", "/api/meals", Some(&token), None, StatusCode::OK)
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn meals_are_scoped_and_newest_first() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let alice = server.session_token("user_alice");
    let bob = server.session_token("user_bob");
    server.sync_user(&alice).await;
    server.sync_user(&bob).await;

    let breakfast = server
        .request_expect(
            "POST",
            "/api/meals",
            Some(&alice),
            Some(json!({
                "name": "Breakfast",
                "foods": [
                    {"name": "eggs", "quantity": 2.0, "unit": "pcs", "calories": 155.0},
                    {"name": "toast", "quantity": 1.0, "unit": "slice", "calories": 75.0}
                ],
                "totalCalories": 230,
                "totalProtein": 14,
                "totalCarbs": 16,
                "totalFat": 11
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        breakfast.get("name").and_then(|v| v.as_str()),
        Some("Breakfast")
    );
    assert_eq!(breakfast.get("foods").unwrap().as_array().unwrap().len(), 2);

    // Numeric strings are accepted for macro totals.
    let lunch = server
        .request_expect(
            "POST",
            "/api/meals",
            Some(&alice),
            Some(json!({
                "name": "Lunch",
                "foods": [{"name": "salad"}],
                "totalCalories": "320.5",
                "totalProtein": "12",
                "totalCarbs": "28",
                "totalFat": "18",
                "isPublic": true
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        lunch.get("totalCalories").and_then(|v| v.as_f64()),
        Some(320.5)
    );
    assert_eq!(lunch.get("isPublic").and_then(|v| v.as_bool()), Some(true));

    server
        .request_expect(
            "POST",
            "/api/meals",
            Some(&bob),
            Some(json!({
                "name": "Bob's dinner",
                "foods": [{"name": "pasta"}],
                "totalCalories": 700,
                "totalProtein": 20,
                "totalCarbs": 90,
                "totalFat": 25
            })),
            StatusCode::OK,
        )
        .await;

    let listed = server
        .request_expect("GET", "/api/meals", Some(&alice), None, StatusCode::OK)
        .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2, "only the caller's own meals");
    assert_eq!(listed[0].get("name").and_then(|v| v.as_str()), Some("Lunch"));
    assert_eq!(
        listed[1].get("name").and_then(|v| v.as_str()),
        Some("Breakfast")
    );

    let today = server
        .request_expect("GET", "/api/todays-meals", Some(&alice), None, StatusCode::OK)
        .await;
    assert_eq!(
        today.get("totalCalories").and_then(|v| v.as_f64()),
        Some(230.0 + 320.5)
    );
    assert_eq!(
        today.get("mealEntries").unwrap().as_array().unwrap().len(),
        2
    );
    assert_eq!(
        today.get("date").and_then(|v| v.as_str()),
        Some(Utc::now().format("%Y-%m-%d").to_string().as_str())
    );
}
