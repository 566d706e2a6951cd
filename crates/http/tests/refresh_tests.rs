//! Token refresh behavior of the admin client against a mock API

use fepa_core::TokenPair;
use fepa_http::client::{AdminClient, ApiRequest, AuthEvent, ClientError, RefreshFailure};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn signed_in_client(server: &MockServer) -> AdminClient {
    let client = AdminClient::new(format!("{}/api", server.uri())).unwrap();
    client
        .session()
        .store_tokens(&TokenPair::new("T1", "R1"))
        .await
        .unwrap();
    client
}

async fn mount_expired_token(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(server)
        .await;
}

fn refreshed(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({
            "success": true,
            "data": { "accessToken": access, "refreshToken": refresh }
        }))
        .set_delay(Duration::from_millis(100))
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/users").await;
    mount_expired_token(&mock_server, "/api/budgets").await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "users": ["a"] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/budgets"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "budgets": ["b"] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let mut events = client.subscribe();

    let (users, budgets) = tokio::join!(
        client.send::<Value>(ApiRequest::get("/users")),
        client.send::<Value>(ApiRequest::get("/budgets")),
    );

    assert_eq!(users.unwrap()["users"][0], "a");
    assert_eq!(budgets.unwrap()["budgets"][0], "b");
    assert_eq!(
        client.session().tokens().await.unwrap(),
        Some(TokenPair::new("T2", "R2"))
    );
    assert_eq!(events.recv().await.unwrap(), AuthEvent::TokensRefreshed);

    let refresh_calls = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/api/auth/refresh")
        .count();
    assert_eq!(refresh_calls, 1);
}

#[tokio::test]
async fn test_many_concurrent_requests_replay_with_same_token() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/expenses").await;

    Mock::given(method("GET"))
        .and(path("/api/expenses"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(8)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send::<Vec<Value>>(ApiRequest::get("/expenses"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}

#[tokio::test]
async fn test_refresh_failure_rejects_all_and_clears_credentials() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/users").await;
    mount_expired_token(&mock_server, "/api/categories").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "refresh token revoked" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    client
        .session()
        .set_csrf_token("csrf".to_string())
        .await
        .unwrap();
    let mut events = client.subscribe();

    let (users, categories) = tokio::join!(
        client.send::<Value>(ApiRequest::get("/users")),
        client.send::<Value>(ApiRequest::get("/categories")),
    );

    let expected = RefreshFailure::Rejected {
        status: 401,
        message: "refresh token revoked".to_string(),
    };
    for result in [users, categories] {
        match result {
            Err(ClientError::RefreshFailed(reason)) => assert_eq!(reason, expected),
            other => panic!("expected refresh failure, got {other:?}"),
        }
    }

    let session = client.session();
    assert_eq!(session.tokens().await.unwrap(), None);
    assert_eq!(session.csrf_token().await.unwrap(), None);
    assert_eq!(
        events.recv().await.unwrap(),
        AuthEvent::SessionExpired { reason: expected }
    );
    assert!(events.try_recv().is_err(), "credentials cleared once");
}

#[tokio::test]
async fn test_retried_request_does_not_refresh_again() {
    let mock_server = MockServer::start().await;

    // Every token is rejected, including the refreshed one
    Mock::given(method("GET"))
        .and(path("/api/payments"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "nope" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let err = client
        .send::<Value>(ApiRequest::get("/payments"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(!err.is_session_expired());
}

#[tokio::test]
async fn test_request_marked_retried_skips_refresh() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/users").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let mut request = ApiRequest::get("/users");
    request.retried = true;

    let err = client.send::<Value>(request).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_refresh_token() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/users").await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "accessToken": "T2" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let _: Vec<Value> = client.send(ApiRequest::get("/users")).await.unwrap();

    assert_eq!(
        client.session().tokens().await.unwrap(),
        Some(TokenPair::new("T2", "R1"))
    );
}

#[tokio::test]
async fn test_missing_refresh_token_expires_session() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/users").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = AdminClient::new(format!("{}/api", mock_server.uri())).unwrap();
    client
        .session()
        .store_tokens(&TokenPair::new("T1", ""))
        .await
        .unwrap();

    let err = client
        .send::<Value>(ApiRequest::get("/users"))
        .await
        .unwrap_err();
    assert!(err.is_session_expired());
}

#[tokio::test]
async fn test_late_401_after_failed_refresh_expires_session_once() {
    let mock_server = MockServer::start().await;

    mount_expired_token(&mock_server, "/api/budgets").await;

    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "jwt expired" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "revoked" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let mut events = client.subscribe();

    // The reports request is already in flight with T1 when the refresh fails
    let (budgets, reports) = tokio::join!(
        client.send::<Value>(ApiRequest::get("/budgets")),
        client.send::<Value>(ApiRequest::get("/reports")),
    );

    let expected = RefreshFailure::Rejected {
        status: 401,
        message: "revoked".to_string(),
    };
    for result in [budgets, reports] {
        match result {
            Err(ClientError::RefreshFailed(reason)) => assert_eq!(reason, expected),
            other => panic!("expected refresh failure, got {other:?}"),
        }
    }

    let mut expired = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, AuthEvent::SessionExpired { .. }) {
            expired += 1;
        }
    }
    assert_eq!(expired, 1);
}
