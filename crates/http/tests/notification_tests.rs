//! Notification center behavior against a mock API

use fepa_core::TokenPair;
use fepa_http::client::AdminClient;
use fepa_http::notifications::{NotificationCenter, PushEvent, ReadScope, spawn_poller};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn center(server: &MockServer) -> NotificationCenter {
    let client = AdminClient::new(format!("{}/api", server.uri())).unwrap();
    client
        .session()
        .store_tokens(&TokenPair::new("T1", "R1"))
        .await
        .unwrap();
    NotificationCenter::new(client)
}

fn unread_count(count: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": { "count": count } }))
}

fn notification(id: &str, read: bool) -> Value {
    json!({
        "_id": id,
        "type": "info",
        "title": format!("Title {id}"),
        "message": "Body",
        "isRead": read,
        "createdAt": "2024-04-01T12:00:00Z"
    })
}

fn page(items: Vec<Value>, unread: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": { "notifications": items, "total": 2, "unreadCount": unread }
    }))
}

#[tokio::test]
async fn test_poll_replaces_unread_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(5))
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    center
        .handle_push(PushEvent::UnreadCount(99))
        .await;

    assert_eq!(center.poll_unread().await.unwrap(), 5);
    assert_eq!(center.unread_count().await, 5);
}

#[tokio::test]
async fn test_mark_as_read_decrements_and_floors_at_zero() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(3))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(0))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/n1/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;

    center.poll_unread().await.unwrap();
    center.mark_as_read("n1").await.unwrap();
    assert_eq!(center.unread_count().await, 2);

    center.poll_unread().await.unwrap();
    center.mark_as_read("n1").await.unwrap();
    assert_eq!(center.unread_count().await, 0);
}

#[tokio::test]
async fn test_failed_mark_as_read_restores_flag() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(page(vec![notification("n1", false), notification("n2", true)], 1))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/n1/read"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "db down" })))
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    center.notifications().await.unwrap();
    assert_eq!(center.unread_count().await, 1);

    let err = center.mark_as_read("n1").await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let snapshot = center.snapshot().await;
    assert!(!snapshot.items().unwrap()[0].read);
    assert_eq!(snapshot.unread_count(), 1);
}

#[tokio::test]
async fn test_list_is_cached_until_invalidated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(page(vec![notification("n1", false)], 1))
        .expect(2)
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    let mut pushes = center.subscribe();

    assert_eq!(center.notifications().await.unwrap().len(), 1);
    assert_eq!(center.notifications().await.unwrap().len(), 1);

    center
        .handle_push(PushEvent::NotificationRead(ReadScope::One("n1".into())))
        .await;
    assert!(center.snapshot().await.is_stale());
    assert_eq!(
        pushes.recv().await.unwrap(),
        PushEvent::NotificationRead(ReadScope::One("n1".into()))
    );

    assert_eq!(center.notifications().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_all_and_delete_all() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/read-all"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(0))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(page(Vec::new(), 0))
        .expect(1)
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    center.handle_push(PushEvent::UnreadCount(4)).await;

    center.mark_all_as_read().await.unwrap();
    assert_eq!(center.unread_count().await, 0);
    assert!(center.snapshot().await.is_stale());

    center.delete_all().await.unwrap();
    assert!(center.snapshot().await.is_stale());
    assert_eq!(center.notifications().await.unwrap(), Vec::new());
}

#[tokio::test]
async fn test_delete_resyncs_count_from_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/notifications/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(6))
        .expect(1)
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    center.handle_push(PushEvent::UnreadCount(2)).await;

    center.delete("n1").await.unwrap();
    assert_eq!(center.unread_count().await, 6);
}

#[tokio::test]
async fn test_poller_updates_count_and_survives_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(unread_count(7))
        .mount(&mock_server)
        .await;

    let center = center(&mock_server).await;
    let shutdown = CancellationToken::new();
    let handle = spawn_poller(center.clone(), Duration::from_millis(50), shutdown.clone());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(center.unread_count().await, 7);

    shutdown.cancel();
    handle.await.unwrap();

    let polls = mock_server.received_requests().await.unwrap().len();
    assert!(polls >= 2, "poller kept going after a failed tick");
}
