// HTTP tests for the event routes, driven against the in-memory store

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cadence_api::build_app;
use cadence_api::config::ApiConfig;
use cadence_core::InMemoryEventStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = ApiConfig::from_lookup(|_| None).unwrap();
    build_app(Arc::new(InMemoryEventStore::new()), &config)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn weekly_payload() -> Value {
    json!({
        "title": "Planning",
        "description": "Sprint planning",
        "starts_at": "2024-04-01T09:00:00+02:00",
        "ends_at": "2024-04-01T10:00:00+02:00",
        "recurrent": true,
        "frequency": "weekly",
        "repeat_until": "2024-04-15T10:00:00+02:00"
    })
}

fn single_payload(title: &str, starts_at: &str, ends_at: &str) -> Value {
    json!({
        "title": title,
        "starts_at": starts_at,
        "ends_at": ends_at,
        "recurrent": false
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));
}

#[tokio::test]
async fn test_create_recurring_event_materializes_children() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/v1/events", Some(weekly_payload())).await;

    assert_eq!(status, StatusCode::CREATED);
    let event = &body["data"];
    assert_eq!(event["title"], "Planning");
    assert_eq!(event["starts_at"], "2024-04-01T09:00:00+02:00");
    assert_eq!(event["frequency"], "weekly");
    assert_eq!(event["repeat_until"], "2024-04-15T10:00:00+02:00");
    assert!(event.get("events").is_none());

    let id = event["id"].as_str().unwrap();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/events/{id}?include=events"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let children = body["data"]["events"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["starts_at"], "2024-04-08T09:00:00+02:00");
    assert_eq!(children[1]["starts_at"], "2024-04-15T09:00:00+02:00");
    assert!(children.iter().all(|c| c["parent_id"] == id));
}

#[tokio::test]
async fn test_non_recurrent_event_hides_recurrence_fields() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/v1/events",
        Some(single_payload(
            "Dentist",
            "2024-05-01T10:00:00Z",
            "2024-05-01T11:00:00Z",
        )),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["recurrent"], false);
    assert!(body["data"].get("frequency").is_none());
    assert!(body["data"].get("repeat_until").is_none());
    assert!(body["data"]["created_at"].is_string());
}

#[tokio::test]
async fn test_invalid_payload_returns_field_errors() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/v1/events",
        Some(json!({
            "title": "",
            "starts_at": "2024-05-01T10:00:00Z",
            "ends_at": "2024-05-01T09:00:00Z",
            "recurrent": true,
            "frequency": "hourly"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors["title"][0], "The title field is required.");
    assert_eq!(errors["ends_at"][0], "The ends at field must be a date after starts at.");
    assert_eq!(errors["frequency"][0], "The selected frequency is invalid.");
    assert_eq!(errors["repeat_until"][0], "The repeat until field is required.");
    assert!(body["message"].as_str().unwrap().contains("more errors"));
}

#[tokio::test]
async fn test_overlap_is_reported_under_overlap_key() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/v1/events", Some(weekly_payload())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/events",
        Some(single_payload(
            "Clash",
            "2024-04-08T09:30:00+02:00",
            "2024-04-08T11:00:00+02:00",
        )),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["overlap"][0],
        "Event period should not overlap existing events."
    );
    assert_eq!(body["message"], "Event period should not overlap existing events.");
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let app = app();
    let uri = format!("/v1/events/{}", uuid::Uuid::now_v7());

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().starts_with("Event not found"));

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let payload = single_payload("Ghost", "2024-05-01T10:00:00Z", "2024-05-01T11:00:00Z");
    let (status, _) = send(&app, Method::PUT, &uri, Some(payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_parent_removes_series() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/v1/events", Some(weekly_payload())).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::DELETE, &format!("/v1/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, body) = send(&app, Method::GET, "/v1/events", None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_delete_middle_child_keeps_earlier_occurrences() {
    let app = app();
    let mut payload = weekly_payload();
    payload["repeat_until"] = json!("2024-04-22T10:00:00+02:00");
    let (_, body) = send(&app, Method::POST, "/v1/events", Some(payload)).await;
    let parent_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/v1/events/{parent_id}?include=events"),
        None,
    )
    .await;
    let children = body["data"]["events"].as_array().unwrap().clone();
    assert_eq!(children.len(), 3);

    let second = children[1]["id"].as_str().unwrap();
    let (status, _) = send(&app, Method::DELETE, &format!("/v1/events/{second}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/v1/events", None).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![parent_id.as_str(), children[0]["id"].as_str().unwrap()]);
}

#[tokio::test]
async fn test_update_toggle_off_demotes_parent() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/v1/events", Some(weekly_payload())).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let payload = single_payload(
        "Planning",
        "2024-04-01T09:00:00+02:00",
        "2024-04-01T10:00:00+02:00",
    );
    let uri = format!("/v1/events/{id}");
    let (status, body) = send(&app, Method::PATCH, &uri, Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recurrent"], false);

    let (_, body) = send(&app, Method::GET, "/v1/events?include=events", None).await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["events"], json!([]));
}

#[tokio::test]
async fn test_list_filters_are_inclusive() {
    let app = app();
    for (title, start, end) in [
        ("a", "2024-05-01T09:00:00Z", "2024-05-01T10:00:00Z"),
        ("b", "2024-05-02T09:00:00Z", "2024-05-02T10:00:00Z"),
        ("d", "2024-05-02T12:00:00Z", "2024-05-02T13:00:00Z"),
        ("c", "2024-05-03T09:00:00Z", "2024-05-03T10:00:00Z"),
    ] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/events",
            Some(single_payload(title, start, end)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        Method::GET,
        "/v1/events?filter%5Bstarts_after%5D=2024-05-02T09:00:00Z&filter%5Bends_before%5D=2024-05-02T09:30:00%2B00:00",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["b"]);

    let (status, body) = send(
        &app,
        Method::GET,
        "/v1/events?filter%5Bstarts_after%5D=soon",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["starts_after"].is_array());
}

#[tokio::test]
async fn test_api_prefix_nests_event_routes() {
    let config =
        ApiConfig::from_lookup(|key| (key == "API_PREFIX").then(|| "/api".to_string())).unwrap();
    let app = build_app(Arc::new(InMemoryEventStore::new()), &config);

    let (status, _) = send(&app, Method::GET, "/api/v1/events", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/v1/events", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
