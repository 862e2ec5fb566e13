//! REST endpoint tests driven through the router with `tower::ServiceExt::oneshot`.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cohort_community::{Community, Identity, SqliteCohortRegistry, StaticIdentity};
use cohort_config::{CommunityConfig, DatabaseConfig};
use cohort_database::{initialize_database, CohortRepository};
use cohort_gateway::{create_router, GatewayState};
use cohort_protocol::{ChannelInfo, CohortChannelStatus, ErrorBody, ErrorCode, Membership, Message, MessagePage};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    cohort_id: i64,
}

async fn app() -> TestApp {
    let pool = initialize_database(&DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
    })
    .await
    .unwrap();

    let cohorts = CohortRepository::new(pool.clone());
    let cohort = cohorts.create("Distributed Systems").await.unwrap();
    cohorts.enroll(cohort.id, 10, Some("Ada")).await.unwrap();
    cohorts.enroll(cohort.id, 11, Some("Lin")).await.unwrap();

    let identity = StaticIdentity::new()
        .with_token("admin-token", Identity::admin(1))
        .with_token("ada-token", Identity::participant(10))
        .with_token("lin-token", Identity::participant(11))
        .with_token("stranger-token", Identity::participant(99));
    let community = Community::new(pool.clone(), Arc::new(SqliteCohortRegistry::new(pool)), CommunityConfig::default());
    let state = GatewayState::new(Arc::new(community), Arc::new(identity), 16);

    TestApp { router: create_router(state), cohort_id: cohort.id }
}

async fn call(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = app().await;
    let (status, body) = call(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = json(&body);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "cohort-community");
    assert!(health["checked_at"].as_str().is_some_and(|at| !at.is_empty()));
}

#[tokio::test]
async fn test_missing_or_unknown_token() {
    let app = app().await;

    let (status, body) = call(&app.router, Method::GET, "/api/cohorts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json::<ErrorBody>(&body).error, ErrorCode::Unauthenticated);

    let (status, _) = call(&app.router, Method::GET, "/api/cohorts", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_channel_not_set_up_is_distinct() {
    let app = app().await;
    let key = format!("/api/channels/cohort-{}", app.cohort_id);

    let (status, body) = call(&app.router, Method::GET, &key, Some("ada-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorBody = json(&body);
    assert_eq!(error.error, ErrorCode::ChannelNotFound);
    assert!(error.setup_required);
}

#[tokio::test]
async fn test_channel_lifecycle_over_rest() {
    let app = app().await;
    let create = format!("/api/cohorts/{}/channel", app.cohort_id);

    let (status, _) = call(&app.router, Method::POST, &create, Some("ada-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app.router, Method::POST, &create, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let info: ChannelInfo = json(&body);
    assert_eq!(info.members.len(), 3);

    let (status, body) = call(&app.router, Method::POST, &create, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json::<ErrorBody>(&body).error, ErrorCode::ChannelExists);

    let (status, body) = call(&app.router, Method::GET, "/api/cohorts", Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<CohortChannelStatus> = json(&body);
    assert!(statuses[0].has_channel);

    let messages = format!("/api/channels/{}/messages", info.key);
    let (status, body) = call(
        &app.router,
        Method::POST,
        &messages,
        Some("ada-token"),
        Some(serde_json::json!({ "text": "hello cohort" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json::<Message>(&body).seq, 1);

    let (status, _) = call(&app.router, Method::POST, &messages, Some("ada-token"), Some(serde_json::json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app.router, Method::POST, &messages, Some("stranger-token"), Some(serde_json::json!({ "text": "hi" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app.router, Method::GET, &format!("{messages}?limit=500&offset=-1"), Some("lin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    let page: MessagePage = json(&body);
    assert_eq!((page.limit, page.offset), (200, 0));
    assert_eq!(page.messages.len(), 1);

    let (status, _) = call(&app.router, Method::GET, &messages, Some("stranger-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_moderation_over_rest() {
    let app = app().await;
    let (_, body) = call(&app.router, Method::POST, &format!("/api/cohorts/{}/channel", app.cohort_id), Some("admin-token"), None).await;
    let key = json::<ChannelInfo>(&body).key;
    let member = format!("/api/channels/{key}/members/10");

    let (status, _) = call(&app.router, Method::POST, &format!("{member}/mute"), Some("lin-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app.router, Method::POST, &format!("{member}/mute"), Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!json::<Membership>(&body).can_send);

    let (status, body) = call(
        &app.router,
        Method::POST,
        &format!("/api/channels/{key}/messages"),
        Some("ada-token"),
        Some(serde_json::json!({ "text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json::<ErrorBody>(&body).error, ErrorCode::Muted);

    let (status, body) = call(&app.router, Method::POST, &format!("{member}/unmute"), Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<Membership>(&body).can_send);

    let (status, _) = call(&app.router, Method::DELETE, &member, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app.router, Method::DELETE, &member, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json::<ErrorBody>(&body).error, ErrorCode::NotMember);
}
