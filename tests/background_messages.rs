mod support;

use delocalise_lib::shared::error::UNKNOWN_MESSAGE;
use delocalise_lib::test_support::{FakeReply, FakeTransport};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn authorize_then_fetch_original_title() {
    let transport = Arc::new(FakeTransport::new(|video_id, bearer| match (video_id, bearer) {
        ("abc123", Some("fresh-token")) => FakeReply::status(
            200,
            r#"{"items":[{"snippet":{"title":"Original Title"}}]}"#,
        ),
        (_, None) => FakeReply::status(401, "{}"),
        _ => FakeReply::status(404, "{}"),
    }));
    let (handle, _state, surface) = support::spawn_background(Arc::clone(&transport)).await;

    assert_eq!(
        handle.send(json!("isAuthorized")).await.expect("isAuthorized"),
        Value::Bool(false)
    );
    assert_eq!(
        handle.send(json!("authorize")).await.expect("authorize"),
        Value::Null
    );
    assert_eq!(
        handle.send(json!("isAuthorized")).await.expect("isAuthorized"),
        Value::Bool(true)
    );

    let reply = handle
        .send(json!({"videoId": "abc123"}))
        .await
        .expect("title");
    assert_eq!(reply, Value::String("Original Title".to_string()));

    // Second request is served from the cache.
    let again = handle.original_title("abc123").await.expect("cached");
    assert_eq!(again, "Original Title");
    assert_eq!(transport.calls(), 1);
    assert_eq!(surface.launched().len(), 1);
    assert!(surface.launched()[0].interactive);
}

#[tokio::test]
async fn unauthorized_fetch_reauthorizes_once() {
    let transport = Arc::new(FakeTransport::new(|_, bearer| match bearer {
        Some("fresh-token") => FakeReply::status(
            200,
            r#"{"items":[{"snippet":{"title":"Canonical"}}]}"#,
        ),
        _ => FakeReply::status(401, "{}"),
    }));
    let (handle, _state, surface) = support::spawn_background(Arc::clone(&transport)).await;

    let title = handle.original_title("vid1").await.expect("title");
    assert_eq!(title, "Canonical");
    assert_eq!(transport.calls(), 2);
    assert_eq!(
        transport.bearers(),
        vec![None, Some("fresh-token".to_string())]
    );
    assert_eq!(surface.launched().len(), 1);
}

#[tokio::test]
async fn unknown_message_is_rejected() {
    let transport = Arc::new(FakeTransport::with_titles(&[]));
    let (handle, _state, _surface) = support::spawn_background(transport).await;

    let err = handle.send(json!({"foo": 1})).await.expect_err("unknown");
    assert_eq!(err.code(), UNKNOWN_MESSAGE);
}
