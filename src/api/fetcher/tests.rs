use super::*;
use crate::test_support::{auth_manager_with, FakeReply, FakeSurface, FakeTransport, FakeVerifier};
use std::time::Duration;

const FOO_BODY: &str = r#"{"items":[{"snippet":{"title":"Foo"}}]}"#;

fn stale_or_fresh(bearer: Option<&str>) -> FakeReply {
    match bearer {
        Some("fresh-token") => FakeReply::status(200, FOO_BODY),
        _ => FakeReply::status(401, "{}"),
    }
}

fn setup(
    surface: FakeSurface,
    transport: FakeTransport,
) -> (Arc<FakeSurface>, Arc<FakeTransport>, Arc<AuthManager>, CredentialedFetcher) {
    let surface = Arc::new(surface);
    let transport = Arc::new(transport);
    let auth = Arc::new(auth_manager_with(
        Arc::clone(&surface),
        Arc::new(FakeVerifier::accepting()),
    ));
    auth.tokens().set("stale-token", 3600);
    let fetcher = CredentialedFetcher::new(Arc::clone(&auth), Arc::clone(&transport) as Arc<dyn ResourceTransport>);
    (surface, transport, auth, fetcher)
}

#[tokio::test]
async fn unauthorized_then_retry_with_fresh_token_succeeds() {
    let (surface, transport, auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600),
        FakeTransport::new(|_, bearer| stale_or_fresh(bearer)),
    );

    let title = fetcher.fetch_resource("xyz").await.expect("title");
    assert_eq!(title, "Foo");

    let launched = surface.launched();
    assert_eq!(launched.len(), 1);
    assert!(!launched[0].interactive, "re-authorization must be silent");
    assert_eq!(
        transport.bearers(),
        vec![Some("stale-token".to_string()), Some("fresh-token".to_string())]
    );
    assert!(auth.is_authorized());
}

#[tokio::test]
async fn concurrent_unauthorized_fetches_share_one_handshake() {
    let (surface, _transport, _auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600).with_delay(Duration::from_millis(50)),
        FakeTransport::new(|_, bearer| stale_or_fresh(bearer)),
    );
    let fetcher = Arc::new(fetcher);

    let a = {
        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move { fetcher.fetch_resource("a").await })
    };
    let b = {
        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move { fetcher.fetch_resource("b").await })
    };

    assert_eq!(a.await.expect("join").expect("a"), "Foo");
    assert_eq!(b.await.expect("join").expect("b"), "Foo");
    assert_eq!(surface.launched().len(), 1);
}

#[tokio::test]
async fn request_cancelled_by_new_round_is_retried() {
    let (surface, transport, auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600),
        FakeTransport::new(|_, bearer| match bearer {
            Some("fresh-token") => FakeReply::status(200, FOO_BODY),
            _ => FakeReply::HangUntilCancelled,
        }),
    );

    let pending = tokio::spawn(async move { fetcher.fetch_resource("xyz").await });
    tokio::time::timeout(Duration::from_secs(1), async {
        while transport.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first request in flight");

    auth.authorize(false).await.expect("authorize");

    let title = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("fetch finished")
        .expect("join")
        .expect("cancellation must not surface");
    assert_eq!(title, "Foo");
    assert_eq!(transport.calls(), 2);
    assert_eq!(surface.launched().len(), 1);
}

#[tokio::test]
async fn round_started_as_previous_one_ends_is_waited_for() {
    let (surface, transport, auth, fetcher) = setup(
        FakeSurface::granting("unused", 3600),
        FakeTransport::new(|_, bearer| stale_or_fresh(bearer)),
    );
    let coordinator = Arc::clone(auth.coordinator());

    let first = coordinator.begin_authorization().expect("first round");
    let pending = tokio::spawn(async move { fetcher.fetch_resource("xyz").await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The waiter is released by the first round ending, but the gate is already busy again.
    drop(first);
    let second = coordinator.begin_authorization().expect("second round");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.calls(), 0, "no request may go out while a round is running");

    auth.tokens().set("fresh-token", 3600);
    drop(second);

    let title = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("fetch finished")
        .expect("join")
        .expect("title");
    assert_eq!(title, "Foo");
    assert_eq!(transport.bearers(), vec![Some("fresh-token".to_string())]);
    assert!(surface.launched().is_empty());
}

#[tokio::test]
async fn network_failure_is_not_retried() {
    let (surface, transport, _auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600),
        FakeTransport::new(|_, _| FakeReply::Network("connection reset".to_string())),
    );

    let err = fetcher.fetch_resource("xyz").await.expect_err("network");
    assert_eq!(err.code(), TRANSPORT_ERROR);
    assert_eq!(transport.calls(), 1);
    assert!(surface.launched().is_empty());
}

#[tokio::test]
async fn unexpected_status_is_terminal() {
    let (_surface, transport, _auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600),
        FakeTransport::new(|_, _| FakeReply::status(403, r#"{"error":"quotaExceeded"}"#)),
    );

    let err = fetcher.fetch_resource("xyz").await.expect_err("403");
    assert_eq!(err.code(), UNEXPECTED_RESPONSE);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn unauthorized_on_final_attempt_is_explicit_error() {
    let (surface, transport, _auth, fetcher) = setup(
        FakeSurface::granting("fresh-token", 3600),
        FakeTransport::new(|_, _| FakeReply::status(401, "{}")),
    );

    let err = fetcher.fetch_resource("xyz").await.expect_err("401 twice");
    assert_eq!(err.code(), UNEXPECTED_RESPONSE);
    assert_eq!(transport.calls(), MAX_FETCH_ATTEMPTS as usize);
    assert_eq!(surface.launched().len(), 1);
}

#[tokio::test]
async fn authorization_failure_propagates_to_fetch() {
    let surface = Arc::new(FakeSurface::granting("fresh-token", 3600));
    let transport = Arc::new(FakeTransport::new(|_, bearer| stale_or_fresh(bearer)));
    let auth = Arc::new(auth_manager_with(
        Arc::clone(&surface),
        Arc::new(FakeVerifier::rejecting()),
    ));
    let fetcher = CredentialedFetcher::new(Arc::clone(&auth), Arc::clone(&transport) as Arc<dyn ResourceTransport>);

    let err = fetcher.fetch_resource("xyz").await.expect_err("auth failed");
    assert_eq!(err.code(), crate::shared::error::MALFORMED_RESPONSE);
    assert_eq!(transport.calls(), 1);
    assert!(auth.bearer().is_none());
}
