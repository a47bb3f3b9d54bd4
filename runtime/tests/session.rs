//! listen()/close() semantics, including close() racing in-flight requests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use interpose_core::{CapturedRequest, EventName, Handler, Method, Proceed, Response, StatusCode};
use interpose_runtime::{MockServer, SessionStats, Settlement};
use interpose_testing::assertions::{MOCKED, assert_sequence};
use interpose_testing::{EventRecorder, FakeNetwork, SequentialIdGenerator, init_tracing};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

fn get(url: &str) -> CapturedRequest {
    CapturedRequest::builder(Method::GET, url).build().unwrap()
}

fn mocked() -> Handler {
    Handler::any("*", |_| async { Ok(Some(Response::text(StatusCode::OK, "mocked"))) }).unwrap()
}

#[tokio::test]
async fn closed_server_emits_nothing_and_forwards() {
    init_tracing();
    let server = MockServer::new([mocked()]);
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();

    server.listen();
    server.close();

    let settlement = server.handle(get("http://svc.test/a"), network.proceed()).await.unwrap();

    assert_eq!(settlement, Settlement::Network(Response::text(StatusCode::OK, "real")));
    assert!(recorder.is_empty());
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn listen_again_resumes_interception() {
    let server = MockServer::builder()
        .handler(mocked())
        .id_generator(SequentialIdGenerator::new())
        .build();
    let recorder = EventRecorder::attach(server.events());

    server.listen();
    server.close();
    server.handle(get("http://svc.test/a"), FakeNetwork::new().proceed()).await.unwrap();
    assert!(recorder.is_empty());

    server.listen();
    let settlement = server.handle(get("http://svc.test/a"), FakeNetwork::new().proceed()).await.unwrap();
    assert!(settlement.is_mocked());
    assert_sequence(&recorder.names(), &MOCKED);
}

#[tokio::test]
async fn close_during_resolution_abandons_request_silently() {
    init_tracing();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (entered_tx, release_rx) = (Arc::clone(&entered), Arc::clone(&release));
    let server = MockServer::new([Handler::any("*", move |_| {
        let entered = Arc::clone(&entered_tx);
        let release = Arc::clone(&release_rx);
        async move {
            entered.notify_one();
            release.notified().await;
            Ok(Some(Response::text(StatusCode::OK, "too late")))
        }
    })
    .unwrap()]);
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    let in_flight = {
        let server = server.clone();
        let proceed = network.proceed();
        tokio::spawn(async move { server.handle(get("http://svc.test/slow"), proceed).await })
    };

    entered.notified().await;
    server.close();
    release.notify_one();

    let settlement = in_flight.await.unwrap().unwrap();

    // the resolver was not cancelled, but its answer is discarded
    assert_eq!(settlement, Settlement::Network(Response::text(StatusCode::OK, "real")));
    assert_eq!(recorder.names(), [EventName::RequestStart]);
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn reopening_does_not_revive_abandoned_requests() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (entered_tx, release_rx) = (Arc::clone(&entered), Arc::clone(&release));
    let server = MockServer::new([Handler::get("/slow", move |_| {
        let entered = Arc::clone(&entered_tx);
        let release = Arc::clone(&release_rx);
        async move {
            entered.notify_one();
            release.notified().await;
            Ok(Some(Response::ok()))
        }
    })
    .unwrap()]);
    let recorder = EventRecorder::attach(server.events());
    server.listen();

    let in_flight = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .handle(get("http://svc.test/slow"), FakeNetwork::new().proceed())
                .await
        })
    };

    entered.notified().await;
    server.close();
    server.listen();
    release.notify_one();

    let settlement = in_flight.await.unwrap().unwrap();
    assert!(!settlement.is_mocked());
    assert_eq!(recorder.names(), [EventName::RequestStart]);
    assert_eq!(server.stats(), SessionStats::default());
}

#[tokio::test]
async fn close_from_a_listener_suppresses_remaining_events() {
    let server = MockServer::new([mocked()]);
    let recorder = EventRecorder::default();

    let closer = server.clone();
    server.events().on(EventName::RequestStart, move |_| {
        let closer = closer.clone();
        async move { closer.close() }
    });
    recorder.subscribe(server.events());
    server.listen();

    let network = FakeNetwork::new();
    let settlement = server.handle(get("http://svc.test/a"), network.proceed()).await.unwrap();

    // the closing listener runs first, so the recorder never sees request:start
    assert!(recorder.is_empty());
    assert!(!settlement.is_mocked());
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn listen_resets_session_stats() {
    let server = MockServer::new([mocked()]);
    server.listen();
    server.handle(get("http://svc.test/a"), FakeNetwork::new().proceed()).await.unwrap();
    assert_eq!(server.stats().mocked, 1);

    server.close();
    assert_eq!(server.stats().mocked, 1);

    server.listen();
    assert_eq!(server.stats(), SessionStats::default());
}

#[tokio::test]
async fn one_shot_handler_survives_an_abandoned_request() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (entered_tx, release_rx) = (Arc::clone(&entered), Arc::clone(&release));
    let server = MockServer::new([Handler::get("/token", move |_| {
        let entered = Arc::clone(&entered_tx);
        let release = Arc::clone(&release_rx);
        async move {
            entered.notify_one();
            release.notified().await;
            Ok(Some(Response::text(StatusCode::OK, "fresh")))
        }
    })
    .unwrap()
    .once()]);
    server.listen();

    let in_flight = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .handle(get("http://svc.test/token"), FakeNetwork::new().proceed())
                .await
        })
    };

    entered.notified().await;
    server.close();
    release.notify_one();

    let abandoned = in_flight.await.unwrap().unwrap();
    assert!(!abandoned.is_mocked());
    assert!(!server.list_handlers()[0].is_exhausted());

    server.listen();
    let answered = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .handle(get("http://svc.test/token"), FakeNetwork::new().proceed())
                .await
        })
    };
    entered.notified().await;
    release.notify_one();

    let settlement = answered.await.unwrap().unwrap();
    assert_eq!(settlement, Settlement::Mocked(Response::text(StatusCode::OK, "fresh")));
    assert!(server.list_handlers()[0].is_exhausted());
}

#[tokio::test]
async fn close_during_network_exchange_suppresses_bypass_event() {
    init_tracing();
    let server = MockServer::new([]);
    let recorder = EventRecorder::attach(server.events());
    server.listen();

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let proceed = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        Proceed::new(move || async move {
            entered.notify_one();
            release.notified().await;
            Ok(Response::text(StatusCode::OK, "real"))
        })
    };

    let in_flight = {
        let server = server.clone();
        tokio::spawn(async move { server.handle(get("http://svc.test/slow"), proceed).await })
    };

    entered.notified().await;
    server.close();
    release.notify_one();

    let settlement = in_flight.await.unwrap().unwrap();
    assert_eq!(settlement, Settlement::Network(Response::text(StatusCode::OK, "real")));
    assert_eq!(
        recorder.names(),
        [EventName::RequestStart, EventName::RequestUnhandled, EventName::RequestEnd]
    );
    assert_eq!(server.stats().bypassed, 0);
}

#[tokio::test]
async fn resolver_never_runs_after_close_from_a_listener() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let server = MockServer::new([Handler::any("*", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(Some(Response::ok())) }
    })
    .unwrap()
    .once()]);

    let closer = server.clone();
    server.events().on(EventName::RequestStart, move |_| {
        let closer = closer.clone();
        async move { closer.close() }
    });
    server.listen();

    let settlement = server
        .handle(get("http://svc.test/a"), FakeNetwork::new().proceed())
        .await
        .unwrap();

    assert!(!settlement.is_mocked());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!server.list_handlers()[0].is_exhausted());
}
