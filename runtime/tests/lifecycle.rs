//! Life-cycle event sequences and ordering guarantees.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use interpose_core::{CapturedRequest, EventName, Handler, Method, RequestId, ResolverError, Response, StatusCode};
use interpose_runtime::{MockServer, Settlement};
use interpose_testing::assertions::{
    MOCKED, PASSTHROUGH, RESOLVER_ERROR, UNHANDLED, assert_lifecycle_invariants, assert_sequence,
};
use interpose_testing::{EventRecorder, FakeNetwork, SequentialIdGenerator, init_tracing};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn request(method: Method, url: &str) -> CapturedRequest {
    CapturedRequest::builder(method, url).build().unwrap()
}

fn server(handlers: Vec<Handler>) -> MockServer {
    MockServer::builder()
        .handlers(handlers)
        .id_generator(SequentialIdGenerator::new())
        .build()
}

fn routes() -> Vec<Handler> {
    vec![
        Handler::get("/mocked", |_| async {
            Ok(Some(Response::text(StatusCode::OK, "mocked")))
        })
        .unwrap(),
        Handler::get("/passthrough", |_| async { Ok(None) }).unwrap(),
        Handler::get("/broken", |_| async { Err(ResolverError::new("fixture missing")) }).unwrap(),
    ]
}

#[tokio::test]
async fn mocked_request_never_touches_network() {
    init_tracing();
    let server = server(routes());
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    let settlement = server
        .handle(request(Method::GET, "http://app.test/mocked"), network.proceed())
        .await
        .unwrap();

    assert_eq!(settlement, Settlement::Mocked(Response::text(StatusCode::OK, "mocked")));
    assert_sequence(&recorder.names(), &MOCKED);
    assert_eq!(network.calls(), 0);

    let events = recorder.events();
    assert_eq!(events[3].response().unwrap().text_body(), Some("mocked"));
}

#[tokio::test]
async fn explicit_pass_through_reaches_network() {
    init_tracing();
    let server = server(routes());
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    let settlement = server
        .handle(request(Method::GET, "http://app.test/passthrough"), network.proceed())
        .await
        .unwrap();

    assert!(!settlement.is_mocked());
    assert_eq!(settlement.response().text_body(), Some("real"));
    assert_sequence(&recorder.names(), &PASSTHROUGH);
    assert_eq!(network.calls(), 1);

    let bypass = recorder.events().pop().unwrap();
    assert_eq!(bypass.response().unwrap().text_body(), Some("real"));
}

#[tokio::test]
async fn unmatched_request_is_reported_then_bypassed() {
    init_tracing();
    let server = server(routes());
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    server
        .handle(request(Method::POST, "http://app.test/mocked"), network.proceed())
        .await
        .unwrap();

    assert_sequence(&recorder.names(), &UNHANDLED);
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn resolver_error_is_reported_with_request_id() {
    init_tracing();
    let server = server(routes());
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    let settlement = server
        .handle(request(Method::GET, "http://app.test/broken"), network.proceed())
        .await
        .unwrap();

    assert!(matches!(settlement, Settlement::Network(_)));
    assert_sequence(&recorder.names(), &RESOLVER_ERROR);

    let events = recorder.events();
    let start_id = events[0].request_id();
    assert_eq!(events[1].request_id(), start_id);
    let error = events[1].error().unwrap();
    assert_eq!(error.message(), "fixture missing");
    assert!(!error.is_panic());
    assert_eq!(events[1].request().unwrap().path(), "/broken");
}

#[tokio::test]
async fn panicking_resolver_is_contained() {
    init_tracing();
    let server = server(vec![
        Handler::any("*", |request: CapturedRequest| async move {
            if request.path() == "/anything" {
                panic!("resolver blew up");
            }
            Ok(None)
        })
        .unwrap(),
    ]);
    let recorder = EventRecorder::attach(server.events());
    let network = FakeNetwork::new();
    server.listen();

    let settlement = server
        .handle(request(Method::GET, "http://app.test/anything"), network.proceed())
        .await
        .unwrap();

    assert!(!settlement.is_mocked());
    assert_sequence(&recorder.names(), &RESOLVER_ERROR);
    let error = recorder.events()[1].error().cloned().unwrap();
    assert!(error.is_panic());
    assert_eq!(error.message(), "resolver blew up");
    assert_eq!(server.stats().exceptions, 1);
}

#[tokio::test]
async fn request_id_is_shared_within_and_distinct_across_requests() {
    init_tracing();
    let server = MockServer::new(routes());
    let recorder = EventRecorder::attach(server.events());
    server.listen();

    for path in ["/mocked", "/passthrough", "/broken", "/missing"] {
        server
            .handle(
                request(Method::GET, &format!("http://app.test{path}")),
                FakeNetwork::new().proceed(),
            )
            .await
            .unwrap();
    }

    let ids = recorder.request_ids();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);

    assert_sequence(&recorder.names_for(&ids[0]), &MOCKED);
    assert_sequence(&recorder.names_for(&ids[1]), &PASSTHROUGH);
    assert_sequence(&recorder.names_for(&ids[2]), &RESOLVER_ERROR);
    assert_sequence(&recorder.names_for(&ids[3]), &UNHANDLED);
}

#[tokio::test]
async fn externally_supplied_ids_are_used_verbatim() {
    let server = server(routes());
    let recorder = EventRecorder::attach(server.events());
    server.listen();

    let id = RequestId::from("capture-layer-7");
    server
        .handle_with_id(
            request(Method::GET, "http://app.test/mocked"),
            id.clone(),
            FakeNetwork::new().proceed(),
        )
        .await
        .unwrap();

    assert_eq!(recorder.request_ids(), [id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_per_request_ordering() {
    init_tracing();
    let server = MockServer::new(vec![
        Handler::get("/slow", |_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(Some(Response::ok()))
        })
        .unwrap(),
        Handler::get("/decline", |_| async { Ok(None) }).unwrap(),
        Handler::get("/fail", |_| async { Err(ResolverError::new("x")) }).unwrap(),
    ]);
    let recorder = EventRecorder::attach(server.events());
    server.listen();

    let paths = ["/slow", "/decline", "/fail", "/unknown"];
    let mut tasks = Vec::new();
    for i in 0..40 {
        let server = server.clone();
        let url = format!("http://app.test{}", paths[i % paths.len()]);
        tasks.push(tokio::spawn(async move {
            let network = FakeNetwork::new().with_latency(Duration::from_millis(1));
            server.handle(request(Method::GET, &url), network.proceed()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let events = recorder.events();
    assert_lifecycle_invariants(&events);
    assert_eq!(recorder.request_ids().len(), 40);

    let stats = server.stats();
    assert_eq!(stats.requests, 40);
    assert_eq!(stats.mocked, 10);
    assert_eq!(stats.unhandled, 10);
    assert_eq!(stats.exceptions, 10);
    assert_eq!(stats.bypassed, 30);
}

#[tokio::test]
async fn listeners_complete_before_the_request_settles() {
    let server = server(routes());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    server.events().on(EventName::ResponseMocked, move |event| {
        let sink = Arc::clone(&sink);
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sink.lock().unwrap().push(event.request_id().clone());
        }
    });
    server.listen();

    server
        .handle(request(Method::GET, "http://app.test/mocked"), FakeNetwork::new().proceed())
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), [RequestId::from("req-1")]);
}

#[tokio::test]
async fn listeners_only_receive_their_event_name() {
    let server = server(routes());
    let ends = Arc::new(Mutex::new(0usize));

    let counter = Arc::clone(&ends);
    let subscription = server.events().on(EventName::RequestEnd, move |event| {
        let counter = Arc::clone(&counter);
        async move {
            assert_eq!(event.name(), EventName::RequestEnd);
            *counter.lock().unwrap() += 1;
        }
    });
    server.listen();

    for path in ["/mocked", "/passthrough"] {
        server
            .handle(
                request(Method::GET, &format!("http://app.test{path}")),
                FakeNetwork::new().proceed(),
            )
            .await
            .unwrap();
    }
    assert_eq!(*ends.lock().unwrap(), 2);

    assert!(subscription.unsubscribe());
    server
        .handle(request(Method::GET, "http://app.test/mocked"), FakeNetwork::new().proceed())
        .await
        .unwrap();
    assert_eq!(*ends.lock().unwrap(), 2);
}
