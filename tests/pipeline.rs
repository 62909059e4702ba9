use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use fetchkit::{
    create, header::HeaderMap, header::HeaderValue, Call, ClientConfig, FetchError, Method,
    RequestConfig, RequestOptions, Response, StatusCode, Transport,
};
use serde_json::{json, Value};

enum Scripted {
    Respond(Response),
    Fail(&'static str),
    Hang,
}

fn ok_json(body: Value) -> Scripted {
    Scripted::Respond(Response::new(
        StatusCode::OK,
        HeaderMap::new(),
        body.to_string(),
    ))
}

fn status_json(status: StatusCode, body: Value) -> Scripted {
    Scripted::Respond(Response::new(status, HeaderMap::new(), body.to_string()))
}

/// Scripted transport: pops one outcome per send and records every
/// request it was handed.
#[derive(Clone, Default)]
struct MockTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<RequestOptions>>>,
}

impl MockTransport {
    fn scripted(outcomes: Vec<Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<RequestOptions> {
        self.seen.lock().expect("seen mutex must not be poisoned").clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestOptions) -> fetchkit::Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen mutex must not be poisoned")
            .push(request.clone());

        let next = self
            .script
            .lock()
            .expect("script mutex must not be poisoned")
            .pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(FetchError::transport(message)),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(FetchError::transport("hang elapsed"))
            }
            None => Err(FetchError::transport("mock script exhausted")),
        }
    }
}

#[tokio::test]
async fn transport_failures_are_retried_up_to_the_budget() {
    let transport = MockTransport::scripted(vec![
        Scripted::Fail("reset"),
        Scripted::Fail("reset"),
        Scripted::Fail("reset"),
        Scripted::Fail("reset"),
    ]);
    let client = create(transport.clone(), ClientConfig::default().retry_count(3));

    let err = client
        .get("https://api.example.com/x", None)
        .await
        .expect_err("all attempts fail");

    assert!(matches!(err, FetchError::Transport(_)));
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn call_succeeds_after_transient_transport_failures() {
    let transport = MockTransport::scripted(vec![
        Scripted::Fail("reset"),
        Scripted::Fail("reset"),
        ok_json(json!({"ok": true})),
    ]);
    let client = create(transport.clone(), ClientConfig::default().retry_count(2));

    let value = client
        .call(Call::new(Method::GET, "https://api.example.com/y"))
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn timeout_cancels_the_call_and_is_never_retried() {
    let transport = MockTransport::scripted(vec![Scripted::Hang]);
    let client = create(
        transport.clone(),
        ClientConfig::default().timeout_ms(30).retry_count(5),
    );

    let err = client
        .get("https://api.example.com/slow", None)
        .await
        .expect_err("must time out");

    assert!(matches!(err, FetchError::Timeout));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn request_interceptors_run_once_per_logical_call() {
    let request_runs = Arc::new(AtomicUsize::new(0));
    let response_runs = Arc::new(AtomicUsize::new(0));

    let transport = MockTransport::scripted(vec![
        Scripted::Fail("reset"),
        Scripted::Fail("reset"),
        ok_json(json!(1)),
    ]);
    let config = {
        let request_runs = Arc::clone(&request_runs);
        let response_runs = Arc::clone(&response_runs);
        ClientConfig::default()
            .retry_count(2)
            .request_interceptor(move |_| {
                request_runs.fetch_add(1, Ordering::SeqCst);
                None
            })
            .response_interceptor(move |_| {
                response_runs.fetch_add(1, Ordering::SeqCst);
                None
            })
    };
    let client = create(transport.clone(), config);

    client
        .get("https://api.example.com/x", None)
        .await
        .expect("succeeds after retries");

    assert_eq!(transport.calls(), 3);
    assert_eq!(request_runs.load(Ordering::SeqCst), 1);
    // Only the final attempt produced a response.
    assert_eq!(response_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn void_interceptor_preserves_prior_replacement() {
    let transport = MockTransport::scripted(vec![ok_json(json!(null))]);
    let config = ClientConfig::default()
        .request_interceptor(|options| {
            let mut replaced = options.clone();
            replaced
                .headers
                .insert("x-step", HeaderValue::from_static("one"));
            Some(replaced)
        })
        .request_interceptor(|_| None);
    let client = create(transport.clone(), config);

    client
        .get("https://api.example.com/x", None)
        .await
        .expect("call succeeds");

    let seen = transport.seen();
    assert_eq!(
        seen[0].headers.get("x-step"),
        Some(&HeaderValue::from_static("one"))
    );
}

#[tokio::test]
async fn relative_urls_are_joined_with_the_base_url() {
    let transport = MockTransport::scripted(vec![ok_json(json!(null)), ok_json(json!(null))]);
    let client = create(
        transport.clone(),
        ClientConfig::default().base_url("https://api.example.com"),
    );

    client.get("/y", None).await.expect("relative call");
    client
        .get("https://other.example.com/z", None)
        .await
        .expect("absolute call");

    let seen = transport.seen();
    assert_eq!(seen[0].url, "https://api.example.com/y");
    assert_eq!(seen[1].url, "https://other.example.com/z");
}

#[tokio::test]
async fn invalid_final_url_never_reaches_the_transport() {
    let transport = MockTransport::scripted(vec![ok_json(json!(null))]);
    let client = create(transport.clone(), ClientConfig::default());

    let err = client
        .get("/no-base-url", None)
        .await
        .expect_err("relative url without base must fail");

    assert!(matches!(err, FetchError::RequestBuild(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn build_errors_short_circuit_to_the_request_error_hook() {
    let transport = MockTransport::scripted(vec![ok_json(json!(null))]);
    let config = ClientConfig::default()
        .on_request(|_| Err(FetchError::RequestBuild("no credentials".to_owned())))
        .on_request_error(|err| {
            assert!(matches!(err, FetchError::RequestBuild(_)));
            Ok(json!("recovered"))
        });
    let client = create(transport.clone(), config);

    let value = client
        .get("https://api.example.com/x", None)
        .await
        .expect("request error hook recovers");

    assert_eq!(value, json!("recovered"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn response_error_hook_can_recover_after_exhausted_retries() {
    let transport = MockTransport::scripted(vec![Scripted::Fail("reset")]);
    let config = ClientConfig::default()
        .retry_count(0)
        .on_response_error(|_| Ok(json!({"fallback": true})));
    let client = create(transport.clone(), config);

    let value = client
        .get("https://api.example.com/x", None)
        .await
        .expect("fallback value");

    assert_eq!(value, json!({"fallback": true}));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn response_interceptor_replacement_feeds_the_handler() {
    let transport = MockTransport::scripted(vec![ok_json(json!({"original": true}))]);
    let config = ClientConfig::default().response_interceptor(|response| {
        Some(Response::new(
            response.status,
            response.headers.clone(),
            json!({"replaced": true}).to_string(),
        ))
    });
    let client = create(transport.clone(), config);

    let value = client
        .get("https://api.example.com/x", None)
        .await
        .expect("call succeeds");

    assert_eq!(value, json!({"replaced": true}));
}

#[tokio::test]
async fn forbidden_status_is_classified_and_not_retried() {
    let transport = MockTransport::scripted(vec![status_json(
        StatusCode::FORBIDDEN,
        json!({"error": "denied"}),
    )]);
    let client = create(transport.clone(), ClientConfig::default().retry_count(3));

    let err = client
        .get("https://api.example.com/x", None)
        .await
        .expect_err("must be classified");

    assert_eq!(err.status(), Some(403));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn per_call_retry_override_beats_the_configuration() {
    let transport = MockTransport::scripted(vec![Scripted::Fail("reset")]);
    let client = create(transport.clone(), ClientConfig::default().retry_count(5));

    let err = client
        .call(Call::new(Method::GET, "https://api.example.com/x").retry_count(0))
        .await
        .expect_err("no retries allowed for this call");

    assert!(matches!(err, FetchError::Transport(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn a_request_config_snapshot_seeds_a_client() {
    let mut config = RequestConfig::new();
    config.set_retry_count(1);
    config.add_request_interceptor(|options| {
        let mut replaced = options.clone();
        replaced
            .headers
            .insert("x-from-config", HeaderValue::from_static("yes"));
        Some(replaced)
    });

    let transport =
        MockTransport::scripted(vec![Scripted::Fail("reset"), ok_json(json!({"ok": true}))]);
    let client = create(transport.clone(), ClientConfig::from(config.get_config()));

    let value = client
        .get("https://api.example.com/x", None)
        .await
        .expect("retried once then succeeded");

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(transport.calls(), 2);
    assert_eq!(
        transport.seen()[0].headers.get("x-from-config"),
        Some(&HeaderValue::from_static("yes"))
    );
}

#[tokio::test]
async fn interceptors_registered_on_a_live_client_apply_to_later_calls() {
    let transport = MockTransport::scripted(vec![ok_json(json!(null)), ok_json(json!(null))]);
    let client = create(transport.clone(), ClientConfig::default());

    client
        .get("https://api.example.com/before", None)
        .await
        .expect("first call");

    let id = client.add_request_interceptor(|options| {
        let mut replaced = options.clone();
        replaced
            .headers
            .insert("x-added-later", HeaderValue::from_static("yes"));
        Some(replaced)
    });

    client
        .get("https://api.example.com/after", None)
        .await
        .expect("second call");

    let seen = transport.seen();
    assert!(seen[0].headers.get("x-added-later").is_none());
    assert_eq!(
        seen[1].headers.get("x-added-later"),
        Some(&HeaderValue::from_static("yes"))
    );
    assert!(client.remove_request_interceptor(id));
}
