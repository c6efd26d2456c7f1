// Executor behavior against a real HTTP server
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use newsdesk::crawl_engine::{
    CircuitBreaker, CircuitState, FailureReason, FetchedContent, Fetcher, HttpFetcher, RateLimiter,
    RequestOutcome, RequestSignature, ResilientRequestExecutor, ResponseCache, RetryPolicy,
};

fn executor(policy: RetryPolicy, reset: Duration) -> ResilientRequestExecutor<FetchedContent> {
    ResilientRequestExecutor::new(
        Arc::new(RateLimiter::new(0)),
        Arc::new(CircuitBreaker::new(5, reset)),
        Arc::new(ResponseCache::new(64, Duration::from_secs(3600))),
        policy,
    )
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new("newsdesk-test", Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn test_server_error_then_success_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let broken = server
        .mock("GET", "/flaky")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let healthy = server
        .mock("GET", "/healthy")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("ok")
        .expect(1)
        .create_async()
        .await;

    let exec = executor(RetryPolicy::immediate(3), Duration::from_secs(60));
    let http = fetcher();
    let first_url = format!("{}/flaky", server.url());
    let second_url = format!("{}/healthy", server.url());
    let attempt = AtomicU32::new(0);
    let signature = RequestSignature::new("fetch", "GET", &first_url);

    // First attempt hits the failing endpoint, later ones the healthy one
    let outcome = exec
        .execute("fetch", &signature, || {
            let url = if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                first_url.as_str()
            } else {
                second_url.as_str()
            };
            http.fetch(url)
        })
        .await;

    match outcome {
        RequestOutcome::Success {
            value,
            from_cache,
            attempts,
        } => {
            assert_eq!(attempts, 2);
            assert!(!from_cache);
            assert_eq!(value.body, b"ok");
        }
        RequestOutcome::Failure { reason, .. } => panic!("expected success, got {reason}"),
    }
    broken.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/down")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let exec = executor(RetryPolicy::immediate(3), Duration::from_secs(60));
    let http = fetcher();
    let url = format!("{}/down", server.url());
    let outcome = exec
        .execute("fetch", &RequestSignature::new("fetch", "GET", &url), || {
            http.fetch(&url)
        })
        .await;

    assert!(matches!(
        outcome,
        RequestOutcome::Failure {
            reason: FailureReason::RetriesExhausted { attempts: 3, .. },
            attempts: 3
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_fails_fast() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let exec = executor(RetryPolicy::immediate(3), Duration::from_secs(60));
    let http = fetcher();
    let url = format!("{}/missing", server.url());
    let outcome = exec
        .execute("fetch", &RequestSignature::new("fetch", "GET", &url), || {
            http.fetch(&url)
        })
        .await;

    assert!(matches!(
        outcome,
        RequestOutcome::Failure {
            reason: FailureReason::ClientError { status: 404, .. },
            attempts: 1
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_open_circuit_blocks_calls_then_admits_one_trial() {
    let mut server = mockito::Server::new_async().await;
    // 5 failures open the circuit, the 6th call is rejected locally and the
    // trial after the cooldown is the only further hit
    let mock = server
        .mock("GET", "/unstable")
        .with_status(502)
        .expect(6)
        .create_async()
        .await;

    let exec = executor(RetryPolicy::immediate(1), Duration::from_millis(200));
    let http = fetcher();
    let url = format!("{}/unstable", server.url());
    let signature = RequestSignature::new("fetch", "GET", &url);

    for _ in 0..5 {
        let outcome = exec.execute("fetch", &signature, || http.fetch(&url)).await;
        assert!(!outcome.is_success());
    }
    assert_eq!(exec.circuit_breaker().state("fetch"), CircuitState::Open);

    let rejected = exec.execute("fetch", &signature, || http.fetch(&url)).await;
    assert!(matches!(
        rejected,
        RequestOutcome::Failure {
            reason: FailureReason::ServiceUnavailable { .. },
            attempts: 0
        }
    ));

    tokio::time::sleep(Duration::from_millis(300)).await;

    let trial = exec.execute("fetch", &signature, || http.fetch(&url)).await;
    assert_eq!(trial.attempts(), 1);

    let after_trial = exec.execute("fetch", &signature, || http.fetch(&url)).await;
    assert_eq!(after_trial.attempts(), 0, "failed trial re-opens the circuit");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_successful_fetch_is_served_from_cache() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/page")
        .with_status(200)
        .with_body("cached body")
        .expect(1)
        .create_async()
        .await;

    let exec = executor(RetryPolicy::immediate(3), Duration::from_secs(60));
    let http = fetcher();
    let url = format!("{}/page", server.url());
    let signature = RequestSignature::new("fetch", "GET", &url);

    let first = exec.execute("fetch", &signature, || http.fetch(&url)).await;
    let second = exec.execute("fetch", &signature, || http.fetch(&url)).await;

    assert!(matches!(first, RequestOutcome::Success { from_cache: false, .. }));
    assert!(matches!(second, RequestOutcome::Success { from_cache: true, attempts: 0, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dropped_connections_are_retried() {
    // Accept every connection and close it before any response is written
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&accepted);
    let server = tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let exec = executor(RetryPolicy::immediate(3), Duration::from_secs(60));
    let http = fetcher();
    let url = format!("http://{addr}/story");
    let outcome = exec
        .execute("fetch", &RequestSignature::new("fetch", "GET", &url), || {
            http.fetch(&url)
        })
        .await;

    assert!(
        matches!(
            outcome,
            RequestOutcome::Failure {
                reason: FailureReason::RetriesExhausted { attempts: 3, .. },
                attempts: 3
            }
        ),
        "unexpected outcome: {outcome:?}"
    );
    assert!(accepted.load(Ordering::SeqCst) >= 3);
    server.abort();
}
