use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn backoff_never_exceeds_max_delay_times_1_1() {
    let config = RetryConfig {
        max_retries: 10,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        multiplier: 2.0,
    };
    for attempt in 1..=20 {
        let d = calculate_backoff(&config, attempt);
        assert!(
            d.as_secs_f64() <= config.max_delay.as_secs_f64() * 1.1 + 0.001,
            "attempt {attempt} produced {d:?}, exceeds cap"
        );
    }
}

#[test]
fn backoff_is_monotonically_non_decreasing_before_the_cap() {
    let config = RetryConfig {
        max_retries: 10,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10_000),
        multiplier: 2.0,
    };
    let mut prev = 0.0;
    for attempt in 1..=8 {
        // Use the base (no-jitter) value for monotonicity, since jitter
        // only adds up to 10% noise on top of a growing base.
        let exponent = (attempt - 1) as i32;
        let base = (config.initial_delay.as_millis() as f64 * config.multiplier.powi(exponent))
            .min(config.max_delay.as_millis() as f64);
        assert!(base >= prev);
        prev = base;
    }
}

#[test]
fn retry_config_validity() {
    assert!(RetryConfig::default().is_valid());
    let bad = RetryConfig {
        max_retries: 1,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
    };
    assert!(!bad.is_valid());
}

#[tokio::test]
async fn drive_performs_exactly_n_plus_1_attempts_then_exhausts() {
    let config = RetryConfig {
        max_retries: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let cancel = CancellationToken::new();
    let calls = AtomicUsize::new(0);

    let result: Result<(), FederationError> = drive(&config, &cancel, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Outcome::Retry(FederationError::Upstream { status: 500, body: "down".into() }) }
    })
    .await;

    assert!(matches!(result, Err(FederationError::ExhaustedRetries { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), config.max_retries + 1);
}

#[tokio::test]
async fn drive_stops_immediately_on_non_retryable_outcome() {
    let config = RetryConfig::default();
    let cancel = CancellationToken::new();
    let calls = AtomicUsize::new(0);

    let result: Result<&str, FederationError> = drive(&config, &cancel, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Outcome::Done(Err(FederationError::Configuration("bad key".into()))) }
    })
    .await;

    assert!(matches!(result, Err(FederationError::Configuration(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn drive_succeeds_after_transient_failures() {
    let config = RetryConfig {
        max_retries: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let cancel = CancellationToken::new();
    let calls = AtomicUsize::new(0);

    let result = drive(&config, &cancel, |_attempt| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Outcome::Retry(FederationError::Upstream { status: 500, body: "down".into() })
            } else {
                Outcome::Done(Ok("ok"))
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn drive_respects_pre_cancelled_token() {
    let config = RetryConfig::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result: Result<(), FederationError> =
        drive(&config, &cancel, |_attempt| async { Outcome::Done(Ok(())) }).await;

    assert!(matches!(result, Err(FederationError::Cancelled)));
}

#[tokio::test]
async fn drive_aborts_an_in_flight_op_when_cancelled_mid_attempt() {
    let config = RetryConfig::default();
    let cancel = CancellationToken::new();
    let started = std::sync::Arc::new(tokio::sync::Notify::new());
    let started_clone = started.clone();

    let drive_fut = drive(&config, &cancel, move |_attempt| {
        let started = started_clone.clone();
        async move {
            started.notify_one();
            tokio::time::sleep(Duration::from_secs(5)).await;
            Outcome::Done(Ok::<(), FederationError>(()))
        }
    });
    let canceller_fut = async {
        started.notified().await;
        cancel.cancel();
    };

    let (result, ()) = tokio::join!(drive_fut, canceller_fut);
    assert!(matches!(result, Err(FederationError::Cancelled)));
}
