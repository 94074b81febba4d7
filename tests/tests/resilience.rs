use std::sync::Arc;
use std::time::Duration;

use fusebox::{
    BackoffStrategy, CachedFallback, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    FallbackChain, JitterType, Resilience, ResilienceError, RetryConfig,
};
use fusebox_testing::{FlakyService, ServiceError, assert_breaker_state};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts(max_attempts)
        .with_backoff_strategy(BackoffStrategy::Fixed)
        .with_base_delay(Duration::from_millis(5))
        .with_jitter(JitterType::None)
}

#[tokio::test]
async fn test_breaker_lifecycle_open_reject_recover() -> anyhow::Result<()> {
    let registry = CircuitBreakerRegistry::new();
    let config = CircuitBreakerConfig::new("ping")
        .with_failure_threshold(2)
        .with_recovery_timeout(Duration::from_millis(50))
        .with_call_timeout(Duration::from_secs(1));
    let breaker = registry.get_or_create("ping", Some(config))?;
    let svc = FlakyService::failing_first(2).with_response("pong");

    // Two consecutive failures trip the breaker.
    for _ in 0..2 {
        let result = breaker.execute(|| svc.call()).await;
        assert!(matches!(result, Err(ResilienceError::Operation(_))));
    }
    assert_breaker_state!(breaker, CircuitState::Open);
    assert_eq!(breaker.status().health, "unhealthy");

    // While open, calls are rejected without reaching the service.
    let rejected = breaker.execute(|| svc.call()).await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(svc.calls(), 2);
    assert_eq!(breaker.metrics().rejected_calls, 1);

    // After the recovery timeout, a probe is admitted and succeeds.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let recovered = breaker.execute(|| svc.call()).await;
    assert_eq!(recovered.unwrap(), "pong");
    assert_breaker_state!(breaker, CircuitState::Closed);
    assert_eq!(breaker.status().health, "healthy");
    assert_eq!(breaker.status().consecutive_failures, 0);
    Ok(())
}

#[tokio::test]
async fn test_facade_retry_recovers_failing_service() -> anyhow::Result<()> {
    let resilience = Resilience::new(fast_retry(3))?;
    resilience.configure(
        "search",
        CircuitBreakerConfig::new("search").with_failure_threshold(10),
    )?;
    let svc = FlakyService::failing_first(2).with_response("pong");

    let result = resilience.call("search", || svc.call()).await;

    assert_eq!(result.unwrap(), "pong");
    assert_eq!(svc.calls(), 3);

    let retry_metrics = resilience.retry_metrics();
    assert_eq!(retry_metrics.successful_retries, 1);
    assert_eq!(retry_metrics.attempt_history.len(), 2);
    assert_eq!(retry_metrics.attempt_history[0].failure_kind, "Unavailable");

    let status = resilience.status("search").unwrap();
    assert_eq!(status.metrics.total_calls, 3);
    assert_eq!(status.metrics.failed_calls, 2);
    assert_eq!(status.metrics.successful_calls, 1);
    Ok(())
}

#[tokio::test]
async fn test_open_circuit_served_from_cache() -> anyhow::Result<()> {
    let resilience = Resilience::new(fast_retry(1))?;
    resilience.configure(
        "prices",
        CircuitBreakerConfig::new("prices")
            .with_failure_threshold(2)
            .with_recovery_timeout(Duration::from_secs(60)),
    )?;

    let cached = CachedFallback::new();
    let chain = FallbackChain::new().with_handler(cached.clone());

    // Warm the cache from a healthy call.
    let healthy = FlakyService::reliable().with_response("fresh");
    let warm = resilience
        .call_with_fallback("prices", || healthy.call(), &chain)
        .await;
    let value = warm.unwrap();
    assert_eq!(value, "fresh");
    cached.record(value);

    // The dependency dies; the cache keeps serving through open circuit.
    let broken = FlakyService::broken();
    for _ in 0..4 {
        let result = resilience
            .call_with_fallback("prices", || broken.call(), &chain)
            .await;
        assert_eq!(result.unwrap(), "fresh");
    }

    // Only the two trip-inducing calls reached the dead service.
    assert_eq!(broken.calls(), 2);
    let status = resilience.status("prices").unwrap();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.metrics.rejected_calls, 2);
    Ok(())
}

#[tokio::test]
async fn test_unrelated_breakers_are_isolated() -> anyhow::Result<()> {
    let resilience = Arc::new(Resilience::new(fast_retry(1))?);
    resilience.configure(
        "alpha",
        CircuitBreakerConfig::new("alpha").with_failure_threshold(3),
    )?;
    resilience.configure(
        "beta",
        CircuitBreakerConfig::new("beta").with_failure_threshold(3),
    )?;
    let beta_breaker = resilience.registry().get("beta").unwrap();

    let hammer = {
        let resilience = Arc::clone(&resilience);
        let beta_breaker = Arc::clone(&beta_breaker);
        tokio::spawn(async move {
            let svc = FlakyService::reliable();
            for _ in 0..200 {
                let result = resilience.call("beta", || svc.call()).await;
                assert!(result.is_ok());
                assert_breaker_state!(beta_breaker, CircuitState::Closed);
            }
        })
    };

    let failing = FlakyService::broken();
    for _ in 0..3 {
        let _ = resilience.call("alpha", || failing.call()).await;
    }

    hammer.await?;

    assert_eq!(
        resilience.status("alpha").unwrap().state,
        CircuitState::Open
    );
    let beta = resilience.status("beta").unwrap();
    assert_eq!(beta.state, CircuitState::Closed);
    assert_eq!(beta.metrics.successful_calls, 200);
    assert_eq!(beta.metrics.failed_calls, 0);
    Ok(())
}

#[tokio::test]
async fn test_registry_single_instance_under_contention() -> anyhow::Result<()> {
    let resilience = Arc::new(Resilience::new(fast_retry(1))?);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let resilience = Arc::clone(&resilience);
        handles.push(tokio::spawn(async move {
            let svc = FlakyService::reliable();
            resilience.call("shared", || svc.call()).await
        }));
    }
    for handle in handles {
        assert!(handle.await?.is_ok());
    }

    assert_eq!(resilience.registry().len(), 1);
    let status = resilience.status("shared").unwrap();
    assert_eq!(status.metrics.total_calls, 32);
    assert_eq!(status.metrics.successful_calls, 32);
    Ok(())
}

#[tokio::test]
async fn test_call_timeout_counts_and_propagates() -> anyhow::Result<()> {
    let resilience = Resilience::new(fast_retry(2))?;
    resilience.configure(
        "slow",
        CircuitBreakerConfig::new("slow")
            .with_failure_threshold(10)
            .with_call_timeout(Duration::from_millis(30)),
    )?;
    let svc = FlakyService::reliable().with_latency(Duration::from_millis(100));

    let result = resilience.call("slow", || svc.call()).await;
    match result.unwrap_err() {
        ResilienceError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.is_timeout());
        }
        other => panic!("expected RetryExhausted, got {other}"),
    }
    assert_eq!(svc.calls(), 2);

    let metrics = resilience.status("slow").unwrap().metrics;
    assert_eq!(metrics.timeouts, 2);
    assert_eq!(metrics.failed_calls, 2);
    assert_eq!(metrics.total_calls, 2);

    // With an allow-list that excludes timeouts, the first timeout
    // propagates instead of burning the remaining attempt.
    let picky = Resilience::new(fast_retry(2).with_retryable_kinds(["Unavailable"]))?;
    picky.configure(
        "slow",
        CircuitBreakerConfig::new("slow")
            .with_failure_threshold(10)
            .with_call_timeout(Duration::from_millis(30)),
    )?;
    let svc = FlakyService::reliable().with_latency(Duration::from_millis(100));

    let result = picky.call("slow", || svc.call()).await;
    assert!(result.unwrap_err().is_timeout());
    assert_eq!(svc.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_half_open_trial_burst() -> anyhow::Result<()> {
    let registry = CircuitBreakerRegistry::new();
    let config = CircuitBreakerConfig::new("burst")
        .with_failure_threshold(1)
        .with_recovery_timeout(Duration::from_millis(30))
        .with_half_open_max_calls(2)
        .with_call_timeout(Duration::from_secs(5));
    let breaker = registry.get_or_create("burst", Some(config))?;

    breaker.record_failure("Unavailable");
    assert_breaker_state!(breaker, CircuitState::Open);
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Park two probes inside the half-open window.
    let mut probes = Vec::new();
    let mut releases = Vec::new();
    for _ in 0..2 {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        releases.push(tx);
        let breaker = Arc::clone(&breaker);
        probes.push(tokio::spawn(async move {
            breaker
                .execute(|| async move {
                    let _ = rx.await;
                    Ok::<_, ServiceError>("recovered")
                })
                .await
        }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_breaker_state!(breaker, CircuitState::HalfOpen);

    // The burst budget is spent; a third call is rejected.
    let third = breaker
        .execute(|| async { Ok::<_, ServiceError>("x") })
        .await;
    assert!(matches!(third, Err(ResilienceError::CircuitOpen { .. })));

    // First probe success closes the circuit; the second still completes
    // and is counted.
    for tx in releases {
        let _ = tx.send(());
    }
    for probe in probes {
        assert!(probe.await?.is_ok());
    }
    assert_breaker_state!(breaker, CircuitState::Closed);

    let metrics = breaker.metrics();
    assert_eq!(metrics.successful_calls, 2);
    assert_eq!(metrics.rejected_calls, 1);
    Ok(())
}

#[tokio::test]
async fn test_status_snapshots_serialize() -> anyhow::Result<()> {
    let resilience = Resilience::default();
    let svc = FlakyService::reliable();
    let _ = resilience.call("svc", || svc.call()).await;

    let statuses = resilience.all_statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].to_string().contains("state=closed"));

    let json = serde_json::to_value(&statuses)?;
    assert_eq!(json[0]["name"], "svc");
    assert_eq!(json[0]["state"], "closed");
    assert_eq!(json[0]["health"], "healthy");
    assert_eq!(json[0]["metrics"]["total_calls"], 1);
    assert_eq!(json[0]["config"]["failure_threshold"], 5);
    Ok(())
}
