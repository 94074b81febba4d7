use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use fusebox::{
    BackoffStrategy, CachedFallback, CircuitBreakerConfig, FailureKind, FallbackChain,
    JitterType, Resilience, RetryConfig,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("upstream returned 503")]
struct Upstream503;

impl FailureKind for Upstream503 {
    fn kind(&self) -> &str {
        "Upstream503"
    }
}

/// A pretend upstream API that can be flipped between healthy and failing.
struct FlakyApi {
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyApi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    async fn fetch_quote(&self) -> Result<String, Upstream503> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.healthy.load(Ordering::SeqCst) {
            Ok(format!("quote #{n}: BTC-USD 64250.10"))
        } else {
            Err(Upstream503)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Configuring Resilience ===");
    let retry = RetryConfig::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(100))
        .with_backoff_strategy(BackoffStrategy::Exponential)
        .with_jitter(JitterType::Equal);
    let resilience = Resilience::new(retry)?;
    resilience.configure(
        "quotes-api",
        CircuitBreakerConfig::new("quotes-api")
            .with_failure_threshold(3)
            .with_recovery_timeout(Duration::from_secs(2))
            .with_call_timeout(Duration::from_secs(1)),
    )?;
    println!("  breaker 'quotes-api': threshold=3 recovery=2s call timeout=1s");

    let api = FlakyApi::new();
    let cached = CachedFallback::new();
    let fallback = FallbackChain::new().with_handler(cached.clone());

    println!("\n=== Phase 1: Healthy Warm-Up ===");
    let quote = resilience.call("quotes-api", || api.fetch_quote()).await?;
    println!("  fetched: {quote}");
    cached.record(quote);

    println!("\n=== Phase 2: Dependency Fails, Breaker Trips ===");
    api.set_healthy(false);
    for i in 1..=2 {
        match resilience.call("quotes-api", || api.fetch_quote()).await {
            Ok(quote) => println!("  call {i}: {quote}"),
            Err(err) => println!("  call {i}: {err}"),
        }
    }
    println!("  {}", resilience.status("quotes-api").unwrap());

    println!("\n=== Phase 3: Fast-Fail, Served From Cache ===");
    for i in 1..=3 {
        let quote = resilience
            .call_with_fallback("quotes-api", || api.fetch_quote(), &fallback)
            .await?;
        println!("  call {i}: {quote} (degraded)");
    }

    println!("\n=== Phase 4: Recovery Probe ===");
    api.set_healthy(true);
    println!("  waiting out the recovery timeout...");
    tokio::time::sleep(Duration::from_millis(2100)).await;
    let quote = resilience.call("quotes-api", || api.fetch_quote()).await?;
    println!("  probe succeeded: {quote}");
    println!("  {}", resilience.status("quotes-api").unwrap());

    println!("\n=== Status Snapshots ===");
    println!("{}", serde_json::to_string_pretty(&resilience.all_statuses())?);
    let retry_metrics = resilience.retry_metrics();
    println!(
        "retry: attempts={} successful_retries={} failed_retries={} recorded_retries={}",
        retry_metrics.total_attempts,
        retry_metrics.successful_retries,
        retry_metrics.failed_retries,
        retry_metrics.attempt_history.len()
    );

    Ok(())
}
