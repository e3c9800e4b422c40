//! Unit execution runner
//!
//! Runs one unit to its final outcome: resolves a fresh body for every
//! attempt, contains panics, and applies the retry policy.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use crate::http::{HttpClient, HttpError};
use crate::models::{FailureKind, TestOutcome, TestUnit, UnitError};
use crate::pool::{Browser, PoolError, SharedResources};
use crate::utils::Timer;

/// Future returned by a unit body
pub type UnitFuture = BoxFuture<'static, Result<(), UnitError>>;

/// Executable body of one attempt of a unit
pub type UnitBody = Box<dyn FnOnce(UnitContext) -> UnitFuture + Send>;

/// Box an async closure as a unit body
pub fn unit_body<F, Fut>(body: F) -> UnitBody
where
    F: FnOnce(UnitContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    Box::new(move |ctx| body(ctx).boxed())
}

/// Turns a unit's locator into an executable body.
///
/// Called once per attempt, so every retry runs a freshly built body.
pub trait UnitResolver: Send + Sync {
    fn resolve(&self, unit: &TestUnit) -> Result<UnitBody, UnitError>;
}

/// Handle given to a unit body for reaching shared resources
#[derive(Clone)]
pub struct UnitContext {
    resources: Arc<SharedResources>,
}

impl UnitContext {
    pub fn new(resources: Arc<SharedResources>) -> Self {
        Self { resources }
    }

    pub async fn acquire_browser(&self) -> Result<Browser, PoolError> {
        self.resources.acquire_browser().await
    }

    pub async fn release_browser(&self, browser: Browser) {
        self.resources.release_browser(browser).await;
    }

    pub async fn http_agent(&self, url: &str) -> Result<HttpClient, HttpError> {
        self.resources.http_agent(url).await
    }
}

/// Runs units with retries
pub struct UnitRunner {
    resolver: Arc<dyn UnitResolver>,
    resources: Arc<SharedResources>,
    policy: RetryPolicy,
}

impl UnitRunner {
    pub fn new(
        resolver: Arc<dyn UnitResolver>,
        resources: Arc<SharedResources>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            resources,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run a unit until it passes, fails terminally, or exhausts its retries
    pub async fn run(&self, unit: TestUnit) -> TestOutcome {
        let mut retries = 0;

        loop {
            let timer = Timer::start(unit.name.as_str());
            let result = self.attempt(&unit).await;
            let elapsed_ms = timer.elapsed_ms();

            match result {
                Ok(()) => return TestOutcome::passed(unit, elapsed_ms, retries),
                Err(err) if self.policy.should_retry(&err, retries) => {
                    retries += 1;
                    let delay = self.policy.backoff_delay(retries);
                    warn!(
                        "Retrying {} ({}/{}) in {}ms after {}: {}",
                        unit.name,
                        retries,
                        self.policy.max_retries(),
                        delay.as_millis(),
                        err.kind,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    debug!("{} failed terminally ({}): {}", unit.name, err.kind, err);
                    return TestOutcome::failed(unit, elapsed_ms, err, retries);
                }
            }
        }
    }

    async fn attempt(&self, unit: &TestUnit) -> Result<(), UnitError> {
        let body = self.resolver.resolve(unit)?;
        let context = UnitContext::new(self.resources.clone());

        match tokio::spawn(body(context)).await {
            Ok(result) => result,
            Err(join_err) => Err(UnitError::new(
                FailureKind::Panicked,
                panic_message(join_err),
            )),
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return format!("unit task aborted: {err}");
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("unit panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("unit panicked: {msg}")
    } else {
        "unit panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::models::{Locator, OutcomeStatus, TestCategory};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with `error` for the first `failures` attempts, then passes
    struct Flaky {
        attempts: Arc<AtomicU32>,
        failures: u32,
        error: UnitError,
    }

    impl UnitResolver for Flaky {
        fn resolve(&self, _unit: &TestUnit) -> Result<UnitBody, UnitError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let result = if attempt <= self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            };
            Ok(unit_body(move |_ctx| async move { result }))
        }
    }

    struct Unresolvable;

    impl UnitResolver for Unresolvable {
        fn resolve(&self, unit: &TestUnit) -> Result<UnitBody, UnitError> {
            Err(UnitError::malformed(format!(
                "unknown locator kind '{}'",
                unit.locator.kind
            )))
        }
    }

    struct Panicking;

    fn detached_handle() -> Result<(), UnitError> {
        panic!("element handle detached");
    }

    impl UnitResolver for Panicking {
        fn resolve(&self, _unit: &TestUnit) -> Result<UnitBody, UnitError> {
            Ok(unit_body(|_ctx| async move { detached_handle() }))
        }
    }

    fn unit() -> TestUnit {
        TestUnit::new("checkout", Locator::new("ui.title"), TestCategory::Ui)
    }

    fn runner(resolver: impl UnitResolver + 'static, max_retries: u32) -> UnitRunner {
        UnitRunner::new(
            Arc::new(resolver),
            Arc::new(SharedResources::new(&PoolConfig::default(), 5)),
            RetryPolicy::new(max_retries, Duration::ZERO),
        )
    }

    fn flaky(failures: u32, error: UnitError) -> (Flaky, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        let resolver = Flaky {
            attempts: attempts.clone(),
            failures,
            error,
        };
        (resolver, attempts)
    }

    #[tokio::test]
    async fn test_transient_failure_then_pass() {
        let (resolver, attempts) = flaky(2, UnitError::from_message("timeout"));
        let outcome = runner(resolver, 2).run(unit()).await;

        assert_eq!(outcome.status, OutcomeStatus::Passed);
        assert_eq!(outcome.retry_attempts, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_transient_exhausts_retries() {
        let (resolver, attempts) = flaky(u32::MAX, UnitError::from_message("read ECONNRESET"));
        let outcome = runner(resolver, 2).run(unit()).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.retry_attempts, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.message(), Some("read ECONNRESET"));
    }

    #[tokio::test]
    async fn test_terminal_failure_runs_once() {
        let (resolver, attempts) = flaky(u32::MAX, UnitError::assertion("title mismatch"));
        let outcome = runner(resolver, 2).run(unit()).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.retry_attempts, 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_unit_is_terminal() {
        let outcome = runner(Unresolvable, 2).run(unit()).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.retry_attempts, 0);
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, FailureKind::Malformed);
        assert!(error.message.contains("ui.title"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let outcome = runner(Panicking, 2).run(unit()).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, FailureKind::Panicked);
        assert!(error.message.contains("element handle detached"));
    }
}
