//! Bounded-concurrency scheduler
//!
//! A fixed set of worker slots pull units from a shared queue until it is
//! empty. At most `max_concurrency` units are in flight at any instant, and
//! outcomes are returned in completion order.

use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use super::retry::RetryPolicy;
use super::runner::{UnitResolver, UnitRunner};
use crate::models::{TestOutcome, TestUnit};
use crate::pool::SharedResources;
use crate::utils::Timer;

/// Runs a batch of units under a concurrency bound
pub struct Scheduler {
    runner: UnitRunner,
}

impl Scheduler {
    pub fn new(
        resolver: Arc<dyn UnitResolver>,
        resources: Arc<SharedResources>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runner: UnitRunner::new(resolver, resources, policy),
        }
    }

    /// Execute every unit and return exactly one outcome per unit.
    ///
    /// A `max_concurrency` of 0 is treated as 1.
    pub async fn run(&self, units: Vec<TestUnit>, max_concurrency: usize) -> Vec<TestOutcome> {
        let total = units.len();
        if total == 0 {
            return Vec::new();
        }

        let slots = max_concurrency.max(1).min(total);
        info!(
            "Scheduling {} units on {} slots (max retries {})",
            total,
            slots,
            self.runner.policy().max_retries()
        );

        let timer = Timer::start("scheduler");
        let queue = Mutex::new(VecDeque::from(units));
        let completed = AtomicUsize::new(0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers: Vec<_> = (0..slots)
            .map(|slot| {
                let tx = tx.clone();
                let queue = &queue;
                let completed = &completed;
                async move {
                    loop {
                        let next = queue.lock().await.pop_front();
                        let Some(unit) = next else { break };

                        debug!("Slot {} picked {}", slot, unit.name);
                        let outcome = self.runner.run(unit).await;
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("[{}/{}] {}", done, total, outcome);

                        // Receiver outlives every worker
                        let _ = tx.send(outcome);
                    }
                    debug!("Slot {} idle", slot);
                }
            })
            .collect();
        drop(tx);

        join_all(workers).await;

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        let done = completed.load(Ordering::SeqCst);
        if done != total {
            error!("Scheduler finished {} of {} units", done, total);
        }
        info!("Executed {} units in {}ms", done, timer.elapsed_ms());

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::executor::runner::{unit_body, UnitBody};
    use crate::models::{FailureKind, Locator, OutcomeStatus, TestCategory, UnitError};
    use crate::results::ResultAggregator;
    use std::collections::HashMap;
    use std::time::Duration;

    type Script = fn(&str, u32) -> Result<(), UnitError>;

    /// Resolver that plays back a script and tracks in-flight bodies
    struct Scripted {
        script: Script,
        attempts: std::sync::Mutex<HashMap<String, u32>>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                attempts: std::sync::Mutex::new(HashMap::new()),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn attempts(&self, name: &str) -> u32 {
            self.attempts.lock().unwrap().get(name).copied().unwrap_or(0)
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl UnitResolver for Scripted {
        fn resolve(&self, unit: &TestUnit) -> Result<UnitBody, UnitError> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let count = attempts.entry(unit.name.clone()).or_default();
                *count += 1;
                *count
            };
            if unit.locator.kind == "broken" {
                return Err(UnitError::malformed("locator does not resolve"));
            }

            let result = (self.script)(&unit.name, attempt);
            let in_flight = self.in_flight.clone();
            let peak = self.peak.clone();
            Ok(unit_body(move |_ctx| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                result
            }))
        }
    }

    fn units(names: &[&str]) -> Vec<TestUnit> {
        names
            .iter()
            .map(|name| TestUnit::new(*name, Locator::new("api.status"), TestCategory::Api))
            .collect()
    }

    fn scheduler(resolver: Arc<Scripted>, max_retries: u32) -> Scheduler {
        Scheduler::new(
            resolver,
            Arc::new(SharedResources::new(&PoolConfig::default(), 5)),
            RetryPolicy::new(max_retries, Duration::ZERO),
        )
    }

    fn always_pass(_: &str, _: u32) -> Result<(), UnitError> {
        Ok(())
    }

    fn mixed(name: &str, attempt: u32) -> Result<(), UnitError> {
        match name {
            "A" | "B" => Err(UnitError::assertion("expected 200, got 500")),
            "C" if attempt <= 2 => Err(UnitError::from_message(
                "Navigation timeout of 30000 ms exceeded",
            )),
            _ => Ok(()),
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let resolver = Scripted::new(always_pass);
        let outcomes = scheduler(resolver, 2).run(Vec::new(), 4).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_one_outcome_per_unit() {
        let resolver = Scripted::new(mixed);
        let outcomes = scheduler(resolver, 0)
            .run(units(&["A", "B", "C", "D", "E", "F"]), 2)
            .await;

        assert_eq!(outcomes.len(), 6);
        let summary = ResultAggregator::summarize(&outcomes);
        assert_eq!(summary.passed + summary.failed, 6);

        let mut names: Vec<&str> = outcomes.iter().map(|o| o.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_bound() {
        let resolver = Scripted::new(always_pass);
        let names: Vec<String> = (0..12).map(|i| format!("unit-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let outcomes = scheduler(resolver.clone(), 2).run(units(&refs), 3).await;

        assert_eq!(outcomes.len(), 12);
        assert!(resolver.peak() <= 3);
        assert!(resolver.peak() >= 1);
    }

    #[tokio::test]
    async fn test_more_slots_than_units() {
        let resolver = Scripted::new(always_pass);
        let outcomes = scheduler(resolver.clone(), 2).run(units(&["A", "B", "C"]), 10).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Passed));
        assert!(resolver.peak() <= 3);
    }

    #[tokio::test]
    async fn test_zero_concurrency_runs_sequentially() {
        let resolver = Scripted::new(always_pass);
        let outcomes = scheduler(resolver.clone(), 2).run(units(&["A", "B", "C"]), 0).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(resolver.peak(), 1);
    }

    #[tokio::test]
    async fn test_mixed_batch() {
        let resolver = Scripted::new(mixed);
        let outcomes = scheduler(resolver.clone(), 2)
            .run(units(&["A", "B", "C", "D", "E"]), 2)
            .await;

        let summary = ResultAggregator::summarize(&outcomes);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.failed, 2);

        let c = outcomes.iter().find(|o| o.name() == "C").unwrap();
        assert_eq!(c.status, OutcomeStatus::Passed);
        assert_eq!(c.retry_attempts, 2);

        assert_eq!(resolver.attempts("A"), 1);
        assert_eq!(resolver.attempts("B"), 1);
        assert_eq!(resolver.attempts("C"), 3);
        assert_eq!(resolver.attempts("D"), 1);
    }

    #[tokio::test]
    async fn test_retry_bound() {
        fn flaky_network(_: &str, _: u32) -> Result<(), UnitError> {
            Err(UnitError::from_message("getaddrinfo ENOTFOUND api.example.com"))
        }

        let resolver = Scripted::new(flaky_network);
        let outcomes = scheduler(resolver.clone(), 3).run(units(&["lookup"]), 1).await;

        assert_eq!(resolver.attempts("lookup"), 4);
        assert_eq!(outcomes[0].retry_attempts, 3);
        assert_eq!(
            outcomes[0].error.as_ref().map(|e| e.kind),
            Some(FailureKind::NameResolution)
        );
    }

    #[tokio::test]
    async fn test_malformed_unit_does_not_stop_batch() {
        let resolver = Scripted::new(always_pass);
        let mut batch = units(&["ok-1", "ok-2"]);
        batch.push(TestUnit::new("bad", Locator::new("broken"), TestCategory::Unknown));

        let outcomes = scheduler(resolver.clone(), 2).run(batch, 2).await;

        assert_eq!(outcomes.len(), 3);
        let bad = outcomes.iter().find(|o| o.name() == "bad").unwrap();
        assert_eq!(bad.status, OutcomeStatus::Failed);
        assert_eq!(bad.retry_attempts, 0);
        assert_eq!(resolver.attempts("bad"), 1);
    }
}
