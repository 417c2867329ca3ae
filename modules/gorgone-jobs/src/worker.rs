use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::queue::{JobQueue, JobRow};

/// A deferred enqueue a handler requests. Follow-ups are performed after
/// the triggering job is marked done, so a follow-up reusing the job's own
/// idempotency key does not collapse onto it.
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub topic: &'static str,
    pub payload: serde_json::Value,
    pub run_after: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

/// A topic handler. Implementations must be idempotent: the queue delivers
/// at least once.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn topic(&self) -> &'static str;

    /// Concurrent executions allowed for this topic.
    fn concurrency(&self) -> usize {
        4
    }

    /// Wall-clock budget for one execution. On expiry the attempt counts as
    /// a failure and the queue retries with backoff.
    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    /// Run the job. Returned follow-ups are enqueued once the job is done.
    async fn handle(&self, payload: serde_json::Value) -> Result<Vec<FollowUp>>;
}

/// Topic → handler mapping shared by the worker pool and the HTTP callback
/// surface.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.topic(), handler);
        self
    }

    pub fn get(&self, topic: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(topic)
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

/// Leases jobs from the durable queue and runs them on tokio tasks, with
/// per-topic concurrency limits and handler deadlines.
pub struct WorkerPool {
    queue: JobQueue,
    registry: HandlerRegistry,
    semaphores: HashMap<&'static str, Arc<Semaphore>>,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, registry: HandlerRegistry) -> Self {
        let semaphores = registry
            .handlers
            .values()
            .map(|h| (h.topic(), Arc::new(Semaphore::new(h.concurrency()))))
            .collect();
        Self {
            queue,
            registry,
            semaphores,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Dispatch loop. Runs until the process exits.
    pub async fn run(self) {
        let mut reap_tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = reap_tick.tick() => {
                    if let Err(e) = self.queue.reap_expired_leases().await {
                        tracing::error!(error = %e, "Lease reaping failed");
                    }
                }
                leased = self.lease_one() => {
                    match leased {
                        Ok(true) => {} // immediately try for the next job
                        Ok(false) => tokio::time::sleep(self.poll_interval).await,
                        Err(e) => {
                            tracing::error!(error = %e, "Job lease failed");
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }
            }
        }
    }

    /// Lease and spawn at most one job. Returns whether a job was leased.
    async fn lease_one(&self) -> Result<bool> {
        // Only lease topics that have a free execution slot, so a saturated
        // topic never starves the others.
        let available: Vec<&str> = self
            .semaphores
            .iter()
            .filter(|(_, sem)| sem.available_permits() > 0)
            .map(|(topic, _)| *topic)
            .collect();
        if available.is_empty() {
            return Ok(false);
        }

        let Some(job) = self.queue.lease_next(&available).await? else {
            return Ok(false);
        };

        let Some(handler) = self.registry.get(&job.topic).cloned() else {
            // A topic without a handler is a deployment error, not a retry
            // candidate.
            self.queue.fail(&job, "no handler registered").await?;
            return Ok(true);
        };

        let semaphore = self
            .semaphores
            .get(handler.topic())
            .cloned()
            .expect("semaphore exists for every registered topic");
        let queue = self.queue.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("worker semaphore never closes");
            run_job(&queue, handler.as_ref(), &job).await;
        });

        Ok(true)
    }
}

async fn run_job(queue: &JobQueue, handler: &dyn JobHandler, job: &JobRow) {
    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(handler.timeout(), handler.handle(job.payload.clone())).await;

    let result = match outcome {
        Ok(Ok(followups)) => {
            tracing::info!(
                job_id = %job.id,
                topic = %job.topic,
                elapsed_ms = started.elapsed().as_millis() as u64,
                followups = followups.len(),
                "Job completed"
            );
            let completed = queue.complete(job.id).await;
            if completed.is_ok() {
                for f in followups {
                    if let Err(e) = queue
                        .enqueue(f.topic, &f.payload, f.run_after, f.idempotency_key.as_deref())
                        .await
                    {
                        tracing::error!(
                            job_id = %job.id,
                            followup_topic = f.topic,
                            error = %e,
                            "Follow-up enqueue failed; downstream work lost for this batch"
                        );
                    }
                }
            }
            completed
        }
        Ok(Err(e)) => queue.fail(job, &e.to_string()).await,
        Err(_) => queue.fail(job, "handler deadline exceeded").await,
    };

    if let Err(e) = result {
        tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn topic(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _payload: serde_json::Value) -> Result<Vec<FollowUp>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn registry_maps_topics_to_handlers() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
        });
        let registry = HandlerRegistry::new().register(handler);
        assert!(registry.get("counting").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.topics(), vec!["counting"]);
    }
}
