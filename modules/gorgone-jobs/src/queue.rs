use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

/// Default attempts before a job is parked as failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Lease duration granted to an inflight job, seconds. The reaper returns
/// jobs whose lease has lapsed to pending.
pub const LEASE_SECONDS: i64 = 180;

const BACKOFF_BASE_SECONDS: f64 = 30.0;
const BACKOFF_CAP_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Inflight,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Inflight => "inflight",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "inflight" => Some(JobState::Inflight),
            "done" => Some(JobState::Done),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub run_after: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub idempotency_key: Option<String>,
    pub state: String,
    pub lease_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn state(&self) -> JobState {
        JobState::parse(&self.state).unwrap_or(JobState::Failed)
    }
}

/// Durable delayed-job queue over the jobs table. Delivery is
/// at-least-once; handlers are expected to be idempotent.
#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
}

impl JobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a job. When `idempotency_key` matches an existing
    /// non-terminal job on the same topic, the enqueue is a no-op and the
    /// existing job is returned.
    pub async fn enqueue(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        run_after: Option<DateTime<Utc>>,
        idempotency_key: Option<&str>,
    ) -> Result<JobRow> {
        let run_after = run_after.unwrap_or_else(Utc::now);

        // Two rounds: the only way the post-conflict lookup misses is the
        // existing job reaching a terminal state in between, in which case
        // the second insert wins.
        for _ in 0..2 {
            let inserted = sqlx::query_as::<_, JobRow>(
                r#"
                INSERT INTO jobs (
                    id, topic, payload, run_after, attempts, max_attempts,
                    idempotency_key, state, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, 0, $5, $6, 'pending', now(), now())
                ON CONFLICT (topic, idempotency_key)
                    WHERE idempotency_key IS NOT NULL AND state IN ('pending', 'inflight')
                    DO NOTHING
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(topic)
            .bind(payload)
            .bind(run_after)
            .bind(DEFAULT_MAX_ATTEMPTS)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(job) = inserted {
                return Ok(job);
            }

            let key = idempotency_key
                .expect("conflict is only possible with an idempotency key");
            let existing = sqlx::query_as::<_, JobRow>(
                r#"
                SELECT * FROM jobs
                WHERE topic = $1 AND idempotency_key = $2 AND state IN ('pending', 'inflight')
                "#,
            )
            .bind(topic)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(job) = existing {
                tracing::debug!(topic, key, job_id = %job.id, "Enqueue collapsed onto existing job");
                return Ok(job);
            }
        }

        anyhow::bail!("enqueue for topic {topic} lost two insert races in a row")
    }

    /// Lease the oldest due pending job among `topics`, marking it inflight
    /// with a lease deadline. Leasing uses SKIP LOCKED so parallel workers
    /// never contend on the same row.
    pub async fn lease_next(&self, topics: &[&str]) -> Result<Option<JobRow>> {
        let topics: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs SET
                state = 'inflight',
                lease_until = now() + ($2 * interval '1 second'),
                attempts = attempts + 1,
                updated_at = now()
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'pending' AND run_after <= now() AND topic = ANY($1)
                ORDER BY run_after
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(&topics)
        .bind(LEASE_SECONDS)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'done', lease_until = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt. Retries with exponential backoff until
    /// `max_attempts`, then parks the job as failed.
    pub async fn fail(&self, job: &JobRow, error: &str) -> Result<()> {
        let delay = backoff_seconds(job.attempts, &mut rand::rng());
        sqlx::query(
            r#"
            UPDATE jobs SET
                state = CASE WHEN attempts >= max_attempts THEN 'failed' ELSE 'pending' END,
                run_after = CASE WHEN attempts >= max_attempts
                    THEN run_after
                    ELSE now() + ($2 * interval '1 second') END,
                lease_until = NULL,
                last_error = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(delay)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if job.attempts >= job.max_attempts {
            tracing::warn!(job_id = %job.id, topic = %job.topic, error, "Job failed permanently");
        } else {
            tracing::info!(
                job_id = %job.id,
                topic = %job.topic,
                attempt = job.attempts,
                retry_in_secs = delay,
                "Job attempt failed, retrying"
            );
        }
        Ok(())
    }

    /// Return expired inflight leases to pending. Crashed workers lose
    /// their lease rather than wedging the job.
    pub async fn reap_expired_leases(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET state = 'pending', lease_until = NULL, updated_at = now()
            WHERE state = 'inflight' AND lease_until < now()
            "#,
        )
        .execute(&self.pool)
        .await?;

        let reaped = result.rows_affected();
        if reaped > 0 {
            tracing::warn!(reaped, "Returned expired job leases to pending");
        }
        Ok(reaped)
    }
}

/// Exponential backoff with ±20% jitter: 30s, 60s, 120s, … capped at 1h.
/// `attempts` is the count including the attempt that just failed.
pub fn backoff_seconds<R: Rng>(attempts: i32, rng: &mut R) -> f64 {
    let exp = (attempts - 1).max(0).min(16) as u32;
    let base = (BACKOFF_BASE_SECONDS * f64::from(2u32.pow(exp))).min(BACKOFF_CAP_SECONDS);
    let jitter = rng.random_range(-0.2..=0.2);
    (base * (1.0 + jitter)).max(1.0)
}

/// Convenience for "run this many seconds from now".
pub fn run_after_seconds(seconds: i64) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_in_jitter_band_and_doubles() {
        let mut rng = rand::rng();
        for attempts in 1..=10 {
            let b = backoff_seconds(attempts, &mut rng);
            let exp = (attempts - 1).min(16) as u32;
            let base = (BACKOFF_BASE_SECONDS * f64::from(2u32.pow(exp))).min(BACKOFF_CAP_SECONDS);
            assert!(
                b >= base * 0.8 - 1e-6 && b <= base * 1.2 + 1e-6,
                "attempt {attempts}: {b} outside ±20% of {base}"
            );
        }
    }

    #[test]
    fn backoff_caps_at_one_hour() {
        let mut rng = rand::rng();
        let b = backoff_seconds(20, &mut rng);
        assert!(b <= BACKOFF_CAP_SECONDS * 1.2, "cap with jitter headroom: {b}");
    }

    #[test]
    fn backoff_never_goes_negative_on_zero_attempts() {
        let mut rng = rand::rng();
        let b = backoff_seconds(0, &mut rng);
        assert!(b >= 1.0);
    }

    #[test]
    fn job_state_round_trips() {
        for state in [
            JobState::Pending,
            JobState::Inflight,
            JobState::Done,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
    }
}
