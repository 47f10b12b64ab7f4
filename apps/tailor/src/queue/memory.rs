use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{JobCounts, JobOptions, JobQueue, JobState, QueueError, QueuedJob};

#[derive(Default)]
struct QueueState {
    next_id: u64,
    waiting: VecDeque<String>,
    delayed: Vec<(DateTime<Utc>, String)>,
    completed: Vec<(String, DateTime<Utc>)>,
    jobs: HashMap<String, QueuedJob>,
}

impl QueueState {
    fn promote_due(&mut self, now: DateTime<Utc>) {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.delayed.drain(..).partition(|(ready_at, _)| *ready_at <= now);
        self.delayed = pending;
        for (_, id) in due {
            if let Some(job) = self.jobs.get_mut(&id) {
                job.state = JobState::Waiting;
            }
            self.waiting.push_back(id);
        }
    }

    fn count(&self, state: JobState) -> usize {
        self.jobs.values().filter(|job| job.state == state).count()
    }
}

/// Process-local queue with the same retry and retention behaviour as
/// `RedisQueue`. Backoff is wall-clock based.
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown(queue: &str, job_id: &str) -> QueueError {
    QueueError::UnknownJob {
        queue: queue.to_string(),
        id: job_id.to_string(),
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        opts: JobOptions,
    ) -> Result<String, QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        state.next_id += 1;
        let id = state.next_id.to_string();

        state.jobs.insert(
            id.clone(),
            QueuedJob {
                id: id.clone(),
                queue: queue.to_string(),
                payload,
                opts,
                attempts_made: 0,
                state: JobState::Waiting,
                failed_reason: None,
                return_value: None,
                enqueued_at: Utc::now(),
                finished_at: None,
            },
        );
        state.waiting.push_back(id.clone());
        Ok(id)
    }

    async fn reserve(&self, queue: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(queue) else {
            return Ok(None);
        };
        state.promote_due(Utc::now());

        while let Some(id) = state.waiting.pop_front() {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.state = JobState::Active;
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn complete(
        &self,
        queue: &str,
        job_id: &str,
        return_value: Value,
    ) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.get_mut(queue).ok_or_else(|| unknown(queue, job_id))?;
        let now = Utc::now();

        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| unknown(queue, job_id))?;
        job.state = JobState::Completed;
        job.finished_at = Some(now);
        job.return_value = Some(return_value);
        let retention = job.opts.remove_on_complete;

        state.completed.push((job_id.to_string(), now));
        let pruned = retention.prune(&state.completed, now);
        if !pruned.is_empty() {
            state.completed.retain(|(id, _)| !pruned.contains(id));
            for id in &pruned {
                state.jobs.remove(id);
            }
        }
        Ok(())
    }

    async fn fail(&self, queue: &str, job_id: &str, reason: &str) -> Result<JobState, QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.get_mut(queue).ok_or_else(|| unknown(queue, job_id))?;
        let now = Utc::now();

        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| unknown(queue, job_id))?;
        job.attempts_made += 1;
        job.failed_reason = Some(reason.to_string());

        match job.opts.next_retry(job.attempts_made) {
            Some(delay) => {
                job.state = JobState::Delayed;
                let ready_at = now
                    + chrono::Duration::milliseconds(
                        i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
                    );
                state.delayed.push((ready_at, job_id.to_string()));
                Ok(JobState::Delayed)
            }
            None if job.opts.remove_on_fail => {
                state.jobs.remove(job_id);
                Ok(JobState::Failed)
            }
            None => {
                job.state = JobState::Failed;
                job.finished_at = Some(now);
                Ok(JobState::Failed)
            }
        }
    }

    async fn get_job(&self, queue: &str, job_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let queues = self.queues.lock().await;
        Ok(queues
            .get(queue)
            .and_then(|state| state.jobs.get(job_id))
            .cloned())
    }

    async fn counts(&self, queue: &str) -> Result<JobCounts, QueueError> {
        let queues = self.queues.lock().await;
        Ok(queues
            .get(queue)
            .map(|state| JobCounts {
                waiting: state.count(JobState::Waiting),
                delayed: state.count(JobState::Delayed),
                active: state.count(JobState::Active),
                completed: state.count(JobState::Completed),
                failed: state.count(JobState::Failed),
            })
            .unwrap_or_default())
    }
}
