//! Redis-backed job queue.
//!
//! Layout per queue `q` (prefix `tailor`):
//! - `tailor:q:id`        : id counter
//! - `tailor:q:wait`      : list of ready ids (LPUSH in, RPOPLPUSH out)
//! - `tailor:q:active`    : list of ids currently held by a worker
//! - `tailor:q:delayed`   : zset of ids scored by ready-at millis
//! - `tailor:q:completed` : zset scored by finished-at millis
//! - `tailor:q:failed`    : zset scored by finished-at millis, never pruned
//! - `tailor:q:job:{id}`  : hash with payload, options and bookkeeping

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::Script;
use serde_json::Value;
use tracing::debug;

use super::{JobCounts, JobOptions, JobQueue, JobState, QueueError, QueuedJob};

const KEY_PREFIX: &str = "tailor";

/// Moves due delayed jobs to the wait list, then hands out one waiting job.
/// Runs atomically so two workers never receive the same id.
const RESERVE_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', now)
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('LPUSH', KEYS[1], id)
  redis.call('HSET', ARGV[2] .. id, 'state', 'waiting')
end
local id = redis.call('RPOPLPUSH', KEYS[1], KEYS[3])
if id then
  redis.call('HSET', ARGV[2] .. id, 'state', 'active', 'processedOn', ARGV[1])
end
return id
"#;

#[derive(Clone)]
pub struct RedisQueue {
    conn: MultiplexedConnection,
    reserve_script: Script,
}

impl RedisQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, QueueError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            reserve_script: Script::new(RESERVE_SCRIPT),
        })
    }
}

fn queue_key(queue: &str, part: &str) -> String {
    format!("{KEY_PREFIX}:{queue}:{part}")
}

fn job_key_prefix(queue: &str) -> String {
    format!("{KEY_PREFIX}:{queue}:job:")
}

fn job_key(queue: &str, id: &str) -> String {
    format!("{}{id}", job_key_prefix(queue))
}

fn millis_to_datetime(id: &str, raw: &str) -> Result<DateTime<Utc>, QueueError> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| QueueError::Corrupt {
            id: id.to_string(),
            reason: format!("invalid timestamp '{raw}'"),
        })
}

/// Rebuilds a `QueuedJob` from its hash fields.
fn decode_job(
    queue: &str,
    id: &str,
    fields: &HashMap<String, String>,
) -> Result<QueuedJob, QueueError> {
    let field = |name: &str| {
        fields.get(name).ok_or_else(|| QueueError::Corrupt {
            id: id.to_string(),
            reason: format!("missing field '{name}'"),
        })
    };

    let state = field("state")?
        .parse::<JobState>()
        .map_err(|reason| QueueError::Corrupt {
            id: id.to_string(),
            reason,
        })?;
    let attempts_made = field("attemptsMade")?
        .parse::<u32>()
        .map_err(|e| QueueError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

    Ok(QueuedJob {
        id: id.to_string(),
        queue: queue.to_string(),
        payload: serde_json::from_str(field("data")?)?,
        opts: serde_json::from_str(field("opts")?)?,
        attempts_made,
        state,
        failed_reason: fields.get("failedReason").cloned(),
        return_value: fields
            .get("returnValue")
            .map(|raw| serde_json::from_str(raw))
            .transpose()?,
        enqueued_at: millis_to_datetime(id, field("timestamp")?)?,
        finished_at: fields
            .get("finishedOn")
            .map(|raw| millis_to_datetime(id, raw))
            .transpose()?,
    })
}

impl RedisQueue {
    async fn require_job(&self, queue: &str, job_id: &str) -> Result<QueuedJob, QueueError> {
        self.get_job(queue, job_id)
            .await?
            .ok_or_else(|| QueueError::UnknownJob {
                queue: queue.to_string(),
                id: job_id.to_string(),
            })
    }

    async fn prune_completed(&self, queue: &str, opts: &JobOptions) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let completed_key = queue_key(queue, "completed");
        let scored: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(&completed_key)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;

        let completed: Vec<(String, DateTime<Utc>)> = scored
            .into_iter()
            .filter_map(|(id, score)| {
                DateTime::from_timestamp_millis(score as i64).map(|finished| (id, finished))
            })
            .collect();

        let pruned = opts.remove_on_complete.prune(&completed, Utc::now());
        if pruned.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &pruned {
            pipe.cmd("ZREM").arg(&completed_key).arg(id).ignore();
            pipe.cmd("DEL").arg(job_key(queue, id)).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        debug!(queue, pruned = pruned.len(), "Pruned completed jobs");
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        opts: JobOptions,
    ) -> Result<String, QueueError> {
        let mut conn = self.conn.clone();
        let id: u64 = redis::cmd("INCR")
            .arg(queue_key(queue, "id"))
            .query_async(&mut conn)
            .await?;
        let id = id.to_string();

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(job_key(queue, &id))
            .arg("data")
            .arg(serde_json::to_string(&payload)?)
            .arg("opts")
            .arg(serde_json::to_string(&opts)?)
            .arg("attemptsMade")
            .arg(0)
            .arg("state")
            .arg(JobState::Waiting.as_str())
            .arg("timestamp")
            .arg(Utc::now().timestamp_millis())
            .ignore()
            .cmd("LPUSH")
            .arg(queue_key(queue, "wait"))
            .arg(&id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(id)
    }

    async fn reserve(&self, queue: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.conn.clone();
        let reserved: Option<String> = self
            .reserve_script
            .key(queue_key(queue, "wait"))
            .key(queue_key(queue, "delayed"))
            .key(queue_key(queue, "active"))
            .arg(Utc::now().timestamp_millis())
            .arg(job_key_prefix(queue))
            .invoke_async(&mut conn)
            .await?;

        match reserved {
            Some(id) => self.get_job(queue, &id).await,
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        queue: &str,
        job_id: &str,
        return_value: Value,
    ) -> Result<(), QueueError> {
        let job = self.require_job(queue, job_id).await?;
        let now = Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(queue_key(queue, "active"))
            .arg(0)
            .arg(job_id)
            .ignore()
            .cmd("ZADD")
            .arg(queue_key(queue, "completed"))
            .arg(now)
            .arg(job_id)
            .ignore()
            .cmd("HSET")
            .arg(job_key(queue, job_id))
            .arg("state")
            .arg(JobState::Completed.as_str())
            .arg("finishedOn")
            .arg(now)
            .arg("returnValue")
            .arg(serde_json::to_string(&return_value)?)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        self.prune_completed(queue, &job.opts).await
    }

    async fn fail(&self, queue: &str, job_id: &str, reason: &str) -> Result<JobState, QueueError> {
        let job = self.require_job(queue, job_id).await?;
        let attempts_made = job.attempts_made + 1;
        let now = Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(queue_key(queue, "active"))
            .arg(0)
            .arg(job_id)
            .ignore();

        let outcome = match job.opts.next_retry(attempts_made) {
            Some(delay) => {
                let ready_at = now + i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                pipe.cmd("ZADD")
                    .arg(queue_key(queue, "delayed"))
                    .arg(ready_at)
                    .arg(job_id)
                    .ignore()
                    .cmd("HSET")
                    .arg(job_key(queue, job_id))
                    .arg("attemptsMade")
                    .arg(attempts_made)
                    .arg("state")
                    .arg(JobState::Delayed.as_str())
                    .arg("failedReason")
                    .arg(reason)
                    .ignore();
                JobState::Delayed
            }
            None if job.opts.remove_on_fail => {
                pipe.cmd("DEL").arg(job_key(queue, job_id)).ignore();
                JobState::Failed
            }
            None => {
                pipe.cmd("ZADD")
                    .arg(queue_key(queue, "failed"))
                    .arg(now)
                    .arg(job_id)
                    .ignore()
                    .cmd("HSET")
                    .arg(job_key(queue, job_id))
                    .arg("attemptsMade")
                    .arg(attempts_made)
                    .arg("state")
                    .arg(JobState::Failed.as_str())
                    .arg("failedReason")
                    .arg(reason)
                    .arg("finishedOn")
                    .arg(now)
                    .ignore();
                JobState::Failed
            }
        };

        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(outcome)
    }

    async fn get_job(&self, queue: &str, job_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(job_key(queue, job_id))
            .query_async(&mut conn)
            .await?;

        if fields.is_empty() {
            return Ok(None);
        }
        decode_job(queue, job_id, &fields).map(Some)
    }

    async fn counts(&self, queue: &str) -> Result<JobCounts, QueueError> {
        let mut conn = self.conn.clone();
        let (waiting, delayed, active, completed, failed): (usize, usize, usize, usize, usize) =
            redis::pipe()
                .cmd("LLEN")
                .arg(queue_key(queue, "wait"))
                .cmd("ZCARD")
                .arg(queue_key(queue, "delayed"))
                .cmd("LLEN")
                .arg(queue_key(queue, "active"))
                .cmd("ZCARD")
                .arg(queue_key(queue, "completed"))
                .cmd("ZCARD")
                .arg(queue_key(queue, "failed"))
                .query_async(&mut conn)
                .await?;

        Ok(JobCounts {
            waiting,
            delayed,
            active,
            completed,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_keys_are_namespaced_per_queue() {
        assert_eq!(queue_key("rank-skills", "wait"), "tailor:rank-skills:wait");
        assert_eq!(job_key("rank-skills", "42"), "tailor:rank-skills:job:42");
    }

    #[test]
    fn test_decode_job_from_hash() {
        let opts = serde_json::to_string(&JobOptions::default()).unwrap();
        let hash = fields(&[
            ("data", r#"{"jobId":"abc"}"#),
            ("opts", &opts),
            ("attemptsMade", "2"),
            ("state", "failed"),
            ("failedReason", "connection refused"),
            ("timestamp", "1700000000000"),
            ("finishedOn", "1700000005000"),
        ]);

        let job = decode_job("analyze-jd", "7", &hash).unwrap();
        assert_eq!(job.id, "7");
        assert_eq!(job.payload["jobId"], "abc");
        assert_eq!(job.attempts_made, 2);
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failed_reason.as_deref(), Some("connection refused"));
        assert_eq!(job.enqueued_at.timestamp_millis(), 1_700_000_000_000);
        assert!(job.return_value.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_decode_job_rejects_missing_state() {
        let opts = serde_json::to_string(&JobOptions::default()).unwrap();
        let hash = fields(&[
            ("data", "{}"),
            ("opts", &opts),
            ("attemptsMade", "0"),
            ("timestamp", "1700000000000"),
        ]);
        assert!(matches!(
            decode_job("analyze-jd", "7", &hash),
            Err(QueueError::Corrupt { .. })
        ));
    }
}
