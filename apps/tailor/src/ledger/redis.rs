use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use super::{LedgerError, StatusEvent, StatusLedger};
use crate::models::job::JobId;

const KEY_PREFIX: &str = "tailor:job-status";

/// Ledger backed by one Redis list per job (`LPUSH` + `EXPIRE`).
#[derive(Clone)]
pub struct RedisLedger {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisLedger {
    pub async fn connect(client: &redis::Client, ttl_secs: u64) -> Result<Self, LedgerError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl_secs })
    }
}

fn ledger_key(job_id: &JobId) -> String {
    format!("{KEY_PREFIX}:{job_id}")
}

#[async_trait]
impl StatusLedger for RedisLedger {
    async fn append(&self, job_id: &JobId, event: StatusEvent) -> Result<(), LedgerError> {
        let key = ledger_key(job_id);
        let encoded = serde_json::to_string(&event)?;
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(&key)
            .arg(encoded)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(job_id = %job_id, status = %event.status, "Status appended");
        Ok(())
    }

    async fn read(&self, job_id: &JobId) -> Result<Vec<StatusEvent>, LedgerError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(ledger_key(job_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        raw.iter()
            .map(|entry| serde_json::from_str(entry).map_err(LedgerError::from))
            .collect()
    }

    async fn clear(&self, job_id: &JobId) -> Result<(), LedgerError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(ledger_key(job_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_key_is_namespaced_per_job() {
        assert_eq!(
            ledger_key(&JobId::from("abc-123")),
            "tailor:job-status:abc-123"
        );
    }
}
