//! Job state store over Redis.
//!
//! One serialized `JobRecord` per job, keyed `job:<job_id>`. Updates are
//! read-modify-write without CAS: at most one worker holds the broker lease
//! for a given stage of a given job, so last-writer-wins is safe.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use clippipe_models::{JobId, JobRecord};

use crate::error::{StateError, StateResult};

/// State store configuration.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Redis URL
    pub redis_url: String,
    /// Connection attempts before giving up
    pub connect_retries: u32,
    /// Fixed delay between connection attempts
    pub connect_delay: Duration,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            connect_retries: 5,
            connect_delay: Duration::from_secs(2),
        }
    }
}

impl StateConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            ..Default::default()
        }
    }
}

/// Redis-backed job state store.
pub struct StateStore {
    client: redis::Client,
    config: StateConfig,
    conn: OnceCell<MultiplexedConnection>,
}

impl StateStore {
    /// Create a new store. The connection is established lazily on first use.
    pub fn new(config: StateConfig) -> StateResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            conn: OnceCell::new(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StateResult<Self> {
        Self::new(StateConfig::from_env())
    }

    /// The Redis key for a job.
    pub fn job_key(job_id: &JobId) -> String {
        format!("job:{}", job_id)
    }

    /// Get (or establish) the shared connection, retrying with a fixed delay.
    async fn conn(&self) -> StateResult<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mut last_err: Option<redis::RedisError> = None;
                for attempt in 1..=self.config.connect_retries {
                    match self.client.get_multiplexed_async_connection().await {
                        Ok(conn) => {
                            info!(url = %self.config.redis_url, "Connected to state store");
                            return Ok(conn);
                        }
                        Err(e) => {
                            warn!(
                                attempt,
                                retries = self.config.connect_retries,
                                error = %e,
                                "State store connection attempt failed"
                            );
                            last_err = Some(e);
                            if attempt < self.config.connect_retries {
                                tokio::time::sleep(self.config.connect_delay).await;
                            }
                        }
                    }
                }
                Err(StateError::unavailable(
                    last_err
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no connection attempts made".to_string()),
                ))
            })
            .await?;
        Ok(conn.clone())
    }

    /// Initialize a job: writes a fresh PENDING record.
    ///
    /// Fails only when the store itself is unavailable.
    pub async fn initialize(&self, job_id: &JobId, url: &str) -> StateResult<()> {
        let record = JobRecord::new(job_id.clone(), url);
        self.put(&record).await?;
        info!(job_id = %job_id, "Job initialized in state store with status: PENDING");
        Ok(())
    }

    /// Write a complete record, replacing any existing one.
    pub async fn put(&self, record: &JobRecord) -> StateResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(Self::job_key(&record.job_id), payload)
            .await?;
        Ok(())
    }

    /// Merge an update into a stored record.
    ///
    /// Unknown jobs are a silent warn, never an error: a message can outlive
    /// its advisory record. The patch runs against the freshly loaded record,
    /// so record-level invariants (monotone percent, 200-char error cap) are
    /// enforced by `JobRecord` itself.
    pub async fn update<F>(&self, job_id: &JobId, patch: F) -> StateResult<()>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut conn = self.conn().await?;
        let key = Self::job_key(job_id);

        let current: Option<String> = conn.get(&key).await?;
        let Some(current) = current else {
            warn!(job_id = %job_id, "Tried to update a job not present in the state store");
            return Ok(());
        };

        let mut record: JobRecord = serde_json::from_str(&current)?;
        patch(&mut record);

        let payload = serde_json::to_string(&record)?;
        conn.set::<_, _, ()>(&key, payload).await?;
        debug!(
            job_id = %job_id,
            status = %record.status,
            step = %record.current_step,
            "Job state updated"
        );
        Ok(())
    }

    /// Fetch a job's record, or `None` when absent.
    pub async fn get(&self, job_id: &JobId) -> StateResult<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(Self::job_key(job_id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Delete a job's record.
    pub async fn remove(&self, job_id: &JobId) -> StateResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(Self::job_key(job_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key() {
        assert_eq!(StateStore::job_key(&JobId::from("abc")), "job:abc");
    }

    #[test]
    fn test_config_defaults() {
        let config = StateConfig::default();
        assert_eq!(config.connect_retries, 5);
        assert_eq!(config.connect_delay, Duration::from_secs(2));
    }
}
