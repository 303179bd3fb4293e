//! Background sweep of expired sessions
//!
//! Request-scoped controllers already sweep on start when `gc_on_start` is
//! set. Long-running hosts can turn that off and run a janitor instead.

use crate::config::StrongroomConfig;
use crate::error::{Result, SessionError};
use crate::storage::{self, Column, Driver, Field, Location, Operator, StorageAdapter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedAdapter = Arc<Mutex<Box<dyn StorageAdapter>>>;

/// Periodic expiry sweep on a dedicated connection.
///
/// Must be spawned from within a tokio runtime. The task is aborted when
/// the janitor is dropped. Needs a file-backed database: an in-memory one
/// is private to the janitor's own connection.
pub struct SessionJanitor {
    storage: SharedAdapter,
    driver: Driver,
    interval: Duration,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SessionJanitor {
    /// Open a connection for `config` and start sweeping every `interval`
    pub fn spawn(config: &StrongroomConfig, interval: Duration) -> Result<Self> {
        config.database.validate().map_err(|e| SessionError::Configuration(format!("{:#}", e)))?;
        if interval.is_zero() {
            return Err(SessionError::Configuration("janitor interval must be non-zero".to_string()));
        }
        if matches!(Location::resolve(&config.database), Location::Memory) {
            return Err(SessionError::Configuration(
                "janitor needs a file-backed database, ':memory:' is private to one connection".to_string(),
            ));
        }

        let adapter = storage::connect(&config.database)?;
        let driver = adapter.driver();
        let storage: SharedAdapter = Arc::new(Mutex::new(adapter));
        let task_storage = Arc::clone(&storage);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;

                match sweep(Arc::clone(&task_storage), driver).await {
                    Ok(count) if count > 0 => log::info!("Janitor swept {} expired sessions", count),
                    Ok(_) => {}
                    Err(e) => log::error!("Janitor sweep failed: {}", e),
                }
            }
        });

        Ok(Self { storage, driver, interval, task: Some(task) })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep immediately, in addition to the periodic runs
    pub async fn sweep_now(&self) -> Result<usize> {
        sweep(Arc::clone(&self.storage), self.driver).await
    }
}

async fn sweep(storage: SharedAdapter, driver: Driver) -> Result<usize> {
    tokio::task::spawn_blocking(move || {
        let adapter = storage.lock().map_err(|_| SessionError::query(driver, "janitor connection lock poisoned"))?;
        let now = chrono::Utc::now().timestamp();
        adapter.delete_where(Column::Expire, Operator::Lt, &Field::Int(now))
    })
    .await
    .map_err(|e| SessionError::query(driver, format!("janitor sweep task failed: {}", e)))?
}

impl Drop for SessionJanitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Ok(mut adapter) = self.storage.lock() {
            adapter.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SessionRecord;

    fn record(id: &str, expire_at: i64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            user_id: 0,
            expire_at,
            encrypted_data: String::new(),
            key: "k".to_string(),
        }
    }

    fn file_config(dir: &tempfile::TempDir) -> StrongroomConfig {
        let mut config = StrongroomConfig::in_memory("example.com");
        config.database.host = dir.path().display().to_string();
        config
    }

    #[tokio::test]
    async fn test_sweep_now_removes_expired_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        let seed = storage::connect(&config.database).unwrap();
        seed.create_table().unwrap();
        let now = chrono::Utc::now().timestamp();
        seed.upsert(&record("old", now - 100)).unwrap();
        seed.upsert(&record("new", now + 100)).unwrap();

        // Long interval: only the immediate first tick and the manual sweep run,
        // whichever gets there first removes the stale row.
        let janitor = SessionJanitor::spawn(&config, Duration::from_secs(3600)).unwrap();
        assert_eq!(janitor.interval(), Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(janitor.sweep_now().await.unwrap() <= 1);
        assert_eq!(janitor.sweep_now().await.unwrap(), 0);
        assert_eq!(seed.select_single(Column::Id, "old").unwrap(), None);
        assert!(seed.select_single(Column::Id, "new").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SessionJanitor::spawn(&file_config(&dir), Duration::ZERO),
            Err(SessionError::Configuration(ref m)) if m.contains("non-zero")
        ));
    }

    #[tokio::test]
    async fn test_in_memory_database_is_rejected() {
        let config = StrongroomConfig::in_memory("example.com");
        assert!(matches!(
            SessionJanitor::spawn(&config, Duration::from_secs(60)),
            Err(SessionError::Configuration(ref m)) if m.contains(":memory:")
        ));
    }

    #[tokio::test]
    async fn test_poisoned_lock_reports_query_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        storage::connect(&config.database).unwrap().create_table().unwrap();

        let janitor = SessionJanitor::spawn(&config, Duration::from_secs(3600)).unwrap();
        let storage = Arc::clone(&janitor.storage);
        let _ = std::thread::spawn(move || {
            let _guard = storage.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = janitor.sweep_now().await.unwrap_err();
        assert!(matches!(err, SessionError::Query { ref message, .. } if message.contains("poisoned")));
    }
}
