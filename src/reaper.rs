use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that purges completed appointments once they age past
/// the retention window. Only the appointment rows go; audit entries stay.
pub async fn run_retention(engine: Arc<Engine>, retention_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;
        let expired = engine.collect_expired_completed(now, retention_ms);
        for id in expired {
            match engine.purge_appointment(id).await {
                Ok(_) => info!("purged completed appointment {id}"),
                Err(e) => {
                    // May already have been removed — that's fine
                    tracing::debug!("retention skip {id}: {e}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends >= threshold {
            match engine.compact_wal().await {
                Ok(()) => info!("compacted WAL after {appends} appends"),
                Err(e) => tracing::warn!("WAL compaction failed: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("waitq_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn retention_purges_expired_completed() {
        let path = test_wal_path("retention_purge.wal");
        let engine = Arc::new(Engine::new(path).unwrap());

        let staff = Ulid::new();
        engine
            .create_staff(staff, "Dr. Riya Sharma".into(), "Doctor".into(), Some(5), None)
            .await
            .unwrap();
        let service = Ulid::new();
        engine
            .create_service(service, "General Checkup".into(), 30, "Doctor".into())
            .await
            .unwrap();

        let id = Ulid::new();
        engine
            .create_appointment(id, "Farhan Ahmed".into(), service, Some(staff), 9 * HOUR_MS)
            .await
            .unwrap();
        engine
            .update_appointment(id, Some(AppointmentStatus::Completed), None, None)
            .await
            .unwrap();

        let completed_at = engine.get_appointment(&id).unwrap().updated_at;
        let expired = engine.collect_expired_completed(completed_at + 2000, 1000);
        assert_eq!(expired, vec![id]);

        engine.purge_appointment(id).await.unwrap();
        assert!(engine.get_appointment(&id).is_none());
        assert!(engine
            .collect_expired_completed(completed_at + 2000, 1000)
            .is_empty());
    }
}
