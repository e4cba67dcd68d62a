//! In-memory stores for running without Supabase

use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use uuid::Uuid;

use super::results::MatchRecord;
use super::{ResultRecorder, StoreError, UserLookup};

/// Keeps results in memory, one per room
#[derive(Default)]
pub struct MemoryResultStore {
    records: Mutex<Vec<MatchRecord>>,
    fail: bool,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().clone()
    }
}

impl ResultRecorder for MemoryResultStore {
    fn record_result(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if self.fail {
                return Err(StoreError::Unavailable("memory store set to fail".to_string()));
            }
            let mut records = self.records.lock();
            records.retain(|r| r.room_id != record.room_id);
            records.push(record);
            Ok(())
        })
    }
}

/// Display names held in memory
#[derive(Default)]
pub struct MemoryUserDirectory {
    names: DashMap<Uuid, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: Uuid, display_name: impl Into<String>) {
        self.names.insert(user_id, display_name.into());
    }
}

impl UserLookup for MemoryUserDirectory {
    fn display_name(&self, user_id: Uuid) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        let name = self.names.get(&user_id).map(|n| n.value().clone());
        Box::pin(async move { Ok(name) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn record(room_id: Uuid, winner: Option<Uuid>) -> MatchRecord {
        MatchRecord {
            room_id,
            player1_id: Uuid::new_v4(),
            player2_id: Uuid::new_v4(),
            winner_id: winner,
            player1_score: 7,
            player2_score: 3,
            started_at: None,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn recording_a_room_twice_keeps_one_row() {
        let store = MemoryResultStore::new();
        let room = Uuid::new_v4();
        assert_ok!(store.record_result(record(room, None)).await);
        assert_ok!(store.record_result(record(room, Some(Uuid::new_v4()))).await);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn failing_store_reports_error() {
        let store = MemoryResultStore::failing();
        assert_err!(store.record_result(record(Uuid::new_v4(), None)).await);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn directory_lookup() {
        let directory = MemoryUserDirectory::new();
        let id = Uuid::new_v4();
        directory.insert(id, "ana");
        assert_eq!(directory.display_name(id).await.unwrap(), Some("ana".to_string()));
        assert_eq!(directory.display_name(Uuid::new_v4()).await.unwrap(), None);
    }
}
