//! Match result persistence

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::SupabaseClient;
use super::{ResultRecorder, StoreError};

/// Row written to the `matches` table once a match ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Room id; unique per match and used as the idempotency key
    pub room_id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub winner_id: Option<Uuid>,
    pub player1_score: u32,
    pub player2_score: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Result store backed by Supabase
#[derive(Clone)]
pub struct SupabaseResultStore {
    client: SupabaseClient,
}

impl SupabaseResultStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

impl ResultRecorder for SupabaseResultStore {
    fn record_result(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.client.upsert("matches", &record, "room_id").await?;
            Ok(())
        })
    }
}
