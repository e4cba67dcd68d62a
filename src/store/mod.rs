//! Collaborators outside the match core: result persistence and user lookup.
//!
//! Both are traits so the gateway can be built against Supabase in
//! production and against the in-memory stores offline and in tests.

pub mod memory;
pub mod results;
pub mod supabase;
pub mod users;

pub use memory::{MemoryResultStore, MemoryUserDirectory};
pub use results::{MatchRecord, SupabaseResultStore};
pub use supabase::{SupabaseClient, SupabaseError};
pub use users::SupabaseUserDirectory;

use futures::future::BoxFuture;
use uuid::Uuid;

/// Durable match-result sink. Recording the same room twice must be harmless.
pub trait ResultRecorder: Send + Sync {
    fn record_result(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Display-name lookup for users who are not connected yet
pub trait UserLookup: Send + Sync {
    fn display_name(&self, user_id: Uuid) -> BoxFuture<'_, Result<Option<String>, StoreError>>;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Supabase(#[from] SupabaseError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
