//! User profile lookup

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::SupabaseClient;
use super::{StoreError, UserLookup};

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: Option<String>,
}

/// Profile lookups against the Supabase `profiles` table
#[derive(Clone)]
pub struct SupabaseUserDirectory {
    client: SupabaseClient,
}

impl SupabaseUserDirectory {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a user profile by ID
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let query = format!("id=eq.{}&select=id,display_name", user_id);
        Ok(self.client.get_one("profiles", &query).await?)
    }
}

impl UserLookup for SupabaseUserDirectory {
    fn display_name(&self, user_id: Uuid) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        Box::pin(async move {
            let profile = self.get_profile(user_id).await?;
            Ok(profile.map(|p| p.display_name.unwrap_or_else(|| default_display_name(user_id))))
        })
    }
}

/// Name shown for users without a profile name
pub fn default_display_name(user_id: Uuid) -> String {
    format!("Player_{}", &user_id.simple().to_string()[..8])
}
