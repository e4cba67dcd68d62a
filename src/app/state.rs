//! Application state shared across routes

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::gateway::SessionGateway;
use crate::http::middleware::{IdentityVerifier, JwtVerifier};
use crate::store::{
    MemoryResultStore, MemoryUserDirectory, ResultRecorder, SupabaseClient, SupabaseResultStore,
    SupabaseUserDirectory, UserLookup,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub registry: Arc<MatchRegistry>,
    pub gateway: Arc<SessionGateway>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let identity: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&config.jwt_secret));

        // Initialize stores
        let (results, users): (Arc<dyn ResultRecorder>, Arc<dyn UserLookup>) =
            match &config.supabase {
                Some(supabase) => {
                    info!(url = %supabase.url, "Using Supabase for results and profiles");
                    let client = SupabaseClient::new(&supabase.url, &supabase.service_role_key);
                    (
                        Arc::new(SupabaseResultStore::new(client.clone())),
                        Arc::new(SupabaseUserDirectory::new(client)),
                    )
                }
                None => {
                    warn!("Supabase not configured, match results are kept in memory only");
                    (
                        Arc::new(MemoryResultStore::new()),
                        Arc::new(MemoryUserDirectory::new()),
                    )
                }
            };

        Self::with_collaborators(config, identity, results, users)
    }

    /// Build the state around explicit collaborators
    pub fn with_collaborators(
        config: Config,
        identity: Arc<dyn IdentityVerifier>,
        results: Arc<dyn ResultRecorder>,
        users: Arc<dyn UserLookup>,
    ) -> Self {
        let config = Arc::new(config);

        // Initialize match registry
        let registry = Arc::new(MatchRegistry::new());

        let gateway = Arc::new(SessionGateway::new(
            registry.clone(),
            results,
            users,
            config.gateway_settings(),
        ));

        Self {
            config,
            identity,
            registry,
            gateway,
        }
    }
}
