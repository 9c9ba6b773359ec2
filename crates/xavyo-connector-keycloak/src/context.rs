//! Process-wide state shared by every request.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::KeycloakResult;
use crate::models::RealmTarget;
use crate::rate_limit::{RateLimitConfig, UserLookupLimiter};

/// Positive-only cache of client name to internal client id, per realm.
///
/// Entries are never invalidated or overwritten.
#[derive(Debug, Default)]
pub struct ClientCache {
    entries: RwLock<HashMap<(RealmTarget, String), String>>,
}

impl ClientCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, target: &RealmTarget, client_name: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&(target.clone(), client_name.to_string()))
            .cloned()
    }

    /// Record a resolved id. An existing entry wins.
    pub async fn insert(&self, target: &RealmTarget, client_name: &str, id: String) -> String {
        self.entries
            .write()
            .await
            .entry((target.clone(), client_name.to_string()))
            .or_insert(id)
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Cross-request state: the client cache and the user lookup limiter.
#[derive(Debug)]
pub struct ReconcileContext {
    pub clients: ClientCache,
    pub user_lookup: UserLookupLimiter,
}

impl ReconcileContext {
    pub fn new(rate_limit: &RateLimitConfig) -> KeycloakResult<Arc<Self>> {
        Ok(Arc::new(Self {
            clients: ClientCache::new(),
            user_lookup: UserLookupLimiter::new(rate_limit)?,
        }))
    }
}
