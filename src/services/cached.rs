use crate::core::ConversationState;
use crate::models::{
    BoundingBox, ChatMessage, Decision, DecisionOutcome, Match, PlatformAccount, Profile, Report,
    User, UserId,
};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::store::{ProfileStore, StoreError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Profile store wrapper serving `get_profile` through the cache
///
/// Writes go straight to the inner store and invalidate the cached profile.
/// Cache failures are logged and fall back to the inner store.
pub struct CachedStore {
    inner: Arc<dyn ProfileStore>,
    cache: Arc<CacheManager>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn ProfileStore>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }

    async fn invalidate(&self, user: UserId) {
        if let Err(e) = self.cache.delete(&CacheKey::profile(user)).await {
            tracing::warn!("Failed to invalidate cached profile {}: {}", user, e);
        }
    }
}

#[async_trait]
impl ProfileStore for CachedStore {
    async fn ensure_user(&self, account: &PlatformAccount) -> Result<User, StoreError> {
        self.inner.ensure_user(account).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.find_user(id).await
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.inner.save_profile(profile).await?;
        self.invalidate(profile.user_id).await;
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        let key = CacheKey::profile(id);
        if let Ok(profile) = self.cache.get::<Profile>(&key).await {
            return Ok(Some(profile));
        }

        let profile = self.inner.get_profile(id).await?;
        if let Some(profile) = &profile {
            if let Err(e) = self.cache.set(&key, profile).await {
                tracing::warn!("Failed to cache profile {}: {}", id, e);
            }
        }
        Ok(profile)
    }

    async fn candidate_pool(
        &self,
        seeker: UserId,
        area: Option<BoundingBox>,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        self.inner.candidate_pool(seeker, area, limit).await
    }

    async fn decided_ids(&self, seeker: UserId) -> Result<HashSet<UserId>, StoreError> {
        self.inner.decided_ids(seeker).await
    }

    async fn record_decision(
        &self,
        from: UserId,
        to: UserId,
        decision: Decision,
    ) -> Result<DecisionOutcome, StoreError> {
        self.inner.record_decision(from, to, decision).await
    }

    async fn active_matches(&self, user: UserId) -> Result<Vec<Match>, StoreError> {
        self.inner.active_matches(user).await
    }

    async fn active_match_between(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError> {
        self.inner.active_match_between(a, b).await
    }

    async fn archive_match(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError> {
        self.inner.archive_match(a, b).await
    }

    async fn append_message(
        &self,
        match_id: i64,
        sender: UserId,
        body: &str,
    ) -> Result<ChatMessage, StoreError> {
        self.inner.append_message(match_id, sender, body).await
    }

    async fn session(&self, match_id: i64, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        self.inner.session(match_id, limit).await
    }

    async fn load_state(&self, user: UserId) -> Result<ConversationState, StoreError> {
        self.inner.load_state(user).await
    }

    async fn save_state(&self, user: UserId, state: &ConversationState) -> Result<(), StoreError> {
        self.inner.save_state(user, state).await
    }

    async fn file_report(&self, report: &Report) -> Result<(), StoreError> {
        self.inner.file_report(report).await
    }

    async fn close_account(&self, user: UserId) -> Result<(), StoreError> {
        self.inner.close_account(user).await?;
        self.invalidate(user).await;
        Ok(())
    }

    async fn delete_account(&self, user: UserId) -> Result<(), StoreError> {
        self.inner.delete_account(user).await?;
        self.invalidate(user).await;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.inner.health_check().await
    }
}
