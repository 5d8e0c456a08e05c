use crate::core::ConversationState;
use crate::models::{
    BoundingBox, ChatMessage, Decision, DecisionOutcome, Match, PlatformAccount, Profile, Report,
    User, UserId,
};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by profile store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Profile store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Transient infrastructure failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23503") => {
                StoreError::NotFound(db.message().to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Persistence for users, profiles, decisions, matches and conversation state
///
/// Implementations must make `record_decision` an atomic check-then-create:
/// two concurrent reciprocal likes produce exactly one active match.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Find the user for a platform account, creating it on first contact
    async fn ensure_user(&self, account: &PlatformAccount) -> Result<User, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Insert or replace a profile, bumping its update time
    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Profiles of active users other than `seeker`, most recently updated first
    ///
    /// Users the seeker already decided on are left out before `limit` applies.
    /// When `area` is given, profiles with a location outside it are skipped;
    /// profiles without a location are always included.
    async fn candidate_pool(
        &self,
        seeker: UserId,
        area: Option<BoundingBox>,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError>;

    /// Users `seeker` liked, passed, matched with or reported
    async fn decided_ids(&self, seeker: UserId) -> Result<HashSet<UserId>, StoreError>;

    /// Record a like or pass, creating the match when a like is reciprocated
    ///
    /// A target that is missing or no longer active is `NotFound`.
    async fn record_decision(
        &self,
        from: UserId,
        to: UserId,
        decision: Decision,
    ) -> Result<DecisionOutcome, StoreError>;

    async fn active_matches(&self, user: UserId) -> Result<Vec<Match>, StoreError>;

    async fn active_match_between(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError>;

    /// Archive the active match between two users, returning it if there was one
    async fn archive_match(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError>;

    async fn append_message(
        &self,
        match_id: i64,
        sender: UserId,
        body: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// Most recent `limit` messages of a match, oldest first
    async fn session(&self, match_id: i64, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;

    /// Current conversation state; `Browsing` for users without one
    async fn load_state(&self, user: UserId) -> Result<ConversationState, StoreError>;

    async fn save_state(&self, user: UserId, state: &ConversationState) -> Result<(), StoreError>;

    async fn file_report(&self, report: &Report) -> Result<(), StoreError>;

    /// Mark the account closed and archive its active matches
    async fn close_account(&self, user: UserId) -> Result<(), StoreError>;

    /// Remove the user and everything recorded about them
    async fn delete_account(&self, user: UserId) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
