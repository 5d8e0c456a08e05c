use crate::core::{is_within_bounding_box, ConversationState};
use crate::models::{
    AccountStatus, BoundingBox, ChatMessage, Decision, DecisionOutcome, Match, PlatformAccount,
    Profile, Report, User, UserId,
};
use crate::services::store::{ProfileStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    next_user_id: i64,
    next_match_id: i64,
    next_message_id: i64,
    users: HashMap<UserId, User>,
    platform_index: HashMap<i64, UserId>,
    profiles: HashMap<UserId, Profile>,
    decisions: HashMap<(UserId, UserId), Decision>,
    matches: Vec<Match>,
    messages: Vec<ChatMessage>,
    reports: Vec<Report>,
    states: HashMap<UserId, ConversationState>,
}

impl MemoryState {
    fn active_match_between(&self, a: UserId, b: UserId) -> Option<&Match> {
        let (low, high) = Match::normalize(a, b);
        self.matches
            .iter()
            .find(|m| m.active && m.user_low == low && m.user_high == high)
    }

    fn decided_by(&self, seeker: UserId) -> HashSet<UserId> {
        let mut decided: HashSet<UserId> = self
            .decisions
            .keys()
            .filter(|(from, _)| *from == seeker)
            .map(|(_, to)| *to)
            .collect();
        decided.extend(self.matches.iter().filter_map(|m| m.partner_of(seeker)));
        decided.extend(
            self.reports
                .iter()
                .filter(|r| r.reporter == seeker)
                .map(|r| r.reported),
        );
        decided
    }

    fn archive_matches_of(&mut self, user: UserId) {
        let now = Utc::now();
        for m in self.matches.iter_mut().filter(|m| m.active && m.involves(user)) {
            m.active = false;
            m.archived_at = Some(now);
        }
    }
}

/// In-process profile store
///
/// A single mutex guards all state, so every operation (including match
/// creation) is atomic. Used by tests and by `database.backend = "memory"`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports filed against a user
    pub async fn report_count(&self, user: UserId) -> usize {
        let state = self.inner.lock().await;
        state.reports.iter().filter(|r| r.reported == user).count()
    }

    /// All matches ever created, including archived ones
    pub async fn all_matches(&self) -> Vec<Match> {
        self.inner.lock().await.matches.clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn ensure_user(&self, account: &PlatformAccount) -> Result<User, StoreError> {
        let mut state = self.inner.lock().await;

        if let Some(id) = state.platform_index.get(&account.platform_id).copied() {
            if let Some(user) = state.users.get_mut(&id) {
                user.username = account.username.clone();
                if user.display_name.is_empty() {
                    user.display_name = account.display_name.clone();
                }
                return Ok(user.clone());
            }
        }

        state.next_user_id += 1;
        let user = User {
            id: UserId(state.next_user_id),
            platform_id: account.platform_id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };
        state.platform_index.insert(account.platform_id, user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        let Some(user) = state.users.get_mut(&profile.user_id) else {
            return Err(StoreError::NotFound(format!("user {}", profile.user_id)));
        };
        user.display_name = profile.display_name.clone();

        let mut stored = profile.clone();
        stored.updated_at = Utc::now();
        state.profiles.insert(profile.user_id, stored);
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.inner.lock().await.profiles.get(&id).cloned())
    }

    async fn candidate_pool(
        &self,
        seeker: UserId,
        area: Option<BoundingBox>,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        let state = self.inner.lock().await;
        let decided = state.decided_by(seeker);
        let mut pool: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| p.user_id != seeker && !decided.contains(&p.user_id))
            .filter(|p| {
                state
                    .users
                    .get(&p.user_id)
                    .map(User::is_active)
                    .unwrap_or(false)
            })
            .filter(|p| match (area, p.location) {
                (Some(bbox), Some(point)) => is_within_bounding_box(point, &bbox),
                _ => true,
            })
            .cloned()
            .collect();

        pool.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        pool.truncate(limit);
        Ok(pool)
    }

    async fn decided_ids(&self, seeker: UserId) -> Result<HashSet<UserId>, StoreError> {
        Ok(self.inner.lock().await.decided_by(seeker))
    }

    async fn record_decision(
        &self,
        from: UserId,
        to: UserId,
        decision: Decision,
    ) -> Result<DecisionOutcome, StoreError> {
        if from == to {
            return Err(StoreError::InvalidInput("cannot decide on yourself".to_string()));
        }

        let mut state = self.inner.lock().await;
        if !state.users.get(&to).map(User::is_active).unwrap_or(false) {
            return Err(StoreError::NotFound(format!("user {}", to)));
        }
        state.decisions.insert((from, to), decision);

        if decision == Decision::Pass {
            return Ok(DecisionOutcome::Passed);
        }

        let reciprocated = state.decisions.get(&(to, from)) == Some(&Decision::Like);
        if !reciprocated {
            return Ok(DecisionOutcome::Liked);
        }

        if let Some(existing) = state.active_match_between(from, to) {
            return Ok(DecisionOutcome::Matched(existing.clone()));
        }

        state.next_match_id += 1;
        let (user_low, user_high) = Match::normalize(from, to);
        let created = Match {
            id: state.next_match_id,
            user_low,
            user_high,
            active: true,
            created_at: Utc::now(),
            archived_at: None,
        };
        state.matches.push(created.clone());
        Ok(DecisionOutcome::Matched(created))
    }

    async fn active_matches(&self, user: UserId) -> Result<Vec<Match>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.active && m.involves(user))
            .cloned()
            .collect())
    }

    async fn active_match_between(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError> {
        Ok(self.inner.lock().await.active_match_between(a, b).cloned())
    }

    async fn archive_match(&self, a: UserId, b: UserId) -> Result<Option<Match>, StoreError> {
        let mut state = self.inner.lock().await;
        let (low, high) = Match::normalize(a, b);
        let archived = state
            .matches
            .iter_mut()
            .find(|m| m.active && m.user_low == low && m.user_high == high)
            .map(|m| {
                m.active = false;
                m.archived_at = Some(Utc::now());
                m.clone()
            });
        Ok(archived)
    }

    async fn append_message(
        &self,
        match_id: i64,
        sender: UserId,
        body: &str,
    ) -> Result<ChatMessage, StoreError> {
        let mut state = self.inner.lock().await;
        let active = state
            .matches
            .iter()
            .any(|m| m.id == match_id && m.active && m.involves(sender));
        if !active {
            return Err(StoreError::NotFound(format!("active match {}", match_id)));
        }

        state.next_message_id += 1;
        let message = ChatMessage {
            id: state.next_message_id,
            match_id,
            sender,
            body: body.to_string(),
            sent_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn session(&self, match_id: i64, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.inner.lock().await;
        let messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.match_id == match_id)
            .cloned()
            .collect();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn load_state(&self, user: UserId) -> Result<ConversationState, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.states.get(&user).cloned().unwrap_or_default())
    }

    async fn save_state(&self, user: UserId, conversation: &ConversationState) -> Result<(), StoreError> {
        self.inner.lock().await.states.insert(user, conversation.clone());
        Ok(())
    }

    async fn file_report(&self, report: &Report) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&report.reported) {
            return Err(StoreError::NotFound(format!("user {}", report.reported)));
        }
        state.reports.push(report.clone());
        Ok(())
    }

    async fn close_account(&self, user: UserId) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        match state.users.get_mut(&user) {
            Some(record) => record.status = AccountStatus::Closed,
            None => return Err(StoreError::NotFound(format!("user {}", user))),
        }
        state.archive_matches_of(user);
        state.states.insert(user, ConversationState::Closed);
        Ok(())
    }

    async fn delete_account(&self, user: UserId) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        let Some(record) = state.users.remove(&user) else {
            return Err(StoreError::NotFound(format!("user {}", user)));
        };
        state.platform_index.remove(&record.platform_id);
        state.profiles.remove(&user);
        state.decisions.retain(|(from, to), _| *from != user && *to != user);

        let removed_matches: HashSet<i64> = state
            .matches
            .iter()
            .filter(|m| m.involves(user))
            .map(|m| m.id)
            .collect();
        state.matches.retain(|m| !m.involves(user));
        state.messages.retain(|m| !removed_matches.contains(&m.match_id));
        state.reports.retain(|r| r.reporter != user && r.reported != user);
        state.states.remove(&user);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Preferences};
    use std::sync::Arc;

    fn account(platform_id: i64) -> PlatformAccount {
        PlatformAccount {
            platform_id,
            username: Some(format!("user{}", platform_id)),
            display_name: format!("User {}", platform_id),
        }
    }

    fn profile(user_id: UserId) -> Profile {
        Profile {
            user_id,
            display_name: format!("User {}", user_id.0),
            age: 30,
            gender: Gender::Female,
            bio: "hello".to_string(),
            interests: Default::default(),
            location: None,
            photo_file_id: None,
            preferences: Preferences {
                genders: Default::default(),
                min_age: 18,
                max_age: 99,
                max_distance_km: None,
            },
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.ensure_user(&account(10)).await.unwrap();
        let second = store.ensure_user(&account(10)).await.unwrap();
        let other = store.ensure_user(&account(11)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_single_sided_like_never_matches() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;

        let outcome = store.record_decision(a, b, Decision::Like).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Liked);

        let outcome = store.record_decision(b, a, Decision::Pass).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Passed);

        assert!(store.active_matches(a).await.unwrap().is_empty());
        assert!(store.all_matches().await.is_empty());
    }

    #[tokio::test]
    async fn test_reciprocal_like_matches_once() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;

        store.record_decision(a, b, Decision::Like).await.unwrap();
        let outcome = store.record_decision(b, a, Decision::Like).await.unwrap();
        assert!(matches!(outcome, DecisionOutcome::Matched(_)));

        // liking again does not create a second match
        store.record_decision(a, b, Decision::Like).await.unwrap();
        assert_eq!(store.all_matches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_likes_create_one_match() {
        let store = Arc::new(MemoryStore::new());
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            handles.push(tokio::spawn(async move {
                store.record_decision(from, to, Decision::Like).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let matches = store.all_matches().await;
        assert_eq!(matches.len(), 1);
        assert!(matches[0].active);
    }

    #[tokio::test]
    async fn test_decided_ids_include_likes_passes_and_reports() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;
        let c = store.ensure_user(&account(3)).await.unwrap().id;
        let d = store.ensure_user(&account(4)).await.unwrap().id;

        store.record_decision(a, b, Decision::Like).await.unwrap();
        store.record_decision(a, c, Decision::Pass).await.unwrap();
        store
            .file_report(&Report {
                reporter: a,
                reported: d,
                reason: "spam".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let decided = store.decided_ids(a).await.unwrap();
        assert_eq!(decided, [b, c, d].into_iter().collect());
        assert!(store.decided_ids(b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_account_archives_matches() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;
        store.record_decision(a, b, Decision::Like).await.unwrap();
        store.record_decision(b, a, Decision::Like).await.unwrap();

        store.close_account(a).await.unwrap();

        assert!(store.active_matches(b).await.unwrap().is_empty());
        assert_eq!(store.load_state(a).await.unwrap(), ConversationState::Closed);
        assert!(!store.find_user(a).await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_delete_account_purges() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;
        store.record_decision(a, b, Decision::Like).await.unwrap();
        store.record_decision(b, a, Decision::Like).await.unwrap();

        store.delete_account(a).await.unwrap();

        assert!(store.find_user(a).await.unwrap().is_none());
        assert!(store.decided_ids(b).await.unwrap().is_empty());
        // same platform account comes back as a new user
        let again = store.ensure_user(&account(1)).await.unwrap();
        assert_ne!(again.id, a);
    }

    #[tokio::test]
    async fn test_session_returns_latest_in_order() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;
        store.record_decision(a, b, Decision::Like).await.unwrap();
        let DecisionOutcome::Matched(m) = store.record_decision(b, a, Decision::Like).await.unwrap() else {
            panic!("expected a match");
        };

        for body in ["one", "two", "three"] {
            store.append_message(m.id, a, body).await.unwrap();
        }

        let session = store.session(m.id, 2).await.unwrap();
        let bodies: Vec<&str> = session.iter().map(|msg| msg.body.as_str()).collect();
        assert_eq!(bodies, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn test_candidate_pool_skips_decided_before_limit() {
        let store = MemoryStore::new();
        let seeker = store.ensure_user(&account(1)).await.unwrap().id;
        let mut others = Vec::new();
        for platform_id in 2..=4 {
            let id = store.ensure_user(&account(platform_id)).await.unwrap().id;
            store.save_profile(&profile(id)).await.unwrap();
            others.push(id);
        }

        // The two most recently updated profiles are decided on
        store.record_decision(seeker, others[2], Decision::Pass).await.unwrap();
        store.record_decision(seeker, others[1], Decision::Like).await.unwrap();

        let pool = store.candidate_pool(seeker, None, 2).await.unwrap();
        let ids: Vec<UserId> = pool.iter().map(|p| p.user_id).collect();
        assert_eq!(ids, vec![others[0]]);
    }

    #[tokio::test]
    async fn test_decision_on_closed_user_is_not_found() {
        let store = MemoryStore::new();
        let a = store.ensure_user(&account(1)).await.unwrap().id;
        let b = store.ensure_user(&account(2)).await.unwrap().id;

        store.record_decision(b, a, Decision::Like).await.unwrap();
        store.close_account(b).await.unwrap();

        let result = store.record_decision(a, b, Decision::Like).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.all_matches().await.is_empty());
    }
}
