//! Message dispatcher: routes inbound platform events through the
//! conversation state machine to the handler valid for the user's state.

pub mod event;
pub mod outbox;
pub mod replies;

use crate::core::onboarding::{apply_input, StepInput, StepOutcome};
use crate::core::{
    calculate_bounding_box, ConversationState, MatchResult, Matcher, OnboardingRules,
    OnboardingStep, StateViolation, Transition,
};
use crate::models::{Decision, DecisionOutcome, OutboundMessage, Profile, Report, User, UserId};
use crate::services::{ProfileStore, StoreError};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub use event::{Action, Command, EventError, InboundEvent, Payload};
pub use outbox::{run_delivery, Outbox};

/// Errors returned while handling one inbound event
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("State violation: {0}")]
    StateViolation(#[from] StateViolation),

    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Profile required")]
    ProfileRequired,

    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<EventError> for DispatchError {
    fn from(err: EventError) -> Self {
        DispatchError::Validation(err.to_string())
    }
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Store(e) if e.is_retryable())
    }

    /// Reply explaining the failure to the user, if it is theirs to fix
    fn explanation(&self) -> Option<String> {
        match self {
            // Closed accounts blocked the bot, nothing can reach them
            DispatchError::StateViolation(v) if v.state == "closed" => None,
            DispatchError::StateViolation(v) => Some(replies::invalid_state(v.state)),
            DispatchError::Validation(message) => Some(message.clone()),
            DispatchError::ProfileRequired => Some(replies::PROFILE_REQUIRED.to_string()),
            DispatchError::UnknownUser(_) => Some(replies::UNKNOWN_USER.to_string()),
            DispatchError::Store(_) => None,
        }
    }
}

/// Owned wizard input extracted from a payload
#[derive(Debug, Clone, PartialEq)]
pub enum WizardInput {
    Text(String),
    Photo(String),
    Location { latitude: f64, longitude: f64 },
    Skip,
}

impl WizardInput {
    fn as_step_input(&self) -> StepInput<'_> {
        match self {
            WizardInput::Text(text) => StepInput::Text(text),
            WizardInput::Photo(file_id) => StepInput::Photo(file_id),
            WizardInput::Location { latitude, longitude } => StepInput::Location {
                latitude: *latitude,
                longitude: *longitude,
            },
            WizardInput::Skip => StepInput::Skip,
        }
    }
}

/// Handler selected for an event in a given state
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Welcome,
    Help,
    BeginOnboarding,
    Onboarding(WizardInput),
    CancelOnboarding,
    Find,
    Decide(Action),
    Relay {
        partner: UserId,
        text: String,
        open_chat: bool,
    },
    OpenChat(UserId),
    LeaveChat,
    Unmatch(UserId),
    ListMatches,
    ShowProfile,
    Report { target: UserId, reason: String },
    DeleteAccount,
    Block,
}

/// Routing table: which handler an event reaches in a given state
///
/// Pure; events that do not apply to the state fail with a `StateViolation`.
pub fn route(state: &ConversationState, payload: &Payload) -> Result<Route, DispatchError> {
    use ConversationState as S;

    let violation = || {
        DispatchError::StateViolation(StateViolation {
            state: state.name(),
            action: payload.name(),
        })
    };

    if state.is_closed() {
        return Err(violation());
    }

    let onboarding = matches!(state, S::Onboarding { .. });

    let route = match payload {
        Payload::Command(Command::Start) => Route::Welcome,
        Payload::Command(Command::Help) => Route::Help,
        Payload::Command(Command::DeleteAccount) => Route::DeleteAccount,
        Payload::BotBlocked => Route::Block,

        Payload::Text(text) if onboarding => Route::Onboarding(WizardInput::Text(text.clone())),
        Payload::Photo { file_id } if onboarding => {
            Route::Onboarding(WizardInput::Photo(file_id.clone()))
        }
        Payload::Location { latitude, longitude } if onboarding => {
            Route::Onboarding(WizardInput::Location {
                latitude: *latitude,
                longitude: *longitude,
            })
        }
        Payload::Command(Command::Skip) if onboarding => Route::Onboarding(WizardInput::Skip),
        Payload::Command(Command::Cancel) if onboarding => Route::CancelOnboarding,
        Payload::Command(Command::CreateProfile) if onboarding || state.is_idle() => {
            Route::BeginOnboarding
        }
        _ if onboarding => return Err(violation()),

        Payload::Command(Command::Find) if state.is_idle() => Route::Find,
        Payload::Command(Command::Chat(target)) if state.is_idle() => Route::OpenChat(*target),

        Payload::Action(action) => match state {
            S::Reviewing { candidate } if *candidate == action.target() => Route::Decide(*action),
            _ => return Err(violation()),
        },

        Payload::Text(text) => match state {
            S::Chatting { partner } => Route::Relay {
                partner: *partner,
                text: text.clone(),
                open_chat: false,
            },
            S::Matched { partner } => Route::Relay {
                partner: *partner,
                text: text.clone(),
                open_chat: true,
            },
            _ => return Err(violation()),
        },

        Payload::Command(Command::Leave) if matches!(state, S::Chatting { .. }) => Route::LeaveChat,
        Payload::Command(Command::Unmatch) => match state.partner() {
            Some(partner) => Route::Unmatch(partner),
            None => return Err(violation()),
        },

        Payload::Command(Command::MyProfile) => Route::ShowProfile,
        Payload::Command(Command::Matches) => Route::ListMatches,
        Payload::Command(Command::Report { target, reason }) => Route::Report {
            target: *target,
            reason: reason.clone(),
        },

        _ => return Err(violation()),
    };

    Ok(route)
}

/// Dispatcher tuning
#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    /// Profiles fetched from the store per search
    pub pool_size: usize,
    /// Messages replayed when a chat is opened
    pub history_size: usize,
    pub onboarding: OnboardingRules,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            pool_size: 200,
            history_size: 5,
            onboarding: OnboardingRules::default(),
        }
    }
}

/// State update for another user, applied after the sender's lock is released
#[derive(Debug, Clone, Copy)]
enum FollowUp {
    MatchFormed { user: UserId, partner: UserId },
    PartnerLeft { user: UserId, partner: UserId },
}

/// What a handler decided
struct Outcome {
    reply: Option<OutboundMessage>,
    /// `None` leaves the stored state untouched
    state: Option<ConversationState>,
    /// Messages to other users, queued once the state is saved
    notifications: Vec<OutboundMessage>,
    follow_ups: Vec<FollowUp>,
}

impl Outcome {
    fn reply(reply: OutboundMessage) -> Self {
        Self {
            reply: Some(reply),
            state: None,
            notifications: Vec::new(),
            follow_ups: Vec::new(),
        }
    }

    fn transition(reply: OutboundMessage, state: ConversationState) -> Self {
        Self {
            reply: Some(reply),
            state: Some(state),
            notifications: Vec::new(),
            follow_ups: Vec::new(),
        }
    }

    fn notify(mut self, notifications: impl IntoIterator<Item = OutboundMessage>) -> Self {
        self.notifications.extend(notifications);
        self
    }
}

/// Message dispatcher
///
/// Events from the same user are processed one at a time. Each event yields
/// at most one reply to the sender; notifications to other users go through
/// the outbox as they are produced.
pub struct Dispatcher {
    store: Arc<dyn ProfileStore>,
    matcher: Matcher,
    outbox: Outbox,
    settings: DispatcherSettings,
    locks: moka::future::Cache<UserId, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        matcher: Matcher,
        outbox: Outbox,
        settings: DispatcherSettings,
    ) -> Self {
        let locks = moka::future::CacheBuilder::new(100_000)
            .time_to_idle(Duration::from_secs(600))
            .build();

        Self {
            store,
            matcher,
            outbox,
            settings,
            locks,
        }
    }

    async fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        self.locks
            .get_with(user, async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Dispatch an event, replying to the sender with an explanation on
    /// user-facing errors
    pub async fn handle(&self, event: InboundEvent) -> Result<Option<OutboundMessage>, DispatchError> {
        let recipient = event.account.platform_id;
        let event_id = event.event_id.clone();

        match self.dispatch(event).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                match &err {
                    DispatchError::Store(e) => {
                        tracing::error!(event_id = %event_id, "Store failure while dispatching: {}", e);
                    }
                    other => {
                        tracing::info!(event_id = %event_id, "Event rejected: {}", other);
                    }
                }
                if let Some(text) = err.explanation() {
                    self.outbox.enqueue(OutboundMessage::reply(recipient, text));
                }
                Err(err)
            }
        }
    }

    /// Tell the sender of a malformed event what was wrong with it
    pub fn reject(&self, platform_id: i64, error: &EventError) {
        tracing::info!(platform_id, "Malformed event: {}", error);
        self.outbox
            .enqueue(OutboundMessage::reply(platform_id, error.to_string()));
    }

    /// Dispatch an event, returning the reply enqueued for the sender
    pub async fn dispatch(&self, event: InboundEvent) -> Result<Option<OutboundMessage>, DispatchError> {
        let user = self.store.ensure_user(&event.account).await?;

        let (follow_ups, reply) = {
            let lock = self.user_lock(user.id).await;
            let _guard = lock.lock().await;

            let state = self.store.load_state(user.id).await?;
            let route = route(&state, &event.payload)?;
            tracing::debug!(
                event_id = %event.event_id,
                user = %user.id,
                state = state.name(),
                "Routing to {:?}",
                route
            );

            let outcome = self.execute(&user, state.clone(), route).await?;

            if let Some(next) = &outcome.state {
                if *next != state {
                    self.store.save_state(user.id, next).await?;
                    tracing::debug!(user = %user.id, "{} -> {}", state.name(), next.name());
                }
            }
            for notification in outcome.notifications {
                self.outbox.enqueue(notification);
            }
            if let Some(reply) = &outcome.reply {
                self.outbox.enqueue(reply.clone());
            }

            (outcome.follow_ups, outcome.reply)
        };

        for follow_up in follow_ups {
            self.run_follow_up(follow_up).await;
        }

        Ok(reply)
    }

    async fn execute(
        &self,
        user: &User,
        state: ConversationState,
        route: Route,
    ) -> Result<Outcome, DispatchError> {
        let to = user.platform_id;

        match route {
            Route::Welcome => Ok(Outcome::reply(OutboundMessage::reply(to, replies::WELCOME))),
            Route::Help => Ok(Outcome::reply(OutboundMessage::reply(to, replies::HELP))),
            Route::BeginOnboarding => {
                let next = state.apply(Transition::BeginOnboarding)?;
                Ok(Outcome::transition(
                    OutboundMessage::reply(to, OnboardingStep::FIRST.prompt()),
                    next,
                ))
            }
            Route::CancelOnboarding => {
                let next = state.apply(Transition::AbandonOnboarding)?;
                Ok(Outcome::transition(
                    OutboundMessage::reply(to, replies::ONBOARDING_CANCELLED),
                    next,
                ))
            }
            Route::Onboarding(input) => self.onboard(user, state, input).await,
            Route::Find => self.find(user, state).await,
            Route::Decide(action) => self.decide(user, state, action).await,
            Route::Relay {
                partner,
                text,
                open_chat,
            } => self.relay(user, state, partner, &text, open_chat).await,
            Route::OpenChat(partner) => self.open_chat(user, state, partner).await,
            Route::LeaveChat => {
                let next = state.apply(Transition::LeaveChat)?;
                Ok(Outcome::transition(
                    OutboundMessage::reply(to, replies::LEFT_CHAT),
                    next,
                ))
            }
            Route::Unmatch(partner) => self.unmatch(user, state, partner).await,
            Route::ListMatches => self.list_matches(user).await,
            Route::ShowProfile => {
                let profile = self
                    .store
                    .get_profile(user.id)
                    .await?
                    .ok_or(DispatchError::ProfileRequired)?;
                Ok(Outcome::reply(replies::own_profile(to, user, &profile)))
            }
            Route::Report { target, reason } => self.report(user, target, reason).await,
            Route::DeleteAccount => self.delete_account(user).await,
            Route::Block => self.block(user, state).await,
        }
    }

    async fn onboard(
        &self,
        user: &User,
        state: ConversationState,
        input: WizardInput,
    ) -> Result<Outcome, DispatchError> {
        let to = user.platform_id;
        let rules = self.settings.onboarding;

        let ConversationState::Onboarding { step, draft } = &state else {
            return Err(StateViolation {
                state: state.name(),
                action: "answer the profile wizard",
            }
            .into());
        };

        match apply_input(*step, draft.clone(), input.as_step_input(), &rules) {
            Ok(StepOutcome::Next { step, draft }) => {
                let next = state.apply(Transition::Advance { step, draft })?;
                Ok(Outcome::transition(OutboundMessage::reply(to, step.prompt()), next))
            }
            Ok(StepOutcome::Complete(draft)) => {
                let profile = draft
                    .into_profile(user.id, &rules, Utc::now())
                    .map_err(|e| DispatchError::Validation(e.to_string()))?;
                self.store.save_profile(&profile).await?;
                tracing::info!(user = %user.id, "Profile saved");

                let next = state.apply(Transition::FinishOnboarding)?;
                Ok(Outcome::transition(
                    OutboundMessage::reply(to, replies::PROFILE_SAVED),
                    next,
                ))
            }
            Ok(StepOutcome::Underage) => {
                let next = state.apply(Transition::AbandonOnboarding)?;
                Ok(Outcome::transition(
                    OutboundMessage::reply(to, replies::underage(rules.min_age)),
                    next,
                ))
            }
            // Re-prompt, staying on the same step
            Err(e) => Ok(Outcome::reply(OutboundMessage::reply(to, e.to_string()))),
        }
    }

    /// Rank candidates for a user's current profile
    pub async fn rank_for(&self, user: UserId, limit: usize) -> Result<MatchResult, DispatchError> {
        let seeker = self
            .store
            .get_profile(user)
            .await?
            .ok_or(DispatchError::ProfileRequired)?;
        let (pool, decided) = self.search_inputs(&seeker).await?;
        Ok(self.matcher.rank(&seeker, pool, &decided, limit))
    }

    async fn search_inputs(
        &self,
        seeker: &Profile,
    ) -> Result<(Vec<Profile>, HashSet<UserId>), DispatchError> {
        let area = match (seeker.location, seeker.preferences.max_distance_km) {
            (Some(center), Some(km)) => Some(calculate_bounding_box(center, f64::from(km))),
            _ => None,
        };

        let pool = self
            .store
            .candidate_pool(seeker.user_id, area, self.settings.pool_size)
            .await?;
        let decided = self.store.decided_ids(seeker.user_id).await?;
        Ok((pool, decided))
    }

    async fn find(&self, user: &User, state: ConversationState) -> Result<Outcome, DispatchError> {
        let to = user.platform_id;
        let seeker = self
            .store
            .get_profile(user.id)
            .await?
            .ok_or(DispatchError::ProfileRequired)?;
        let (pool, decided) = self.search_inputs(&seeker).await?;

        let result = self.matcher.rank(&seeker, pool.clone(), &decided, 1);
        tracing::debug!(
            user = %user.id,
            "Ranked {} candidates, {} eligible",
            result.total_considered,
            result.candidates.len()
        );

        let best = result
            .candidates
            .first()
            .and_then(|score| {
                pool.iter()
                    .find(|p| p.user_id == score.candidate)
                    .map(|profile| (score, profile))
            });

        match best {
            Some((score, profile)) => {
                let next = state.apply(Transition::Present {
                    candidate: profile.user_id,
                })?;
                Ok(Outcome::transition(
                    replies::candidate_card(to, profile, score),
                    next,
                ))
            }
            None => Ok(Outcome::reply(OutboundMessage::reply(to, replies::NO_CANDIDATES))),
        }
    }

    async fn decide(
        &self,
        user: &User,
        state: ConversationState,
        action: Action,
    ) -> Result<Outcome, DispatchError> {
        let to = user.platform_id;
        let candidate = action.target();
        let decision = match action {
            Action::Like(_) => Decision::Like,
            Action::Pass(_) => Decision::Pass,
        };

        let outcome = match self.store.record_decision(user.id, candidate, decision).await {
            Ok(outcome) => outcome,
            Err(StoreError::NotFound(_)) => {
                // The candidate deleted their account while being reviewed
                let next = state.apply(Transition::Pass { candidate })?;
                return Ok(Outcome::transition(
                    OutboundMessage::reply(to, replies::UNKNOWN_USER),
                    next,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            DecisionOutcome::Passed => {
                let next = state.apply(Transition::Pass { candidate })?;
                Ok(Outcome::transition(OutboundMessage::reply(to, replies::PASSED), next))
            }
            DecisionOutcome::Liked => {
                let next = state.apply(Transition::Like {
                    candidate,
                    mutual: false,
                })?;
                Ok(Outcome::transition(OutboundMessage::reply(to, replies::LIKED), next))
            }
            DecisionOutcome::Matched(created) => {
                let next = state.apply(Transition::Like {
                    candidate,
                    mutual: true,
                })?;
                tracing::info!(match_id = created.id, "Match between {} and {}", user.id, candidate);

                let mut notifications = Vec::new();
                if let Some(partner) = self.store.find_user(candidate).await? {
                    notifications.push(OutboundMessage::notification(
                        to,
                        replies::match_notification(&partner.display_name),
                    ));
                    notifications.push(OutboundMessage::notification(
                        partner.platform_id,
                        replies::match_notification(&user.display_name),
                    ));
                }

                Ok(Outcome {
                    reply: Some(OutboundMessage::reply(to, replies::MATCHED)),
                    state: Some(next),
                    notifications,
                    follow_ups: vec![FollowUp::MatchFormed {
                        user: candidate,
                        partner: user.id,
                    }],
                })
            }
        }
    }

    async fn relay(
        &self,
        user: &User,
        state: ConversationState,
        partner: UserId,
        text: &str,
        open_chat: bool,
    ) -> Result<Outcome, DispatchError> {
        let to = user.platform_id;

        let Some(active) = self.store.active_match_between(user.id, partner).await? else {
            return Ok(Outcome::transition(
                OutboundMessage::reply(to, replies::NOT_A_MATCH),
                state.on_partner_left(partner),
            ));
        };

        let next = if open_chat {
            state.apply(Transition::OpenChat { partner })?
        } else {
            state
        };

        self.store.append_message(active.id, user.id, text).await?;

        let recipient = self
            .store
            .find_user(partner)
            .await?
            .ok_or(DispatchError::UnknownUser(partner))?;
        let relayed = OutboundMessage::notification(
            recipient.platform_id,
            replies::relayed(&user.display_name, text),
        );

        Ok(Outcome::transition(OutboundMessage::reply(to, replies::MESSAGE_SENT), next)
            .notify([relayed]))
    }

    async fn open_chat(
        &self,
        user: &User,
        state: ConversationState,
        partner: UserId,
    ) -> Result<Outcome, DispatchError> {
        let Some(active) = self.store.active_match_between(user.id, partner).await? else {
            return Err(DispatchError::Validation(replies::NOT_A_MATCH.to_string()));
        };
        let next = state.apply(Transition::OpenChat { partner })?;

        let name = self
            .store
            .find_user(partner)
            .await?
            .map(|p| p.display_name)
            .unwrap_or_else(|| partner.to_string());

        let mut text = replies::now_chatting(&name);
        let history = self
            .store
            .session(active.id, self.settings.history_size)
            .await?;
        for message in &history {
            let sender = if message.sender == user.id { "You" } else { name.as_str() };
            let _ = write!(text, "\n{}: {}", sender, message.body);
        }

        Ok(Outcome::transition(
            OutboundMessage::reply(user.platform_id, text),
            next,
        ))
    }

    async fn unmatch(
        &self,
        user: &User,
        state: ConversationState,
        partner: UserId,
    ) -> Result<Outcome, DispatchError> {
        let next = state.apply(Transition::Unmatch)?;

        let mut notifications = Vec::new();
        if self.store.archive_match(user.id, partner).await?.is_some() {
            tracing::info!("{} unmatched {}", user.id, partner);
            notifications.extend(self.partner_left_notice(user, partner).await?);
        }

        Ok(Outcome {
            reply: Some(OutboundMessage::reply(user.platform_id, replies::UNMATCHED)),
            state: Some(next),
            notifications,
            follow_ups: vec![FollowUp::PartnerLeft {
                user: partner,
                partner: user.id,
            }],
        })
    }

    async fn partner_left_notice(
        &self,
        user: &User,
        partner: UserId,
    ) -> Result<Option<OutboundMessage>, DispatchError> {
        Ok(self.store.find_user(partner).await?.map(|partner| {
            OutboundMessage::notification(
                partner.platform_id,
                replies::partner_left(&user.display_name),
            )
        }))
    }

    async fn list_matches(&self, user: &User) -> Result<Outcome, DispatchError> {
        let matches = self.store.active_matches(user.id).await?;

        let mut named = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(partner) = m.partner_of(user.id) else {
                continue;
            };
            let name = self
                .store
                .find_user(partner)
                .await?
                .map(|p| p.display_name)
                .unwrap_or_default();
            named.push((m, name));
        }

        Ok(Outcome::reply(replies::match_list(user.platform_id, user.id, &named)))
    }

    async fn report(
        &self,
        user: &User,
        target: UserId,
        reason: String,
    ) -> Result<Outcome, DispatchError> {
        if target == user.id {
            return Err(DispatchError::Validation("You can't report yourself.".to_string()));
        }
        if self.store.find_user(target).await?.is_none() {
            return Err(DispatchError::UnknownUser(target));
        }

        self.store
            .file_report(&Report {
                reporter: user.id,
                reported: target,
                reason,
                created_at: Utc::now(),
            })
            .await?;
        tracing::warn!(reporter = %user.id, reported = %target, "User reported");

        Ok(Outcome::reply(OutboundMessage::reply(user.platform_id, replies::REPORTED)))
    }

    async fn delete_account(&self, user: &User) -> Result<Outcome, DispatchError> {
        let partners = self.active_partners(user.id).await?;
        let notifications = self.partner_left_notices(user, &partners).await?;

        self.store.delete_account(user.id).await?;
        tracing::info!(user = %user.id, "Account deleted");

        Ok(Outcome {
            reply: Some(OutboundMessage::reply(user.platform_id, replies::DELETED)),
            state: None,
            notifications,
            follow_ups: partners
                .into_iter()
                .map(|partner| FollowUp::PartnerLeft {
                    user: partner,
                    partner: user.id,
                })
                .collect(),
        })
    }

    async fn block(&self, user: &User, state: ConversationState) -> Result<Outcome, DispatchError> {
        let next = state.apply(Transition::Close)?;
        let partners = self.active_partners(user.id).await?;

        self.store.close_account(user.id).await?;
        tracing::info!(user = %user.id, "Account closed after the bot was blocked");

        let notifications = self.partner_left_notices(user, &partners).await?;

        Ok(Outcome {
            reply: None,
            state: Some(next),
            notifications,
            follow_ups: partners
                .into_iter()
                .map(|partner| FollowUp::PartnerLeft {
                    user: partner,
                    partner: user.id,
                })
                .collect(),
        })
    }

    async fn partner_left_notices(
        &self,
        user: &User,
        partners: &[UserId],
    ) -> Result<Vec<OutboundMessage>, DispatchError> {
        let mut notices = Vec::with_capacity(partners.len());
        for partner in partners {
            notices.extend(self.partner_left_notice(user, *partner).await?);
        }
        Ok(notices)
    }

    async fn active_partners(&self, user: UserId) -> Result<Vec<UserId>, DispatchError> {
        Ok(self
            .store
            .active_matches(user)
            .await?
            .iter()
            .filter_map(|m| m.partner_of(user))
            .collect())
    }

    async fn run_follow_up(&self, follow_up: FollowUp) {
        let (user, result) = match follow_up {
            FollowUp::MatchFormed { user, partner } => (
                user,
                self.update_state(user, |state| state.on_match_formed(partner)).await,
            ),
            FollowUp::PartnerLeft { user, partner } => (
                user,
                self.update_state(user, |state| state.on_partner_left(partner)).await,
            ),
        };

        if let Err(e) = result {
            tracing::warn!(user = %user, "Failed to update partner state: {}", e);
        }
    }

    async fn update_state<F>(&self, user: UserId, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(ConversationState) -> ConversationState,
    {
        let lock = self.user_lock(user).await;
        let _guard = lock.lock().await;

        let state = self.store.load_state(user).await?;
        let next = update(state.clone());
        if next != state {
            self.store.save_state(user, &next).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProfileDraft;

    fn command(command: Command) -> Payload {
        Payload::Command(command)
    }

    #[test]
    fn test_closed_rejects_everything() {
        let payloads = [
            command(Command::Start),
            command(Command::Find),
            Payload::Text("hi".to_string()),
            Payload::BotBlocked,
            Payload::Action(Action::Like(UserId(2))),
        ];
        for payload in payloads {
            assert!(matches!(
                route(&ConversationState::Closed, &payload),
                Err(DispatchError::StateViolation(_))
            ));
        }
    }

    #[test]
    fn test_text_routing() {
        let text = Payload::Text("hello".to_string());

        assert!(matches!(
            route(&ConversationState::Browsing, &text),
            Err(DispatchError::StateViolation(StateViolation { state: "browsing", .. }))
        ));
        assert_eq!(
            route(&ConversationState::Chatting { partner: UserId(4) }, &text).unwrap(),
            Route::Relay {
                partner: UserId(4),
                text: "hello".to_string(),
                open_chat: false
            }
        );
        assert_eq!(
            route(&ConversationState::Matched { partner: UserId(4) }, &text).unwrap(),
            Route::Relay {
                partner: UserId(4),
                text: "hello".to_string(),
                open_chat: true
            }
        );

        let onboarding = ConversationState::Onboarding {
            step: OnboardingStep::Name,
            draft: ProfileDraft::default(),
        };
        assert_eq!(
            route(&onboarding, &text).unwrap(),
            Route::Onboarding(WizardInput::Text("hello".to_string()))
        );
    }

    #[test]
    fn test_actions_only_while_reviewing_that_candidate() {
        let reviewing = ConversationState::Reviewing {
            candidate: UserId(9),
        };

        assert_eq!(
            route(&reviewing, &Payload::Action(Action::Like(UserId(9)))).unwrap(),
            Route::Decide(Action::Like(UserId(9)))
        );
        assert!(route(&reviewing, &Payload::Action(Action::Pass(UserId(8)))).is_err());
        assert!(route(
            &ConversationState::Browsing,
            &Payload::Action(Action::Like(UserId(9)))
        )
        .is_err());
    }

    #[test]
    fn test_find_requires_idle_state() {
        assert_eq!(
            route(&ConversationState::Skipped, &command(Command::Find)).unwrap(),
            Route::Find
        );
        assert!(route(
            &ConversationState::Reviewing {
                candidate: UserId(1)
            },
            &command(Command::Find)
        )
        .is_err());
        assert!(route(
            &ConversationState::Chatting { partner: UserId(1) },
            &command(Command::Find)
        )
        .is_err());
    }

    #[test]
    fn test_onboarding_routing() {
        let onboarding = ConversationState::Onboarding {
            step: OnboardingStep::Photo,
            draft: ProfileDraft::default(),
        };

        assert_eq!(
            route(&onboarding, &command(Command::Skip)).unwrap(),
            Route::Onboarding(WizardInput::Skip)
        );
        assert_eq!(
            route(&onboarding, &command(Command::Cancel)).unwrap(),
            Route::CancelOnboarding
        );
        assert_eq!(route(&onboarding, &command(Command::Help)).unwrap(), Route::Help);
        assert!(route(&onboarding, &command(Command::Find)).is_err());
        assert!(route(&onboarding, &command(Command::MyProfile)).is_err());

        assert!(route(
            &ConversationState::Browsing,
            &Payload::Photo {
                file_id: "p".to_string()
            }
        )
        .is_err());
        assert!(route(&ConversationState::Browsing, &command(Command::Cancel)).is_err());
    }

    #[test]
    fn test_chat_commands() {
        let chatting = ConversationState::Chatting { partner: UserId(3) };

        assert_eq!(route(&chatting, &command(Command::Leave)).unwrap(), Route::LeaveChat);
        assert_eq!(
            route(&chatting, &command(Command::Unmatch)).unwrap(),
            Route::Unmatch(UserId(3))
        );
        assert!(route(&ConversationState::Browsing, &command(Command::Leave)).is_err());
        assert!(route(&ConversationState::Browsing, &command(Command::Unmatch)).is_err());
        assert_eq!(
            route(&ConversationState::Browsing, &command(Command::Chat(UserId(3)))).unwrap(),
            Route::OpenChat(UserId(3))
        );
    }
}
