use crate::core::onboarding::{OnboardingStep, ProfileDraft};
use crate::models::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a user currently is in their interaction with the bot
///
/// ```text
/// Browsing ──Present──▶ Reviewing ──Like(mutual)──▶ Matched ──OpenChat──▶ Chatting
///    ▲                     │  └──Like(one-sided)──▶ Browsing
///    │                     └──Pass──▶ Skipped
///    └── LeaveChat / Unmatch ◀── Matched | Chatting
/// any ──Close──▶ Closed (terminal)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationState {
    Onboarding {
        step: OnboardingStep,
        #[serde(default)]
        draft: ProfileDraft,
    },
    Browsing,
    Reviewing {
        candidate: UserId,
    },
    Matched {
        partner: UserId,
    },
    Skipped,
    Chatting {
        partner: UserId,
    },
    Closed,
}

impl Default for ConversationState {
    fn default() -> Self {
        ConversationState::Browsing
    }
}

/// User decisions and platform events that move a user between states
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    BeginOnboarding,
    Advance {
        step: OnboardingStep,
        draft: ProfileDraft,
    },
    FinishOnboarding,
    AbandonOnboarding,
    Present {
        candidate: UserId,
    },
    Like {
        candidate: UserId,
        mutual: bool,
    },
    Pass {
        candidate: UserId,
    },
    OpenChat {
        partner: UserId,
    },
    LeaveChat,
    Unmatch,
    Close,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::BeginOnboarding => "begin_onboarding",
            Transition::Advance { .. } => "advance_onboarding",
            Transition::FinishOnboarding => "finish_onboarding",
            Transition::AbandonOnboarding => "abandon_onboarding",
            Transition::Present { .. } => "present_candidate",
            Transition::Like { .. } => "like",
            Transition::Pass { .. } => "pass",
            Transition::OpenChat { .. } => "open_chat",
            Transition::LeaveChat => "leave_chat",
            Transition::Unmatch => "unmatch",
            Transition::Close => "close",
        }
    }
}

/// An action that is not valid in the user's current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} while {state}")]
pub struct StateViolation {
    pub state: &'static str,
    pub action: &'static str,
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Onboarding { .. } => "onboarding",
            ConversationState::Browsing => "browsing",
            ConversationState::Reviewing { .. } => "reviewing",
            ConversationState::Matched { .. } => "matched",
            ConversationState::Skipped => "skipped",
            ConversationState::Chatting { .. } => "chatting",
            ConversationState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConversationState::Closed)
    }

    /// States from which a user may start looking at candidates or open a chat
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            ConversationState::Browsing | ConversationState::Skipped | ConversationState::Matched { .. }
        )
    }

    /// The partner the user is currently matched or chatting with
    pub fn partner(&self) -> Option<UserId> {
        match self {
            ConversationState::Matched { partner } | ConversationState::Chatting { partner } => {
                Some(*partner)
            }
            _ => None,
        }
    }

    /// Apply a user-driven transition
    pub fn apply(self, transition: Transition) -> Result<Self, StateViolation> {
        use ConversationState as S;

        let violation = StateViolation {
            state: self.name(),
            action: transition.name(),
        };

        match (self, transition) {
            (S::Closed, _) => Err(violation),

            (_, Transition::Close) => Ok(S::Closed),

            (S::Browsing | S::Skipped | S::Matched { .. } | S::Onboarding { .. }, Transition::BeginOnboarding) => {
                Ok(S::Onboarding {
                    step: OnboardingStep::FIRST,
                    draft: ProfileDraft::default(),
                })
            }
            (S::Onboarding { .. }, Transition::Advance { step, draft }) => {
                Ok(S::Onboarding { step, draft })
            }
            (S::Onboarding { .. }, Transition::FinishOnboarding | Transition::AbandonOnboarding) => {
                Ok(S::Browsing)
            }

            (S::Browsing | S::Skipped | S::Matched { .. }, Transition::Present { candidate }) => {
                Ok(S::Reviewing { candidate })
            }
            (S::Reviewing { candidate }, Transition::Like { candidate: liked, mutual })
                if candidate == liked =>
            {
                if mutual {
                    Ok(S::Matched { partner: candidate })
                } else {
                    Ok(S::Browsing)
                }
            }
            (S::Reviewing { candidate }, Transition::Pass { candidate: passed })
                if candidate == passed =>
            {
                Ok(S::Skipped)
            }

            (S::Matched { partner }, Transition::OpenChat { partner: target }) if partner == target => {
                Ok(S::Chatting { partner })
            }
            (S::Browsing | S::Skipped | S::Matched { .. }, Transition::OpenChat { partner }) => {
                Ok(S::Chatting { partner })
            }
            (S::Chatting { .. }, Transition::LeaveChat) => Ok(S::Browsing),
            (S::Matched { .. } | S::Chatting { .. }, Transition::Unmatch) => Ok(S::Browsing),

            _ => Err(violation),
        }
    }

    /// System-side update after a match with `partner` formed
    ///
    /// Never fails; users busy with something else keep their state.
    pub fn on_match_formed(self, partner: UserId) -> Self {
        match self {
            ConversationState::Browsing | ConversationState::Skipped => {
                ConversationState::Matched { partner }
            }
            other => other,
        }
    }

    /// System-side update after `partner` unmatched or left the service
    pub fn on_partner_left(self, partner: UserId) -> Self {
        match self {
            ConversationState::Matched { partner: p } | ConversationState::Chatting { partner: p }
                if p == partner =>
            {
                ConversationState::Browsing
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_transitions() -> Vec<Transition> {
        vec![
            Transition::BeginOnboarding,
            Transition::Advance {
                step: OnboardingStep::Age,
                draft: ProfileDraft::default(),
            },
            Transition::FinishOnboarding,
            Transition::AbandonOnboarding,
            Transition::Present { candidate: UserId(2) },
            Transition::Like { candidate: UserId(2), mutual: true },
            Transition::Pass { candidate: UserId(2) },
            Transition::OpenChat { partner: UserId(2) },
            Transition::LeaveChat,
            Transition::Unmatch,
            Transition::Close,
        ]
    }

    #[test]
    fn test_closed_is_terminal() {
        for transition in all_transitions() {
            let result = ConversationState::Closed.apply(transition);
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_review_then_like_mutual() {
        let state = ConversationState::Browsing
            .apply(Transition::Present { candidate: UserId(5) })
            .unwrap();
        assert_eq!(state, ConversationState::Reviewing { candidate: UserId(5) });

        let state = state
            .apply(Transition::Like { candidate: UserId(5), mutual: true })
            .unwrap();
        assert_eq!(state, ConversationState::Matched { partner: UserId(5) });

        let state = state.apply(Transition::OpenChat { partner: UserId(5) }).unwrap();
        assert_eq!(state, ConversationState::Chatting { partner: UserId(5) });
    }

    #[test]
    fn test_one_sided_like_leaves_reviewing() {
        let state = ConversationState::Reviewing { candidate: UserId(5) }
            .apply(Transition::Like { candidate: UserId(5), mutual: false })
            .unwrap();
        assert_eq!(state, ConversationState::Browsing);
    }

    #[test]
    fn test_pass_goes_to_skipped() {
        let state = ConversationState::Reviewing { candidate: UserId(5) }
            .apply(Transition::Pass { candidate: UserId(5) })
            .unwrap();
        assert_eq!(state, ConversationState::Skipped);
    }

    #[test]
    fn test_stale_decision_rejected() {
        let err = ConversationState::Reviewing { candidate: UserId(5) }
            .apply(Transition::Like { candidate: UserId(6), mutual: false })
            .unwrap_err();
        assert_eq!(err.state, "reviewing");
        assert_eq!(err.action, "like");
    }

    #[test]
    fn test_cannot_chat_from_reviewing() {
        let result = ConversationState::Reviewing { candidate: UserId(5) }
            .apply(Transition::OpenChat { partner: UserId(5) });
        assert!(result.is_err());
    }

    #[test]
    fn test_cannot_decide_while_browsing() {
        let result = ConversationState::Browsing.apply(Transition::Pass { candidate: UserId(1) });
        assert!(result.is_err());
    }

    #[test]
    fn test_close_from_any_open_state() {
        let states = vec![
            ConversationState::Browsing,
            ConversationState::Skipped,
            ConversationState::Reviewing { candidate: UserId(1) },
            ConversationState::Matched { partner: UserId(1) },
            ConversationState::Chatting { partner: UserId(1) },
            ConversationState::Onboarding {
                step: OnboardingStep::Bio,
                draft: ProfileDraft::default(),
            },
        ];
        for state in states {
            assert_eq!(state.apply(Transition::Close).unwrap(), ConversationState::Closed);
        }
    }

    #[test]
    fn test_system_updates() {
        assert_eq!(
            ConversationState::Browsing.on_match_formed(UserId(3)),
            ConversationState::Matched { partner: UserId(3) }
        );
        assert_eq!(
            ConversationState::Reviewing { candidate: UserId(4) }.on_match_formed(UserId(3)),
            ConversationState::Reviewing { candidate: UserId(4) }
        );
        assert_eq!(
            ConversationState::Chatting { partner: UserId(3) }.on_partner_left(UserId(3)),
            ConversationState::Browsing
        );
        assert_eq!(
            ConversationState::Chatting { partner: UserId(8) }.on_partner_left(UserId(3)),
            ConversationState::Chatting { partner: UserId(8) }
        );
        assert_eq!(ConversationState::Closed.on_match_formed(UserId(3)), ConversationState::Closed);
    }

    #[test]
    fn test_state_serialization() {
        let state = ConversationState::Reviewing { candidate: UserId(42) };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"kind":"reviewing","candidate":42}"#);
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
