// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    normalize_tag, AccountStatus, BoundingBox, CandidateScore, ChatMessage, Decision,
    DecisionOutcome, Gender, GeoPoint, Match, MessageKind, OutboundMessage, PlatformAccount,
    Preferences, Profile, ReplyAction, Report, ScoringWeights, User, UserId,
};
pub use requests::{CandidatesQuery, InboundEventRequest};
pub use responses::{
    CandidatesResponse, ErrorResponse, EventResponse, HealthResponse, MatchesResponse,
};
