use crate::models::domain::{CandidateScore, Match, OutboundMessage};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Response for the inbound event endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub accepted: bool,
    #[serde(rename = "eventId")]
    pub event_id: String,
    /// The reply queued for the sender, if any
    pub reply: Option<OutboundMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatesResponse {
    pub candidates: Vec<CandidateScore>,
    #[serde(rename = "totalConsidered")]
    pub total_considered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<Match>,
}
