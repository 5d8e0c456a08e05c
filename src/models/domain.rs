use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Internal user identifier assigned by the profile store
///
/// Users refer to each other by this number (shown as `#12`); the platform
/// identifier never leaves the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse::<i64>().map(UserId)
    }
}

/// Identity of the sender as reported by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccount {
    #[serde(rename = "platformId")]
    pub platform_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "closed" => AccountStatus::Closed,
            _ => AccountStatus::Active,
        }
    }
}

/// Registered bot user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "platformId")]
    pub platform_id: i64,
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub status: AccountStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "man" => Ok(Gender::Male),
            "female" | "f" | "woman" => Ok(Gender::Female),
            "other" | "o" => Ok(Gender::Other),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Some(Self { latitude, longitude })
        } else {
            None
        }
    }
}

/// Hard filters a user applies to the people they want to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Empty means anyone
    #[serde(default)]
    pub genders: BTreeSet<Gender>,
    #[serde(rename = "minAge")]
    pub min_age: u8,
    #[serde(rename = "maxAge")]
    pub max_age: u8,
    #[serde(rename = "maxDistanceKm", default)]
    pub max_distance_km: Option<u16>,
}

impl Preferences {
    pub fn accepts_gender(&self, gender: Gender) -> bool {
        self.genders.is_empty() || self.genders.contains(&gender)
    }

    pub fn accepts_age(&self, age: u8) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

/// Dating profile with attributes and preference filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub age: u8,
    pub gender: Gender,
    pub bio: String,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(rename = "photoFileId", default)]
    pub photo_file_id: Option<String>,
    pub preferences: Preferences,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn has_photo(&self) -> bool {
        self.photo_file_id.is_some()
    }
}

/// Normalize a free-form interest tag
pub fn normalize_tag(tag: &str) -> Option<String> {
    let cleaned = tag
        .trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Like,
    Pass,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Like => "like",
            Decision::Pass => "pass",
        }
    }
}

/// Confirmed mutual interest between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    #[serde(rename = "userLow")]
    pub user_low: UserId,
    #[serde(rename = "userHigh")]
    pub user_high: UserId,
    pub active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "archivedAt")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Order a pair the way match rows store it
    pub fn normalize(a: UserId, b: UserId) -> (UserId, UserId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.user_low == user || self.user_high == user
    }

    /// The other side of the match, if `user` is part of it
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if self.user_low == user {
            Some(self.user_high)
        } else if self.user_high == user {
            Some(self.user_low)
        } else {
            None
        }
    }
}

/// Result of recording a like or pass
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Passed,
    Liked,
    Matched(Match),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    #[serde(rename = "matchId")]
    pub match_id: i64,
    pub sender: UserId,
    pub body: String,
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub reporter: UserId,
    pub reported: UserId,
    pub reason: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Transient compatibility of one candidate for a seeker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate: UserId,
    pub score: f64,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Scoring weights
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub interests: f64,
    pub age: f64,
    pub distance: f64,
    pub photo: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            interests: 0.50,
            age: 0.20,
            distance: 0.20,
            photo: 0.10,
        }
    }
}

/// Inline button attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyAction {
    pub label: String,
    /// Echoed back as `actionData` when the user presses the button
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Direct answer to an inbound event
    Reply,
    /// Pushed without a triggering event from the recipient
    Notification,
}

/// Message handed to the platform gateway for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Platform identifier of the recipient
    pub recipient: i64,
    pub text: String,
    #[serde(rename = "photoFileId", skip_serializing_if = "Option::is_none")]
    pub photo_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ReplyAction>,
    pub kind: MessageKind,
}

impl OutboundMessage {
    pub fn reply(recipient: i64, text: impl Into<String>) -> Self {
        Self {
            recipient,
            text: text.into(),
            photo_file_id: None,
            actions: Vec::new(),
            kind: MessageKind::Reply,
        }
    }

    pub fn notification(recipient: i64, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Notification,
            ..Self::reply(recipient, text)
        }
    }

    pub fn with_photo(mut self, file_id: Option<String>) -> Self {
        self.photo_file_id = file_id;
        self
    }

    pub fn with_action(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.actions.push(ReplyAction {
            label: label.into(),
            data: data.into(),
        });
        self
    }
}
