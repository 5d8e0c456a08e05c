use crate::models::{InboundEventRequest, PlatformAccount, UserId};
use std::fmt;
use thiserror::Error;

const MAX_REPORT_REASON_CHARS: usize = 500;

/// Problems with the shape of an inbound event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("missing field for this event kind: {0}")]
    MissingField(&'static str),

    #[error("unknown command: /{0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(&'static str),

    #[error("unrecognized action: {0}")]
    InvalidAction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    CreateProfile,
    Cancel,
    Skip,
    Find,
    MyProfile,
    Matches,
    Chat(UserId),
    Leave,
    Unmatch,
    Report { target: UserId, reason: String },
    DeleteAccount,
}

impl Command {
    /// Parse a command name (with or without the leading slash) and its arguments
    pub fn parse(name: &str, args: &str) -> Result<Self, EventError> {
        let name = name.trim().trim_start_matches('/');
        // Group chats address commands as /find@botname
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        let args = args.trim();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "create_profile" => Command::CreateProfile,
            "cancel" => Command::Cancel,
            "skip" => Command::Skip,
            "find" => Command::Find,
            "myprofile" => Command::MyProfile,
            "matches" => Command::Matches,
            "chat" => {
                let target = args
                    .split_whitespace()
                    .next()
                    .and_then(|id| id.parse::<UserId>().ok())
                    .ok_or(EventError::Usage("Usage: /chat <#id>"))?;
                Command::Chat(target)
            }
            "leave" => Command::Leave,
            "unmatch" => Command::Unmatch,
            "report" => {
                let usage = EventError::Usage("Usage: /report <#id> <reason>");
                let (target, reason) = args.split_once(char::is_whitespace).ok_or(usage.clone())?;
                let target = target.parse::<UserId>().map_err(|_| usage.clone())?;
                let reason = reason.trim();
                if reason.is_empty() || reason.chars().count() > MAX_REPORT_REASON_CHARS {
                    return Err(usage);
                }
                Command::Report {
                    target,
                    reason: reason.to_string(),
                }
            }
            "delete_account" => Command::DeleteAccount,
            _ => return Err(EventError::UnknownCommand(name)),
        };

        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::CreateProfile => "create_profile",
            Command::Cancel => "cancel",
            Command::Skip => "skip",
            Command::Find => "find",
            Command::MyProfile => "myprofile",
            Command::Matches => "matches",
            Command::Chat(_) => "chat",
            Command::Leave => "leave",
            Command::Unmatch => "unmatch",
            Command::Report { .. } => "report",
            Command::DeleteAccount => "delete_account",
        }
    }
}

/// Button press on a presented candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Like(UserId),
    Pass(UserId),
}

impl Action {
    /// Parse `like:<id>`, `pass:<id>` or `skip:<id>`
    pub fn parse(data: &str) -> Result<Self, EventError> {
        let invalid = || EventError::InvalidAction(data.to_string());
        let (verb, target) = data.trim().split_once(':').ok_or_else(invalid)?;
        let target = target.parse::<UserId>().map_err(|_| invalid())?;

        match verb {
            "like" => Ok(Action::Like(target)),
            "pass" | "skip" => Ok(Action::Pass(target)),
            _ => Err(invalid()),
        }
    }

    pub fn target(&self) -> UserId {
        match self {
            Action::Like(id) | Action::Pass(id) => *id,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Like(id) => write!(f, "like:{}", id.0),
            Action::Pass(id) => write!(f, "pass:{}", id.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Command(Command),
    Text(String),
    Photo { file_id: String },
    Location { latitude: f64, longitude: f64 },
    Action(Action),
    /// The user blocked the bot on the platform
    BotBlocked,
}

impl Payload {
    pub fn name(&self) -> &'static str {
        match self {
            Payload::Command(command) => command.name(),
            Payload::Text(_) => "send text",
            Payload::Photo { .. } => "send a photo",
            Payload::Location { .. } => "send a location",
            Payload::Action(Action::Like(_)) => "like",
            Payload::Action(Action::Pass(_)) => "pass",
            Payload::BotBlocked => "block",
        }
    }
}

/// Validated inbound event
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub event_id: String,
    pub account: PlatformAccount,
    pub payload: Payload,
}

impl InboundEvent {
    pub fn new(account: PlatformAccount, payload: Payload) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            account,
            payload,
        }
    }
}

impl TryFrom<InboundEventRequest> for InboundEvent {
    type Error = EventError;

    fn try_from(request: InboundEventRequest) -> Result<Self, Self::Error> {
        let payload = match request.kind.as_str() {
            "command" => {
                let command = request.command.as_deref().ok_or(EventError::MissingField("command"))?;
                Payload::Command(Command::parse(command, request.args.as_deref().unwrap_or(""))?)
            }
            "text" => {
                let text = request.text.as_deref().ok_or(EventError::MissingField("text"))?;
                parse_text(text)?
            }
            "photo" => Payload::Photo {
                file_id: request
                    .photo_file_id
                    .clone()
                    .ok_or(EventError::MissingField("photoFileId"))?,
            },
            "location" => Payload::Location {
                latitude: request.latitude.ok_or(EventError::MissingField("latitude"))?,
                longitude: request.longitude.ok_or(EventError::MissingField("longitude"))?,
            },
            "action" => {
                let data = request
                    .action_data
                    .as_deref()
                    .ok_or(EventError::MissingField("actionData"))?;
                Payload::Action(Action::parse(data)?)
            }
            "blocked" => Payload::BotBlocked,
            other => return Err(EventError::UnknownKind(other.to_string())),
        };

        let display_name = request
            .display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| request.username.clone())
            .unwrap_or_default();

        Ok(Self {
            event_id: request
                .event_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            account: PlatformAccount {
                platform_id: request.platform_user_id,
                username: request.username,
                display_name,
            },
            payload,
        })
    }
}

/// Text starting with a slash is a command
fn parse_text(text: &str) -> Result<Payload, EventError> {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return Ok(Payload::Command(Command::parse(name, args)?));
    }
    Ok(Payload::Text(text.to_string()))
}
