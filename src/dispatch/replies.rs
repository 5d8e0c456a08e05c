use crate::dispatch::event::Action;
use crate::models::{CandidateScore, Match, OutboundMessage, Profile, User, UserId};
use std::fmt::Write;

pub const WELCOME: &str = "Welcome to SoulMatch!\n\n\
    Create your profile with /create_profile and start finding matches ❤️\n\
    Commands: /create_profile /find /myprofile /matches /delete_account /report /help";

pub const HELP: &str = "/create_profile - Create or update your profile\n\
    /find - Browse profiles\n\
    /myprofile - View your profile\n\
    /matches - List your matches\n\
    /chat <#id> - Chat with a match\n\
    /leave - Stop chatting\n\
    /unmatch - End the current match\n\
    /delete_account - Delete your account & profile\n\
    /report <#id> <reason> - Report a user\n\
    /help - Show commands";

pub const NO_CANDIDATES: &str = "No profiles available right now. Try again later.";
pub const LIKED: &str = "Liked! Waiting for a mutual like.";
pub const PASSED: &str = "Skipped! Use /find to see other profiles.";
pub const MATCHED: &str = "🎉 It's a MATCH! Send a message to start chatting.";
pub const MESSAGE_SENT: &str = "Sent to your match.";
pub const LEFT_CHAT: &str = "You left the chat. Use /chat <#id> to come back.";
pub const UNMATCHED: &str = "Match ended.";
pub const REPORTED: &str = "Report received. Admin will review it.";
pub const DELETED: &str = "Your account and data have been deleted.";
pub const ONBOARDING_CANCELLED: &str = "Profile creation cancelled.";
pub const PROFILE_SAVED: &str = "Profile saved! Use /find to start browsing.";
pub const PROFILE_REQUIRED: &str = "You don't have a profile yet. Create one with /create_profile";
pub const NO_MATCHES: &str = "You have no matches yet. Use /find to meet people.";
pub const NOT_A_MATCH: &str = "You don't have an active match with that user.";
pub const UNKNOWN_USER: &str = "User not found.";

pub fn match_notification(partner: &str) -> String {
    format!("You've got a new match with {}! Send a message to start chatting.", partner)
}

pub fn underage(min_age: u8) -> String {
    format!("Sorry, you must be at least {} to use SoulMatch.", min_age)
}

pub fn partner_left(partner: &str) -> String {
    format!("{} ended the match.", partner)
}

pub fn relayed(sender: &str, body: &str) -> String {
    format!("{}:\n{}", sender, body)
}

pub fn now_chatting(partner: &str) -> String {
    format!("You're now chatting with {}. Send /leave to stop.", partner)
}

pub fn invalid_state(state: &str) -> String {
    let hint = match state {
        "onboarding" => "Finish your profile first, or send /cancel.",
        "reviewing" => "Please like or skip the profile shown first.",
        "chatting" => "You're in a chat. Send /leave first.",
        _ => "Use /help to see what you can do.",
    };
    format!("That's not possible right now. {}", hint)
}

/// Profile card shown while browsing, with like and pass buttons
pub fn candidate_card(recipient: i64, profile: &Profile, score: &CandidateScore) -> OutboundMessage {
    let mut text = profile_summary(profile);
    if !score.shared_interests.is_empty() {
        let _ = write!(text, "\nYou both like: {}", score.shared_interests.join(", "));
    }
    if let Some(km) = score.distance_km {
        let _ = write!(text, "\n{:.0} km away", km);
    }

    OutboundMessage::reply(recipient, text)
        .with_photo(profile.photo_file_id.clone())
        .with_action("❤️ Like", Action::Like(profile.user_id).to_string())
        .with_action("⏭ Skip", Action::Pass(profile.user_id).to_string())
}

/// The user's own profile
pub fn own_profile(recipient: i64, user: &User, profile: &Profile) -> OutboundMessage {
    let mut text = profile_summary(profile);
    let prefs = &profile.preferences;
    let genders = if prefs.genders.is_empty() {
        "anyone".to_string()
    } else {
        prefs
            .genders
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = write!(
        text,
        "\nLooking for: {}, {}-{}",
        genders, prefs.min_age, prefs.max_age
    );
    if let Some(username) = &user.username {
        let _ = write!(text, "\nUsername: @{}", username);
    }
    OutboundMessage::reply(recipient, text).with_photo(profile.photo_file_id.clone())
}

pub fn match_list(recipient: i64, user: UserId, matches: &[(Match, String)]) -> OutboundMessage {
    if matches.is_empty() {
        return OutboundMessage::reply(recipient, NO_MATCHES);
    }

    let mut text = String::from("Your matches:");
    for (m, name) in matches {
        if let Some(partner) = m.partner_of(user) {
            let _ = write!(text, "\n{} {} (/chat {})", partner, name, partner);
        }
    }
    OutboundMessage::reply(recipient, text)
}

fn profile_summary(profile: &Profile) -> String {
    let mut text = format!(
        "{} ({})\nAge: {}\nGender: {}\nBio: {}",
        profile.display_name, profile.user_id, profile.age, profile.gender, profile.bio
    );
    if !profile.interests.is_empty() {
        let interests: Vec<&str> = profile.interests.iter().map(String::as_str).collect();
        let _ = write!(text, "\nInterests: {}", interests.join(", "));
    }
    text
}
