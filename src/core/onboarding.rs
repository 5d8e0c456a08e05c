use crate::models::{normalize_tag, Gender, GeoPoint, Preferences, Profile, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

const MAX_AGE: u8 = 99;
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 64;
const MAX_INTERESTS: usize = 10;
const MAX_BIO_CHARS: usize = 500;

/// Steps of the profile creation wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Name,
    Age,
    Gender,
    LookingFor,
    AgeRange,
    Interests,
    Bio,
    Location,
    Photo,
}

impl OnboardingStep {
    pub const FIRST: OnboardingStep = OnboardingStep::Name;

    pub fn next(self) -> Option<Self> {
        use OnboardingStep::*;
        match self {
            Name => Some(Age),
            Age => Some(Gender),
            Gender => Some(LookingFor),
            LookingFor => Some(AgeRange),
            AgeRange => Some(Interests),
            Interests => Some(Bio),
            Bio => Some(Location),
            Location => Some(Photo),
            Photo => None,
        }
    }

    pub fn prompt(self) -> &'static str {
        use OnboardingStep::*;
        match self {
            Name => "What's your name?",
            Age => "How old are you?",
            Gender => "What's your gender? (male/female/other)",
            LookingFor => "Who would you like to meet? (male/female/other/anyone)",
            AgeRange => "Which age range are you looking for? (for example 25-35)",
            Interests => "List a few interests, separated by commas (for example hiking, reading, jazz)",
            Bio => "Write a short bio about yourself (1-2 lines):",
            Location => "Share your location to meet people nearby, or /skip.",
            Photo => "Send a profile photo, or /skip to continue without one.",
        }
    }

    pub fn accepts_skip(self) -> bool {
        matches!(self, OnboardingStep::Location | OnboardingStep::Photo)
    }
}

/// Answers collected so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub looking_for: Option<BTreeSet<Gender>>,
    pub age_range: Option<(u8, u8)>,
    pub interests: Option<BTreeSet<String>>,
    pub bio: Option<String>,
    pub location: Option<GeoPoint>,
    pub photo_file_id: Option<String>,
}

/// Input a user can give while in the wizard
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepInput<'a> {
    Text(&'a str),
    Photo(&'a str),
    Location { latitude: f64, longitude: f64 },
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Next {
        step: OnboardingStep,
        draft: ProfileDraft,
    },
    Complete(ProfileDraft),
    /// The user is below the minimum age; the draft is discarded
    Underage,
}

#[derive(Debug, Error, PartialEq)]
pub enum OnboardingError {
    #[error("Please enter a valid name (at least 2 characters).")]
    InvalidName,

    #[error("Please send a number for age.")]
    NotANumber,

    #[error("Please answer male, female or other.")]
    InvalidGender,

    #[error("Please answer male, female, other or anyone.")]
    InvalidLookingFor,

    #[error("Please send an age range like 25-35 (between {min} and 99).")]
    InvalidAgeRange { min: u8 },

    #[error("Please list between 1 and 10 interests, separated by commas.")]
    InvalidInterests,

    #[error("Your bio should be between 1 and 500 characters.")]
    InvalidBio,

    #[error("Please share a location, or /skip.")]
    ExpectedLocation,

    #[error("Please send a photo, or /skip.")]
    ExpectedPhoto,

    #[error("Please answer with text.")]
    ExpectedText,

    #[error("This step can't be skipped.")]
    CannotSkip,

    #[error("Profile is incomplete: missing {0}")]
    Incomplete(&'static str),
}

/// Limits applied while validating answers
#[derive(Debug, Clone, Copy)]
pub struct OnboardingRules {
    pub min_age: u8,
    /// Applied to new profiles that share a location
    pub default_max_distance_km: Option<u16>,
}

impl Default for OnboardingRules {
    fn default() -> Self {
        Self {
            min_age: 18,
            default_max_distance_km: Some(50),
        }
    }
}

/// Apply one answer to the current step
///
/// Invalid answers return an error and leave the draft untouched; the caller
/// re-prompts for the same step.
pub fn apply_input(
    step: OnboardingStep,
    mut draft: ProfileDraft,
    input: StepInput<'_>,
    rules: &OnboardingRules,
) -> Result<StepOutcome, OnboardingError> {
    if input == StepInput::Skip && !step.accepts_skip() {
        return Err(OnboardingError::CannotSkip);
    }

    match step {
        OnboardingStep::Name => {
            let name = expect_text(input)?;
            let chars = name.chars().count();
            if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&chars) {
                return Err(OnboardingError::InvalidName);
            }
            draft.name = Some(name.to_string());
        }
        OnboardingStep::Age => {
            let age: u8 = match expect_text(input)?.parse::<u16>() {
                Ok(age) => age.min(u8::MAX as u16) as u8,
                Err(_) => return Err(OnboardingError::NotANumber),
            };
            if age < rules.min_age {
                return Ok(StepOutcome::Underage);
            }
            if age > MAX_AGE {
                return Err(OnboardingError::NotANumber);
            }
            draft.age = Some(age);
        }
        OnboardingStep::Gender => {
            let gender = expect_text(input)?
                .parse::<Gender>()
                .map_err(|_| OnboardingError::InvalidGender)?;
            draft.gender = Some(gender);
        }
        OnboardingStep::LookingFor => {
            draft.looking_for = Some(parse_looking_for(expect_text(input)?)?);
        }
        OnboardingStep::AgeRange => {
            draft.age_range = Some(parse_age_range(expect_text(input)?, rules.min_age)?);
        }
        OnboardingStep::Interests => {
            let interests: BTreeSet<String> = expect_text(input)?
                .split(',')
                .filter_map(normalize_tag)
                .collect();
            if interests.is_empty() || interests.len() > MAX_INTERESTS {
                return Err(OnboardingError::InvalidInterests);
            }
            draft.interests = Some(interests);
        }
        OnboardingStep::Bio => {
            let bio = expect_text(input)?;
            let chars = bio.chars().count();
            if chars == 0 || chars > MAX_BIO_CHARS {
                return Err(OnboardingError::InvalidBio);
            }
            draft.bio = Some(bio.to_string());
        }
        OnboardingStep::Location => match input {
            StepInput::Skip => draft.location = None,
            StepInput::Location { latitude, longitude } => {
                draft.location = Some(
                    GeoPoint::new(latitude, longitude).ok_or(OnboardingError::ExpectedLocation)?,
                );
            }
            _ => return Err(OnboardingError::ExpectedLocation),
        },
        OnboardingStep::Photo => match input {
            StepInput::Skip => draft.photo_file_id = None,
            StepInput::Photo(file_id) if !file_id.trim().is_empty() => {
                draft.photo_file_id = Some(file_id.trim().to_string());
            }
            _ => return Err(OnboardingError::ExpectedPhoto),
        },
    }

    Ok(match step.next() {
        Some(next) => StepOutcome::Next { step: next, draft },
        None => StepOutcome::Complete(draft),
    })
}

fn expect_text(input: StepInput<'_>) -> Result<&str, OnboardingError> {
    match input {
        StepInput::Text(text) => Ok(text.trim()),
        _ => Err(OnboardingError::ExpectedText),
    }
}

fn parse_looking_for(text: &str) -> Result<BTreeSet<Gender>, OnboardingError> {
    let lowered = text.to_lowercase();
    match lowered.trim() {
        "anyone" | "any" | "everyone" | "all" => return Ok(BTreeSet::new()),
        "both" => return Ok([Gender::Male, Gender::Female].into_iter().collect()),
        _ => {}
    }

    let genders = lowered
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty() && *part != "and" && *part != "or")
        .map(|part| part.parse::<Gender>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|_| OnboardingError::InvalidLookingFor)?;

    if genders.is_empty() {
        return Err(OnboardingError::InvalidLookingFor);
    }
    Ok(genders)
}

fn parse_age_range(text: &str, min_age: u8) -> Result<(u8, u8), OnboardingError> {
    let invalid = OnboardingError::InvalidAgeRange { min: min_age };
    let bounds: Vec<u8> = text
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| OnboardingError::InvalidAgeRange { min: min_age })?;

    match bounds.as_slice() {
        [min, max] if *min >= min_age && max <= &MAX_AGE && min <= max => Ok((*min, *max)),
        _ => Err(invalid),
    }
}

impl ProfileDraft {
    /// Build the finished profile
    pub fn into_profile(
        self,
        user_id: UserId,
        rules: &OnboardingRules,
        now: DateTime<Utc>,
    ) -> Result<Profile, OnboardingError> {
        let (min_age, max_age) = self.age_range.ok_or(OnboardingError::Incomplete("age range"))?;
        let max_distance_km = if self.location.is_some() {
            rules.default_max_distance_km
        } else {
            None
        };

        Ok(Profile {
            user_id,
            display_name: self.name.ok_or(OnboardingError::Incomplete("name"))?,
            age: self.age.ok_or(OnboardingError::Incomplete("age"))?,
            gender: self.gender.ok_or(OnboardingError::Incomplete("gender"))?,
            bio: self.bio.ok_or(OnboardingError::Incomplete("bio"))?,
            interests: self.interests.unwrap_or_default(),
            location: self.location,
            photo_file_id: self.photo_file_id,
            preferences: Preferences {
                genders: self.looking_for.unwrap_or_default(),
                min_age,
                max_age,
                max_distance_km,
            },
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step: OnboardingStep, draft: ProfileDraft, input: StepInput<'_>) -> Result<StepOutcome, OnboardingError> {
        apply_input(step, draft, input, &OnboardingRules::default())
    }

    fn advance(outcome: StepOutcome) -> ProfileDraft {
        match outcome {
            StepOutcome::Next { draft, .. } | StepOutcome::Complete(draft) => draft,
            StepOutcome::Underage => panic!("unexpected underage outcome"),
        }
    }

    #[test]
    fn test_name_too_short() {
        let result = step(OnboardingStep::Name, ProfileDraft::default(), StepInput::Text("A"));
        assert_eq!(result, Err(OnboardingError::InvalidName));
    }

    #[test]
    fn test_age_not_a_number() {
        let result = step(OnboardingStep::Age, ProfileDraft::default(), StepInput::Text("twenty"));
        assert_eq!(result, Err(OnboardingError::NotANumber));
    }

    #[test]
    fn test_underage_aborts() {
        let result = step(OnboardingStep::Age, ProfileDraft::default(), StepInput::Text("17"));
        assert_eq!(result, Ok(StepOutcome::Underage));
    }

    #[test]
    fn test_skip_only_where_allowed() {
        let result = step(OnboardingStep::Bio, ProfileDraft::default(), StepInput::Skip);
        assert_eq!(result, Err(OnboardingError::CannotSkip));

        let result = step(OnboardingStep::Photo, ProfileDraft::default(), StepInput::Skip);
        assert!(matches!(result, Ok(StepOutcome::Complete(_))));
    }

    #[test]
    fn test_looking_for_variants() {
        assert_eq!(parse_looking_for("anyone").unwrap(), BTreeSet::new());
        assert_eq!(
            parse_looking_for("Male, female").unwrap(),
            [Gender::Male, Gender::Female].into_iter().collect()
        );
        assert!(parse_looking_for("cats").is_err());
    }

    #[test]
    fn test_age_range_parsing() {
        assert_eq!(parse_age_range("25-35", 18).unwrap(), (25, 35));
        assert_eq!(parse_age_range("25 - 35", 18).unwrap(), (25, 35));
        assert!(parse_age_range("35-25", 18).is_err());
        assert!(parse_age_range("16-30", 18).is_err());
        assert!(parse_age_range("30", 18).is_err());
    }

    #[test]
    fn test_full_wizard() {
        let mut draft = ProfileDraft::default();
        let answers = [
            (OnboardingStep::Name, StepInput::Text("Alice")),
            (OnboardingStep::Age, StepInput::Text("29")),
            (OnboardingStep::Gender, StepInput::Text("female")),
            (OnboardingStep::LookingFor, StepInput::Text("male")),
            (OnboardingStep::AgeRange, StepInput::Text("27-38")),
            (OnboardingStep::Interests, StepInput::Text("Hiking, reading, , jazz")),
            (OnboardingStep::Bio, StepInput::Text("Coffee first.")),
            (OnboardingStep::Location, StepInput::Location { latitude: 52.52, longitude: 13.405 }),
            (OnboardingStep::Photo, StepInput::Photo("file-1")),
        ];
        for (current, input) in answers {
            draft = advance(step(current, draft, input).unwrap());
        }

        let profile = draft
            .into_profile(UserId(1), &OnboardingRules::default(), Utc::now())
            .unwrap();
        assert_eq!(profile.display_name, "Alice");
        assert_eq!(profile.age, 29);
        assert_eq!(profile.interests.len(), 3);
        assert!(profile.interests.contains("hiking"));
        assert_eq!(profile.preferences.max_distance_km, Some(50));
        assert_eq!(profile.photo_file_id.as_deref(), Some("file-1"));
    }

    #[test]
    fn test_incomplete_draft_rejected() {
        let draft = ProfileDraft {
            name: Some("Bob".to_string()),
            ..Default::default()
        };
        let result = draft.into_profile(UserId(1), &OnboardingRules::default(), Utc::now());
        assert!(matches!(result, Err(OnboardingError::Incomplete(_))));
    }
}
