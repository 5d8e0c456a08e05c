use serde::{Deserialize, Serialize};
use validator::Validate;

/// Inbound platform event as posted by the gateway adapter
///
/// `kind` selects which of the optional fields must be present; the
/// dispatcher enforces that when converting to an `InboundEvent`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InboundEventRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "event_id", rename = "eventId", default)]
    pub event_id: Option<String>,
    #[validate(range(min = 1))]
    #[serde(alias = "platform_user_id", rename = "platformUserId")]
    pub platform_user_id: i64,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub username: Option<String>,
    #[validate(length(max = 128))]
    #[serde(alias = "display_name", rename = "displayName", default)]
    pub display_name: Option<String>,
    #[validate(length(min = 1))]
    pub kind: String,
    #[validate(length(min = 1, max = 64))]
    #[serde(default)]
    pub command: Option<String>,
    #[validate(length(max = 1024))]
    #[serde(default)]
    pub args: Option<String>,
    #[validate(length(min = 1, max = 4096))]
    #[serde(default)]
    pub text: Option<String>,
    #[validate(length(min = 1, max = 256))]
    #[serde(alias = "photo_file_id", rename = "photoFileId", default)]
    pub photo_file_id: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default)]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default)]
    pub longitude: Option<f64>,
    #[validate(length(min = 1, max = 64))]
    #[serde(alias = "action_data", rename = "actionData", default)]
    pub action_data: Option<String>,
}

/// Query parameters for the candidates endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatesQuery {
    #[serde(default = "default_limit")]
    pub limit: u16,
}

fn default_limit() -> u16 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let request: InboundEventRequest = serde_json::from_str(
            r#"{"platformUserId": 9, "kind": "action", "actionData": "like:3"}"#,
        )
        .unwrap();

        assert_eq!(request.platform_user_id, 9);
        assert_eq!(request.action_data.as_deref(), Some("like:3"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_location() {
        let request: InboundEventRequest = serde_json::from_str(
            r#"{"platformUserId": 9, "kind": "location", "latitude": 120.0, "longitude": 0.0}"#,
        )
        .unwrap();

        assert!(request.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_kind() {
        let request: InboundEventRequest =
            serde_json::from_str(r#"{"platformUserId": 9, "kind": ""}"#).unwrap();

        assert!(request.validate().is_err());
    }
}
