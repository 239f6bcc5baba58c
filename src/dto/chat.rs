use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::{
    validate_avatar, validate_color, validate_message_text, validate_username,
};

/// Chat line submitted by a viewer; the server stamps `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct ChatSendRequest {
    /// Display name, 2 to 20 characters once trimmed.
    pub username: String,
    /// Message body, 1 to 200 characters once trimmed.
    pub text: String,
    /// Avatar color (`#RRGGBB`).
    pub color: String,
    /// Optional inline avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ChatSendRequest {
    /// Strip surrounding whitespace from the user-typed fields.
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            text: self.text.trim().to_string(),
            ..self
        }
    }
}

impl Validate for ChatSendRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_username(&self.username) {
            errors.add("username", e);
        }
        if let Err(e) = validate_message_text(&self.text) {
            errors.add("text", e);
        }
        if let Err(e) = validate_color(&self.color) {
            errors.add("color", e);
        }
        if let Some(ref avatar) = self.avatar {
            if let Err(e) = validate_avatar(avatar) {
                errors.add("avatar", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, text: &str, color: &str) -> ChatSendRequest {
        ChatSendRequest {
            username: username.into(),
            text: text.into(),
            color: color.into(),
            avatar: None,
        }
    }

    #[test]
    fn valid_request_passes_and_is_trimmed() {
        let req = request("  noah ", " hi there ", "#96CEB4");
        assert!(req.validate().is_ok());
        let normalized = req.normalized();
        assert_eq!(normalized.username, "noah");
        assert_eq!(normalized.text, "hi there");
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let err = request("x", "", "blue").validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("text"));
        assert!(fields.contains_key("color"));
    }
}
