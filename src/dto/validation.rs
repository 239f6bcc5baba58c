//! Validation helpers for DTOs.

use validator::ValidationError;

/// Minimum number of characters in a trimmed username.
pub const USERNAME_MIN_LENGTH: usize = 2;
/// Maximum number of characters in a trimmed username.
pub const USERNAME_MAX_LENGTH: usize = 20;
/// Maximum number of characters in a trimmed chat message.
pub const MESSAGE_MAX_LENGTH: usize = 200;
/// Maximum number of characters accepted for an inline avatar.
pub const AVATAR_MAX_LENGTH: usize = 200_000;

/// Validates that a username is 2 to 20 characters once trimmed.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.trim().chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!(
                "Username must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a chat message is non-blank and at most 200 characters once trimmed.
pub fn validate_message_text(text: &str) -> Result<(), ValidationError> {
    let length = text.trim().chars().count();
    if length == 0 {
        let mut err = ValidationError::new("message_empty");
        err.message = Some("Message must not be blank".into());
        return Err(err);
    }
    if length > MESSAGE_MAX_LENGTH {
        let mut err = ValidationError::new("message_length");
        err.message = Some(
            format!("Message must be at most {MESSAGE_MAX_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates a `#RRGGBB` color.
///
/// # Examples
///
/// ```ignore
/// validate_color("#FF6B6B") // Ok
/// validate_color("FF6B6B")  // Err - missing '#'
/// validate_color("#FF6B6")  // Err - too short
/// ```
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        let mut err = ValidationError::new("color_format");
        err.message = Some("Color must be formatted as #RRGGBB".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that an inline avatar is at most 200 000 characters.
pub fn validate_avatar(avatar: &str) -> Result<(), ValidationError> {
    let length = avatar.chars().count();
    if length > AVATAR_MAX_LENGTH {
        let mut err = ValidationError::new("avatar_length");
        err.message = Some(
            format!("Avatar must be at most {AVATAR_MAX_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("noah").is_ok());
        assert!(validate_username("  ab  ").is_ok());
        assert!(validate_username("a").is_err()); // too short
        assert!(validate_username("   a    ").is_err()); // too short once trimmed
        assert!(validate_username(&"x".repeat(21)).is_err()); // too long
    }

    #[test]
    fn test_validate_message_text() {
        assert!(validate_message_text("hello!").is_ok());
        assert!(validate_message_text(&"é".repeat(200)).is_ok());
        assert!(validate_message_text("   ").is_err()); // blank
        assert!(validate_message_text(&"x".repeat(201)).is_err()); // too long
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#FF6B6B").is_ok());
        assert!(validate_color("#4ecdc4").is_ok());
        assert!(validate_color("FF6B6B").is_err()); // missing '#'
        assert!(validate_color("#FF6B6").is_err()); // too short
        assert!(validate_color("#GG6B6B").is_err()); // invalid hex
    }

    #[test]
    fn test_validate_avatar() {
        assert!(validate_avatar("data:image/png;base64,AAAA").is_ok());
        assert!(validate_avatar(&"a".repeat(AVATAR_MAX_LENGTH + 1)).is_err());
        // Counted in characters, not bytes.
        assert!(validate_avatar(&"é".repeat(AVATAR_MAX_LENGTH)).is_ok());
    }
}
