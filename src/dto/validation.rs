//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_NAME_LENGTH: usize = 64;

/// Validates an attendee display name: non-blank, at most 64 characters,
/// no leading or trailing whitespace (names are compared as stored).
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    if name != name.trim() {
        let mut err = ValidationError::new("display_name_whitespace");
        err.message = Some("Display name must not start or end with whitespace".into());
        return Err(err);
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("display_name_length");
        err.message =
            Some(format!("Display name must be at most {MAX_NAME_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}
