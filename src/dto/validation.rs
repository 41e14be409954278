//! Validation helpers for DTOs.

use validator::ValidationError;

/// Minimum prompt length in characters, after trimming.
pub const PROMPT_MIN_CHARS: usize = 3;
/// Maximum prompt length in characters, after trimming.
pub const PROMPT_MAX_CHARS: usize = 200;

/// Validates that a prompt is between 3 and 200 characters once trimmed.
pub fn validate_prompt_text(text: &str) -> Result<(), ValidationError> {
    let length = text.trim().chars().count();

    if length < PROMPT_MIN_CHARS {
        let mut err = ValidationError::new("prompt_too_short");
        err.message = Some(
            format!("Prompt must be at least {PROMPT_MIN_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    if length > PROMPT_MAX_CHARS {
        let mut err = ValidationError::new("prompt_too_long");
        err.message = Some(
            format!("Prompt must be at most {PROMPT_MAX_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prompt_text_valid() {
        assert!(validate_prompt_text("a cat in a hat").is_ok());
        assert!(validate_prompt_text("abc").is_ok());
        assert!(validate_prompt_text(&"x".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_prompt_text_trims_before_measuring() {
        assert!(validate_prompt_text("  abc  ").is_ok());
        assert!(validate_prompt_text("  ab  ").is_err()); // 2 chars once trimmed
    }

    #[test]
    fn test_validate_prompt_text_too_short() {
        assert!(validate_prompt_text("").is_err());
        assert!(validate_prompt_text("ab").is_err());
        assert!(validate_prompt_text("   ").is_err());
    }

    #[test]
    fn test_validate_prompt_text_too_long() {
        assert!(validate_prompt_text(&"x".repeat(201)).is_err());
    }
}
