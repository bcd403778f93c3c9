use crate::error::ValidationError;

/// Rejects values that could never be passed safely as a single argv
/// element: null bytes and control characters other than `\t` (§4.2).
///
/// Sanitized strings are always handed to the subprocess as one argv array
/// element (never concatenated into a shell string) — this function only
/// guards the *content*, not the invocation mechanism; [`bridge_exec`] is
/// responsible for never going through a shell.
pub fn sanitize_argv_string(name: &str, value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::invalid(name, "contains a null byte"));
    }
    if value
        .chars()
        .any(|ch| ch.is_control() && ch != '\t')
    {
        return Err(ValidationError::invalid(
            name,
            "contains a disallowed control character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_byte() {
        let err = sanitize_argv_string("x", "a\0b").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidArgument { .. }));
    }

    #[test]
    fn rejects_control_characters_except_tab() {
        assert!(sanitize_argv_string("x", "a\tb").is_ok());
        assert!(sanitize_argv_string("x", "a\nb").is_err());
        assert!(sanitize_argv_string("x", "a\x07b").is_err());
    }

    #[test]
    fn allows_ordinary_text() {
        assert!(sanitize_argv_string("x", "github-server_01").is_ok());
    }
}
