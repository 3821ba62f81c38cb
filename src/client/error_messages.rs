pub const UNEXPECTED: &str = "Unexpected error";

/// Backend error codes with a fixed human-readable message.
const AUTH_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("InvalidCredentialsError", "Invalid credentials"),
    ("InvalidTokenError", "Session expired"),
    ("UserAlreadyExistsError", "That email address is already registered"),
    ("InvalidCodeError", "Invalid code"),
    ("UserNotFoundError", "User not found"),
];

fn generic_message(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("The submitted data is not valid"),
        401 => Some("Not authorized"),
        403 => Some("You do not have permission to perform this action"),
        404 => Some("Resource not found"),
        409 => Some("A record with this data already exists"),
        500 => Some("Server error"),
        _ => None,
    }
}

/// Picks the message for a failed API call: known error code, then the
/// envelope message, then a per-status default.
pub fn describe(status: u16, error: Option<&str>, message: Option<&str>) -> String {
    if let Some(error) = error {
        if let Some((_, text)) = AUTH_ERROR_MESSAGES
            .iter()
            .find(|(code, _)| error.contains(code))
        {
            return text.to_string();
        }
    }

    message
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| generic_message(status).map(str::to_string))
        .unwrap_or_else(|| UNEXPECTED.to_string())
}
