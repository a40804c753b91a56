// Error types shared by the conversion client, the step controller and the export writer.

use crate::models::requests::ConversionAction;
use thiserror::Error;

/// Generic fallback shown when the request never produced a usable response.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing the file";
pub const GENERIC_CONVERT_FAILURE_MESSAGE: &str = "An error occurred during conversion";

#[derive(Debug, Error)]
pub enum WizardError {
    /// Rejected client-side before any request was made.
    #[error("{0}")]
    Validation(String),

    /// Non-success status (or non-JSON body) returned by the conversion service.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Success status, but the JSON body does not match the schema for the action.
    #[error("Malformed response for {action}: {detail}")]
    MalformedResponse {
        action: ConversionAction,
        detail: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WizardError {
    /// Message suitable for the error banner.
    ///
    /// Server messages are surfaced verbatim; everything else collapses to the generic fallback
    /// for the action that failed.
    pub fn user_message(&self, action: ConversionAction) -> String {
        match self {
            WizardError::Validation(msg) => msg.clone(),
            WizardError::Server { message, .. } => message.clone(),
            WizardError::MalformedResponse { .. } => format!(
                "The conversion service returned an unexpected response ({})",
                action.default_error_message()
            ),
            WizardError::Io(e) => format!("Unable to access file: {}", e),
            WizardError::Transport(_) | WizardError::Config(_) => match action {
                ConversionAction::Convert => GENERIC_CONVERT_FAILURE_MESSAGE.to_string(),
                _ => GENERIC_FAILURE_MESSAGE.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for WizardError {
    fn from(e: reqwest::Error) -> Self {
        WizardError::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for WizardError {
    fn from(e: config::ConfigError) -> Self {
        WizardError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_surfaced_verbatim() {
        let err = WizardError::Server {
            status: 400,
            message: "Failed to read Excel file: bad zip".to_string(),
        };
        assert_eq!(
            err.user_message(ConversionAction::GetHeaders),
            "Failed to read Excel file: bad zip"
        );
    }

    #[test]
    fn transport_errors_fall_back_per_action() {
        let err = WizardError::Transport("connection refused".to_string());
        assert_eq!(
            err.user_message(ConversionAction::GetPreview),
            GENERIC_FAILURE_MESSAGE
        );
        assert_eq!(
            err.user_message(ConversionAction::Convert),
            GENERIC_CONVERT_FAILURE_MESSAGE
        );
    }

    #[test]
    fn malformed_response_mentions_the_failed_step() {
        let err = WizardError::MalformedResponse {
            action: ConversionAction::Convert,
            detail: "missing field `cleaned_rows`".to_string(),
        };
        let msg = err.user_message(ConversionAction::Convert);
        assert!(msg.contains("unexpected response"), "{}", msg);
        assert!(msg.contains("Conversion failed"), "{}", msg);
    }
}
