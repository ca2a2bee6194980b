use std::path::PathBuf;

/// Failure of a call to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("the generation service rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("API key not found. Enter a valid API key to continue.")]
    MissingCredential,
}

impl GenerationError {
    pub fn is_authorization_failure(&self) -> bool {
        match self {
            GenerationError::MissingCredential => true,
            other => is_authorization_message(&other.to_string()),
        }
    }
}

/// Error signatures the backend uses when the API key is absent or refused.
const AUTHORIZATION_SIGNATURES: [&str; 3] = ["api key not found", "api key not valid", "api_key_invalid"];

pub fn is_authorization_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    AUTHORIZATION_SIGNATURES
        .iter()
        .any(|signature| lowered.contains(signature))
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("could not decode narration audio: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which part of the system failed, as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The story text for the current turn could not be produced.
    Generation,
    /// Image, narration or animation of a committed segment failed.
    Media,
    /// The API key is missing or was refused.
    Authorization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub kind: FailureKind,
    pub message: String,
}

impl UserFacingError {
    pub fn credential_required() -> Self {
        Self {
            kind: FailureKind::Authorization,
            message: GenerationError::MissingCredential.to_string(),
        }
    }

    /// Inline failure of one media field of a committed segment.
    pub fn media(what: &str, message: &str) -> Self {
        Self {
            kind: FailureKind::Media,
            message: format!("{what} could not be generated: {message}"),
        }
    }

    pub fn turn_failed(err: &GenerationError) -> Self {
        let kind = if err.is_authorization_failure() {
            FailureKind::Authorization
        } else {
            FailureKind::Generation
        };

        Self {
            kind,
            message: format!(
                "Failed to generate the next part of the story. Please try again. ({err})"
            ),
        }
    }
}
