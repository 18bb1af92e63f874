use thiserror::Error;

/// Main error type for the subtitle translation server
#[derive(Error, Debug)]
pub enum SubtransError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("No cues supplied")]
    EmptyCueSet,

    #[error("Subtitle parse error: {0}")]
    SubtitleParse(String),

    // The field must not be called `source`: thiserror would wire it up as
    // the error's cause and demand `std::error::Error` of it.
    #[error("Record not found: platform={platform}, video={video_id}, {source_language}->{target_language}")]
    RecordNotFound {
        platform: String,
        video_id: String,
        source_language: String,
        target_language: String,
    },

    #[error("Record rejected: {0}")]
    RecordRejected(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Translation-provider-specific errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response item count mismatch: sent {sent}, received {received}")]
    CountMismatch { sent: usize, received: usize },

    #[error("Batch timed out after {0} ms")]
    Timeout(u64),

    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SubtransError>;
