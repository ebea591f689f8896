use thiserror::Error;

/// Error types that can occur while driving a persona session or the proxy.
#[derive(Debug, Error)]
pub enum PersonaError {
    /// A precondition failed: empty input, bad index, wrong role, nothing to commit
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// `init` was called on a session that is already initialized
    #[error("Persona has already been initialized")]
    AlreadyInitialized,
    /// The upstream returned no choices where at least one was required
    #[error("Upstream returned no choices")]
    EmptyChoices,
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Errors returned by the completion service
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// API response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Configuration could not be loaded or is incomplete
    #[error("Config error: {0}")]
    ConfigError(String),
    /// Writing to a sink or reading a file failed
    #[error("IO error: {0}")]
    Io(String),
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
}

impl PersonaError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PersonaError::InvalidInput(msg.into())
    }

    /// Whether the error came from the completion service rather than from
    /// local validation.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PersonaError::HttpError(_)
                | PersonaError::AuthError(_)
                | PersonaError::ProviderError(_)
                | PersonaError::ResponseFormatError { .. }
                | PersonaError::JsonError(_)
        )
    }
}

/// Converts reqwest HTTP errors into PersonaErrors
impl From<reqwest::Error> for PersonaError {
    fn from(err: reqwest::Error) -> Self {
        PersonaError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for PersonaError {
    fn from(err: serde_json::Error) -> Self {
        PersonaError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<std::io::Error> for PersonaError {
    fn from(err: std::io::Error) -> Self {
        PersonaError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for PersonaError {
    fn from(err: toml::de::Error) -> Self {
        PersonaError::ConfigError(err.to_string())
    }
}
