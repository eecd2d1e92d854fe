use thiserror::Error;

#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl NonceError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new collaborator error
    pub fn collaborator<S: Into<String>>(msg: S) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Check if this error was caused by invalid configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Base64Error(_))
    }

    /// Check if this error was raised by an injected collaborator
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator(_))
    }
}

pub type Result<T> = std::result::Result<T, NonceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let error = NonceError::configuration("lifetime must be positive");
        assert!(error.is_configuration());
        assert!(!error.is_collaborator());
        assert_eq!(
            error.to_string(),
            "Configuration error: lifetime must be positive"
        );
    }

    #[test]
    fn test_collaborator_error() {
        let error = NonceError::collaborator("secret source returned an empty key");
        assert!(error.is_collaborator());
        assert!(!error.is_configuration());
    }
}
