//! Error types and handling for address-rs.

/// Result type alias for address operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for address operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured input that cannot be placed in a hierarchy
    #[error("Inconsistent input: {message}")]
    InconsistentInput {
        /// Error message
        message: String,
    },

    /// A provider tag with no registry mapping
    #[error("Unknown address component kind: {key}")]
    UnknownKind {
        /// The unrecognised tag
        key: String,
    },

    /// A value the coercion layer cannot turn into an address
    #[error("Invalid address value: {message}")]
    InvalidAddressValue {
        /// Error message
        message: String,
    },

    /// A stored entity that does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error message
        message: String,
    },

    /// Uniqueness violation on insert
    #[error("Conflict: {message}")]
    Conflict {
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Geocoding provider errors
    #[cfg(feature = "google")]
    #[error("Geocoding error: {message}")]
    GeocodingError {
        /// Error message
        message: String,
    },

    /// I/O errors
    #[error("I/O error: {source}")]
    IoError {
        /// Source error
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a new inconsistent input error
    pub fn inconsistent_input(message: impl Into<String>) -> Self {
        Self::InconsistentInput {
            message: message.into(),
        }
    }

    /// Create a new unknown kind error
    pub fn unknown_kind(key: impl Into<String>) -> Self {
        Self::UnknownKind { key: key.into() }
    }

    /// Create a new invalid address value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidAddressValue {
            message: message.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new geocoding error
    #[cfg(feature = "google")]
    pub fn geocoding_error(message: impl Into<String>) -> Self {
        Self::GeocodingError {
            message: message.into(),
        }
    }

    /// Whether this error is a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
