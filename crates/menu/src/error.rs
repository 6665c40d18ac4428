//! Menu error types.

use thiserror::Error;

/// Errors raised while refreshing the menu.
#[derive(Debug, Error)]
pub enum MenuError {
    /// The configured value could not be turned into a menu.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    /// A property file could not be read.
    #[error("Failed to read property file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A property file is not valid JSON.
    #[error("Invalid property file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A property exists but is not a string.
    #[error("Property '{key}' in {source_name} is not a string")]
    NotAString { key: String, source_name: String },

    /// The refresh coordinator is no longer accepting events.
    #[error("Refresh coordinator has stopped")]
    CoordinatorStopped,
}

impl MenuError {
    /// Whether this is the missing-configuration failure that leaves the menu untouched.
    pub fn is_config_missing(&self) -> bool {
        matches!(
            self,
            MenuError::Domain(domain::DomainError::MenuConfigMissing { .. })
        )
    }
}

/// Result type for menu operations.
pub type Result<T> = std::result::Result<T, MenuError>;
