mod backends;
mod logging;
mod maintenance;
mod server;


pub use backends::*;
pub use logging::*;
pub use maintenance::*;
pub use server::*;

use std::path::Path;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the stowage server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct StowageConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Content backend configuration.
    #[serde(default)]
    pub content: ContentConfig,
    /// Metadata backend configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Thumbnail generation and caching.
    #[serde(default)]
    pub thumbnails: ThumbnailsConfig,
    /// Expiration sweeps.
    #[serde(default)]
    pub cleaner: CleanerSection,
    /// Pin reconciliation.
    #[serde(default)]
    pub reconciler: ReconcilerSection,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StowageConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or values of the wrong type.
    pub fn parse(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }
}
