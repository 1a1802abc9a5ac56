use serde::Deserialize;

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// `max-age` sent with every attachment and thumbnail response.
    #[serde(default = "default_cache_duration")]
    pub cache_duration_seconds: u64,
    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Limit for each single backend call made while serving a request.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_duration_seconds: default_cache_duration(),
            max_upload_bytes: default_max_upload_bytes(),
            call_timeout_seconds: default_call_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_cache_duration() -> u64 {
    30 * 24 * 60 * 60
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_call_timeout() -> u64 {
    30
}
