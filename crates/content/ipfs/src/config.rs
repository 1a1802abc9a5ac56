use std::time::Duration;

/// Configuration for the IPFS content store.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// Base URL of the daemon's HTTP RPC API (e.g. `http://127.0.0.1:5001`).
    pub url: String,

    /// Timeout applied to every non-streaming API call. Streaming reads
    /// (`cat`, `refs/local`) are only bounded by `connect_timeout`.
    pub request_timeout: Duration,

    /// Timeout for establishing a connection to the daemon.
    pub connect_timeout: Duration,
}

impl IpfsConfig {
    /// Create a configuration for the daemon at `url` with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build a full endpoint URL from an API path like `pin/add`.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.url.trim_end_matches('/'))
    }
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://127.0.0.1:5001"),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = IpfsConfig::default();
        assert_eq!(cfg.url, "http://127.0.0.1:5001");
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let cfg = IpfsConfig::new("http://ipfs:5001/");
        assert_eq!(cfg.endpoint("pin/add"), "http://ipfs:5001/api/v0/pin/add");
    }
}
