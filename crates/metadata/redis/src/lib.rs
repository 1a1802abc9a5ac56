mod backend;
mod config;
mod pattern;

pub use backend::RedisMetadataBackend;
pub use config::RedisConfig;
