mod cid;
mod config;
mod error;
mod store;
mod types;

pub use config::IpfsConfig;
pub use store::IpfsContentStore;
