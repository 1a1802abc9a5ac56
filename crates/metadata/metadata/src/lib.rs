pub mod backend;
pub mod error;
pub mod index;
pub mod testing;
pub mod timestamp;

pub use backend::MetadataBackend;
pub use error::MetadataError;
pub use index::{MetadataIndex, RebuildReport};
pub use timestamp::parse_timestamp;
