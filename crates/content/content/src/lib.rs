pub mod error;
pub mod store;
pub mod stream;
pub mod testing;

pub use error::ContentError;
pub use store::{Capabilities, ContentStore};
pub use stream::{ByteStream, collect_bytes, once};
