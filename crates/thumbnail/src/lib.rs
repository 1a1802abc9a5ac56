pub mod cache;
pub mod config;
pub mod error;
pub mod resizer;

pub use cache::{Thumbnail, ThumbnailCache, ThumbnailKind};
pub use config::{DEFAULT_THUMBNAIL_SIZE, ThumbnailConfig};
pub use error::ThumbnailError;
pub use resizer::{ImageResizer, Resizer};
