pub mod clock;
pub mod error;
pub mod id;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AttachmentError;
pub use id::{ContentId, InvalidContentId};
pub use record::AttachmentRecord;
