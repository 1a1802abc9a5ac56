pub mod background;
pub mod cleaner;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod service;
mod timeout;

pub use background::{BackgroundConfig, BackgroundProcessor, BackgroundProcessorBuilder};
pub use cleaner::{Cleaner, CleanerConfig, SweepReport};
pub use error::LifecycleError;
pub use metrics::{LifecycleMetrics, MetricsSnapshot};
pub use reconciler::{PinFailure, PinReport, ReconcileReport, Reconciler, ReconcilerConfig};
pub use service::{Attachment, AttachmentService, AttachmentServiceBuilder, ServiceConfig};

pub use tokio_util::sync::CancellationToken;
