pub mod error;
pub mod format;
pub mod model;
pub mod platform;

pub use error::SessionError;
pub use format::{FormatBuckets, FormatDescriptor, FormatKind, FormatOption, BEST_FORMAT};
pub use model::{CompletedFile, JobStatus, MediaInfo, Session, SessionEvent};
pub use platform::{detect_platform, Platform};
