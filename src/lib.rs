pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use application::{SessionController, SessionObserver};
pub use config::ApiConfig;
pub use domain::{JobStatus, Platform, Session, SessionError, SessionEvent};
