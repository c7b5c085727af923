pub mod observer;
pub mod retrieval;
pub mod session_controller;

pub use observer::{channel_observer, NoopObserver, SessionObserver};
pub use session_controller::{validate_url, PollOutcome, SessionController};
