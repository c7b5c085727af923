use std::sync::Arc;

use futures::channel::mpsc;
use log::debug;

use crate::domain::SessionEvent;

/// Receives every change of a session. Called with the session lock
/// released, possibly from a background polling task.
pub trait SessionObserver: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn notify(&self, event: SessionEvent) {
        self(event)
    }
}

/// Observer that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn notify(&self, _event: SessionEvent) {}
}

/// Observer forwarding events into a channel, for hosts that consume a stream
pub fn channel_observer() -> (Arc<dyn SessionObserver>, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded();
    let observer: Arc<dyn SessionObserver> = Arc::new(move |event: SessionEvent| {
        if tx.unbounded_send(event).is_err() {
            debug!("Session event dropped, receiver is gone");
        }
    });
    (observer, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_channel_observer_forwards_in_order() {
        let (observer, mut rx) = channel_observer();
        observer.notify(SessionEvent::StatusChanged(JobStatus::Analyzing));
        observer.notify(SessionEvent::Reset);
        drop(observer);

        assert_eq!(
            rx.next().await,
            Some(SessionEvent::StatusChanged(JobStatus::Analyzing))
        );
        assert_eq!(rx.next().await, Some(SessionEvent::Reset));
        assert_eq!(rx.next().await, None);
    }

    #[test]
    fn test_noop_observer_accepts_events() {
        NoopObserver.notify(SessionEvent::Reset);
    }
}
