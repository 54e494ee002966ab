use crate::monitor::state::StatusSnapshot;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Host-side consumer of status changes
pub trait StatusObserver: Send + Sync {
    fn on_state_change(&self, snapshot: &StatusSnapshot);
}

impl<F> StatusObserver for F
where
    F: Fn(&StatusSnapshot) + Send + Sync,
{
    fn on_state_change(&self, snapshot: &StatusSnapshot) {
        self(snapshot)
    }
}

/// Forwards snapshots into a channel; a closed receiver is ignored
#[derive(Clone)]
pub struct ChannelObserver(pub mpsc::UnboundedSender<StatusSnapshot>);

impl StatusObserver for ChannelObserver {
    fn on_state_change(&self, snapshot: &StatusSnapshot) {
        let _ = self.0.send(snapshot.clone());
    }
}

/// Pushes every state change to observers and keeps the latest snapshot
/// for pull access.
pub struct StatusPublisher {
    observers: Vec<Arc<dyn StatusObserver>>,
    current: watch::Sender<StatusSnapshot>,
    published: u64,
}

impl StatusPublisher {
    pub fn new(initial: StatusSnapshot) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            observers: Vec::new(),
            current,
            published: 0,
        }
    }

    pub fn subscribe(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.current.subscribe()
    }

    pub fn publish(&mut self, snapshot: StatusSnapshot) {
        self.published += 1;
        for observer in &self.observers {
            observer.on_state_change(&snapshot);
        }
        self.current.send_replace(snapshot);
    }

    pub fn current(&self) -> StatusSnapshot {
        self.current.borrow().clone()
    }

    /// Number of publish calls so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::state::LivenessState;
    use chrono::Utc;
    use std::sync::Mutex;

    #[test]
    fn test_publish_reaches_observers_and_watchers() {
        let state = LivenessState::new("dev", None, Utc::now());
        let mut publisher = StatusPublisher::new(state.snapshot());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        publisher.subscribe(Arc::new(move |s: &StatusSnapshot| {
            sink.lock().unwrap().push(s.update_count)
        }));
        let watcher = publisher.watch();

        let mut next = state.snapshot();
        next.update_count = 3;
        publisher.publish(next);

        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert_eq!(watcher.borrow().update_count, 3);
        assert_eq!(publisher.current().update_count, 3);
        assert_eq!(publisher.published(), 1);
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let state = LivenessState::new("dev", None, Utc::now());
        let mut publisher = StatusPublisher::new(state.snapshot());
        let (tx, rx) = mpsc::unbounded_channel();
        publisher.subscribe(Arc::new(ChannelObserver(tx)));
        drop(rx);
        publisher.publish(state.snapshot());
        assert_eq!(publisher.published(), 1);
    }
}
