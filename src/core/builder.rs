use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use super::cell::{Shared, StateCell};
use super::config::Config;
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`StateCell`] with optional features.
pub struct StateCellBuilder<T> {
    seed: T,
    cfg: Config,
    name: Option<Arc<str>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<T> StateCellBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new builder holding the seed value (revision 0).
    pub fn new(seed: T) -> Self {
        Self {
            seed,
            cfg: Config::default(),
            name: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Names the cell; the name is carried in every lifecycle event.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (attach/detach, close, drain)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the cell.
    ///
    /// With subscribers configured this spawns a listener task and one worker
    /// per subscriber, so it must be called inside a tokio runtime. Without
    /// subscribers no task is spawned.
    pub fn build(self) -> StateCell<T> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shared = Shared::new(self.seed, self.cfg, self.name, bus.clone());

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            // Subscribe before returning so no event of this cell is missed.
            spawn_listener(bus.subscribe(), set, shared.runtime_token.clone());
        }
        StateCell::from_shared(Arc::new(shared))
    }
}

/// Forwards bus events to the subscriber set until the cell is dropped.
///
/// Events still buffered at that point are delivered before the set shuts down.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    runtime_token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => {
                        set.emit(&Event::subscriber_overflow("listener", "lagged"));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = runtime_token.cancelled() => break,
            }
        }

        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        set.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::events::EventKind;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(EventKind, Option<Arc<str>>)>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().push((ev.kind, ev.cell.clone()));
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn subscribers_receive_named_events() {
        let rec = Arc::new(Recorder::default());
        let cell = StateCell::builder(0u32)
            .with_name("temperature")
            .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
            .build();

        let cursor = cell.subscribe();
        drop(cursor);
        cell.close();
        drop(cell);

        let expected = vec![
            EventKind::ObserverAttached,
            EventKind::ObserverDetached,
            EventKind::CellClosed,
        ];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let seen = rec.seen.lock().clone();
            if seen.len() >= expected.len() {
                let kinds: Vec<EventKind> = seen.iter().map(|(k, _)| *k).collect();
                assert_eq!(kinds, expected);
                assert!(seen.iter().all(|(_, c)| c.as_deref() == Some("temperature")));
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "events not delivered: {seen:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn build_without_subscribers_needs_no_runtime() {
        let cell = StateCellBuilder::new("x").with_name("plain").build();
        assert_eq!(cell.name(), Some("plain"));
        assert_eq!(cell.config().bus_capacity, 1024);
    }
}
