//! Background worker runtime: named event listeners registered explicitly at
//! start-up, and a dispatch loop that keeps every event alive until the work
//! its listeners attached with `wait_until` has settled.

mod event;

pub use event::{
    ExtendLifetime, Extension, NotificationEvent, PushEvent, PushMessageData, WorkerEvent,
};

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinSet,
};
use tracing::{debug, info, warn};

pub type PushListener = Arc<dyn Fn(&mut PushEvent) + Send + Sync>;
pub type NotificationClickListener = Arc<dyn Fn(&mut NotificationEvent) + Send + Sync>;

const QUEUE_CAPACITY: usize = 64;

/// What happened to one dispatched event once its lifetime ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub listeners: usize,
    pub extensions: usize,
    pub failed: usize,
}

#[derive(Default, Clone)]
pub struct ServiceWorker {
    push: Vec<PushListener>,
    notification_click: Vec<NotificationClickListener>,
}

impl ServiceWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_push_listener<F>(&mut self, listener: F)
    where
        F: Fn(&mut PushEvent) + Send + Sync + 'static,
    {
        self.push.push(Arc::new(listener));
    }

    pub fn add_notification_click_listener<F>(&mut self, listener: F)
    where
        F: Fn(&mut NotificationEvent) + Send + Sync + 'static,
    {
        self.notification_click.push(Arc::new(listener));
    }

    /// Runs the listeners registered for the event in registration order,
    /// then waits for everything they attached to the event.
    pub async fn dispatch(&self, event: WorkerEvent) -> DispatchReport {
        let name = event.name();
        let (listeners, lifetime) = match event {
            WorkerEvent::Push(mut event) => {
                for listener in &self.push {
                    listener(&mut event);
                }
                (self.push.len(), event.into_lifetime())
            }
            WorkerEvent::NotificationClick(mut event) => {
                for listener in &self.notification_click {
                    listener(&mut event);
                }
                (self.notification_click.len(), event.into_lifetime())
            }
        };
        if listeners == 0 {
            debug!(event = name, "no listener registered");
        }

        let extensions = lifetime.pending();
        let failed = lifetime.settle().await;
        debug!(event = name, extensions, failed, "event settled");
        DispatchReport {
            listeners,
            extensions,
            failed,
        }
    }

    /// Starts the dispatch loop on its own task and returns the handle used
    /// to deliver events to it.
    pub fn spawn(self, shutdown: oneshot::Receiver<()>) -> (WorkerHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(Arc::new(self).run(rx, shutdown));
        (WorkerHandle { tx }, task)
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Envelope>, mut shutdown: oneshot::Receiver<()>) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                envelope = events.recv() => {
                    let Some(Envelope { event, done }) = envelope else {
                        break;
                    };
                    let worker = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let report = worker.dispatch(event).await;
                        let _ = done.send(report);
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "event task aborted");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down worker...");
                    break;
                }
            }
        }
        // Pending lifetime extensions run to completion; nothing is cancelled.
        while in_flight.join_next().await.is_some() {}
    }
}

struct Envelope {
    event: WorkerEvent,
    done: oneshot::Sender<DispatchReport>,
}

/// Delivers events to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Resolves once the event's lifetime has ended.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<DispatchReport> {
        let (done, report) = oneshot::channel();
        self.tx
            .send(Envelope { event, done })
            .await
            .map_err(|_| anyhow::anyhow!("worker is not running"))?;
        report.await.context("worker dropped the event")
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::{sync::Notify, time::timeout};

    use super::*;

    fn push(bytes: &[u8]) -> WorkerEvent {
        WorkerEvent::Push(PushEvent::from_bytes(Some(bytes.to_vec())))
    }

    #[tokio::test]
    async fn dispatch_waits_for_extensions() {
        let settled = Arc::new(AtomicUsize::new(0));
        let mut worker = ServiceWorker::new();
        let counter = Arc::clone(&settled);
        worker.add_push_listener(move |event| {
            let counter = Arc::clone(&counter);
            event.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            });
        });

        let report = worker
            .dispatch(WorkerEvent::Push(PushEvent::from_bytes(None)))
            .await;

        assert_eq!(settled.load(Ordering::SeqCst), 1);
        assert_eq!(
            report,
            DispatchReport {
                listeners: 1,
                extensions: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn events_without_listeners_settle_immediately() {
        let worker = ServiceWorker::new();
        let report = worker
            .dispatch(WorkerEvent::Push(PushEvent::from_bytes(Some(b"x".to_vec()))))
            .await;
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn handle_routes_events_through_the_loop() {
        let mut worker = ServiceWorker::new();
        worker.add_push_listener(|event| {
            event.wait_until(async { Err::<(), _>(anyhow::anyhow!("display failed")) });
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handle, task) = worker.spawn(shutdown_rx);

        let report = handle
            .dispatch(WorkerEvent::Push(PushEvent::from_bytes(None)))
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(
            handle
                .dispatch(WorkerEvent::Push(PushEvent::from_bytes(None)))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn pending_event_does_not_block_the_next_one() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut worker = ServiceWorker::new();
        let (started_gate, release_gate) = (Arc::clone(&started), Arc::clone(&release));
        worker.add_push_listener(move |event| {
            let waits = event.data().map(PushMessageData::bytes) == Some(b"wait".as_slice());
            let release = Arc::clone(&release_gate);
            if waits {
                started_gate.notify_one();
            }
            event.wait_until(async move {
                if waits {
                    release.notified().await;
                } else {
                    release.notify_one();
                }
                anyhow::Ok(())
            });
        });
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handle, _task) = worker.spawn(shutdown_rx);

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.dispatch(push(b"wait")).await }
        });
        timeout(Duration::from_secs(1), started.notified())
            .await
            .unwrap();

        let second = timeout(Duration::from_secs(1), handle.dispatch(push(b"release"))).await;
        assert!(matches!(second, Ok(Ok(report)) if report.failed == 0));

        let first = timeout(Duration::from_secs(1), first).await;
        assert!(matches!(first, Ok(Ok(Ok(report))) if report.extensions == 1));
    }
}
