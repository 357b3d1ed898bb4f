use std::future::Future;

use futures::future::{BoxFuture, FutureExt, join_all};
use serde::de::DeserializeOwned;

use crate::{error::PayloadError, notification::model::DisplayedNotification};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Raw bytes attached to a push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessageData {
    bytes: Vec<u8>,
}

impl PushMessageData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// UTF-8 text with a leading byte order mark skipped and invalid
    /// sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.without_bom()).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        Ok(serde_json::from_slice(self.without_bom())?)
    }

    fn without_bom(&self) -> &[u8] {
        self.bytes.strip_prefix(BOM).unwrap_or(&self.bytes)
    }
}

/// Outcome of one piece of work attached to an event.
pub type Extension = BoxFuture<'static, anyhow::Result<()>>;

/// Work the runtime must await before it may consider an event finished.
#[derive(Default)]
pub struct ExtendLifetime {
    pending: Vec<Extension>,
}

impl ExtendLifetime {
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.pending.push(work.boxed());
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Awaits every attached future and returns how many of them failed.
    pub async fn settle(self) -> usize {
        join_all(self.pending)
            .await
            .into_iter()
            .filter(|outcome| outcome.is_err())
            .count()
    }
}

pub struct PushEvent {
    data: Option<PushMessageData>,
    lifetime: ExtendLifetime,
}

impl PushEvent {
    pub fn new(data: Option<PushMessageData>) -> Self {
        Self {
            data,
            lifetime: ExtendLifetime::default(),
        }
    }

    /// An empty body still counts as an attached payload.
    pub fn from_bytes(bytes: Option<Vec<u8>>) -> Self {
        Self::new(bytes.map(PushMessageData::new))
    }

    pub fn data(&self) -> Option<&PushMessageData> {
        self.data.as_ref()
    }

    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifetime.wait_until(work);
    }

    pub fn into_lifetime(self) -> ExtendLifetime {
        self.lifetime
    }
}

pub struct NotificationEvent {
    notification: DisplayedNotification,
    lifetime: ExtendLifetime,
}

impl NotificationEvent {
    pub fn new(notification: DisplayedNotification) -> Self {
        Self {
            notification,
            lifetime: ExtendLifetime::default(),
        }
    }

    pub fn notification(&self) -> &DisplayedNotification {
        &self.notification
    }

    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifetime.wait_until(work);
    }

    pub fn into_lifetime(self) -> ExtendLifetime {
        self.lifetime
    }
}

/// Events the host dispatches to the worker.
pub enum WorkerEvent {
    Push(PushEvent),
    NotificationClick(NotificationEvent),
}

impl WorkerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick(_) => "notificationclick",
        }
    }
}
