//! The platform side of the worker: everything the relay asks the host to do.

mod simulated;

pub use simulated::{HostAction, HostSnapshot, SimulatedHost};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::HostError,
    notification::model::{DisplayedNotification, NotificationOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Window,
    All,
}

/// Filter for `Host::match_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQueryOptions {
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub include_uncontrolled: bool,
}

impl ClientQueryOptions {
    /// Every window, whether or not this worker controls it yet.
    pub fn all_windows() -> Self {
        Self {
            client_type: ClientType::Window,
            include_uncontrolled: true,
        }
    }
}

/// A client window as enumerated by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: u64,
    pub url: String,
    pub client_type: ClientType,
    pub controlled: bool,
    pub focusable: bool,
}

#[async_trait]
pub trait Host: Send + Sync {
    async fn show_notification(
        &self,
        title: String,
        options: NotificationOptions,
    ) -> Result<DisplayedNotification, HostError>;

    fn close_notification(&self, notification: &DisplayedNotification);

    /// Clients in host-defined order.
    async fn match_all(&self, query: ClientQueryOptions) -> Result<Vec<WindowClient>, HostError>;

    async fn focus(&self, client: &WindowClient) -> Result<WindowClient, HostError>;

    fn supports_open_window(&self) -> bool;

    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>, HostError>;
}
