use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use url::Url;

use super::{ClientQueryOptions, ClientType, Host, WindowClient};
use crate::{
    error::HostError,
    notification::model::{DisplayedNotification, NotificationOptions},
};

/// Something the simulated browser did on behalf of the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    Shown { id: u64, title: String },
    Closed { id: u64 },
    Focused { id: u64, url: String },
    Opened { id: u64, url: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub notifications: Vec<DisplayedNotification>,
    pub windows: Vec<WindowClient>,
    pub actions: Vec<HostAction>,
}

#[derive(Default)]
struct Browser {
    notifications: Vec<DisplayedNotification>,
    // Most recently focused first, which is the order `match_all` reports.
    windows: Vec<WindowClient>,
    actions: Vec<HostAction>,
}

/// In-memory browser used by the dev harness.
///
/// Windows added with [`SimulatedHost::add_window`] keep the location they
/// were given; windows opened by the worker get the absolute URL resolved
/// against the origin, as a browser would report it.
pub struct SimulatedHost {
    origin: Url,
    open_window_enabled: bool,
    next_id: AtomicU64,
    browser: Mutex<Browser>,
}

impl SimulatedHost {
    pub fn new(origin: Url, open_window_enabled: bool) -> Self {
        Self {
            origin,
            open_window_enabled,
            next_id: AtomicU64::new(1),
            browser: Mutex::new(Browser::default()),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn add_window(&self, url: &str, focusable: bool, controlled: bool) -> WindowClient {
        let client = WindowClient {
            id: self.next_id(),
            url: url.to_string(),
            client_type: ClientType::Window,
            controlled,
            focusable,
        };
        self.browser().windows.push(client.clone());
        client
    }

    pub fn notification(&self, id: u64) -> Option<DisplayedNotification> {
        self.browser()
            .notifications
            .iter()
            .find(|notification| notification.id == id)
            .cloned()
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let browser = self.browser();
        HostSnapshot {
            notifications: browser.notifications.clone(),
            windows: browser.windows.clone(),
            actions: browser.actions.clone(),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn browser(&self) -> MutexGuard<'_, Browser> {
        self.browser.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Host for SimulatedHost {
    async fn show_notification(
        &self,
        title: String,
        options: NotificationOptions,
    ) -> Result<DisplayedNotification, HostError> {
        let notification = DisplayedNotification::new(self.next_id(), title, options);
        info!(
            id = notification.id,
            title = %notification.title,
            url = %notification.data.url,
            "notification shown"
        );
        let mut browser = self.browser();
        browser.actions.push(HostAction::Shown {
            id: notification.id,
            title: notification.title.clone(),
        });
        browser.notifications.push(notification.clone());
        Ok(notification)
    }

    fn close_notification(&self, notification: &DisplayedNotification) {
        let mut browser = self.browser();
        let before = browser.notifications.len();
        browser.notifications.retain(|shown| shown.id != notification.id);
        if browser.notifications.len() != before {
            browser.actions.push(HostAction::Closed {
                id: notification.id,
            });
        }
    }

    async fn match_all(&self, query: ClientQueryOptions) -> Result<Vec<WindowClient>, HostError> {
        Ok(self
            .browser()
            .windows
            .iter()
            .filter(|client| query.client_type == ClientType::All || client.client_type == query.client_type)
            .filter(|client| query.include_uncontrolled || client.controlled)
            .cloned()
            .collect())
    }

    async fn focus(&self, client: &WindowClient) -> Result<WindowClient, HostError> {
        let mut browser = self.browser();
        let position = browser
            .windows
            .iter()
            .position(|open| open.id == client.id)
            .ok_or(HostError::UnknownClient(client.id))?;
        if !browser.windows[position].focusable {
            return Err(HostError::FocusRejected(client.id));
        }
        let focused = browser.windows.remove(position);
        info!(id = focused.id, url = %focused.url, "window focused");
        browser.actions.push(HostAction::Focused {
            id: focused.id,
            url: focused.url.clone(),
        });
        browser.windows.insert(0, focused.clone());
        Ok(focused)
    }

    fn supports_open_window(&self) -> bool {
        self.open_window_enabled
    }

    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>, HostError> {
        if !self.open_window_enabled {
            return Err(HostError::OpenRejected {
                url: url.to_string(),
                reason: "opening windows is disabled".to_string(),
            });
        }
        let resolved = self
            .origin
            .join(url)
            .map_err(|err| HostError::OpenRejected {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        let client = WindowClient {
            id: self.next_id(),
            url: resolved.to_string(),
            client_type: ClientType::Window,
            controlled: true,
            focusable: true,
        };
        info!(id = client.id, url = %client.url, "window opened");
        let mut browser = self.browser();
        browser.actions.push(HostAction::Opened {
            id: client.id,
            url: client.url.clone(),
        });
        browser.windows.insert(0, client.clone());
        Ok(Some(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::NotificationData;

    fn host() -> SimulatedHost {
        SimulatedHost::new(Url::parse("http://localhost:8080").unwrap(), true)
    }

    #[tokio::test]
    async fn match_all_honours_uncontrolled_flag() {
        let host = host();
        host.add_window("/a", true, true);
        host.add_window("/b", true, false);

        let all = host.match_all(ClientQueryOptions::all_windows()).await.unwrap();
        assert_eq!(all.len(), 2);

        let controlled = host
            .match_all(ClientQueryOptions {
                client_type: ClientType::Window,
                include_uncontrolled: false,
            })
            .await
            .unwrap();
        assert_eq!(controlled.len(), 1);
        assert_eq!(controlled[0].url, "/a");
    }

    #[tokio::test]
    async fn focus_moves_window_to_front() {
        let host = host();
        host.add_window("/a", true, true);
        let second = host.add_window("/b", true, true);

        host.focus(&second).await.unwrap();

        let windows = host.match_all(ClientQueryOptions::all_windows()).await.unwrap();
        assert_eq!(windows[0].id, second.id);
    }

    #[tokio::test]
    async fn focus_rejects_unfocusable_and_unknown_windows() {
        let host = host();
        let frozen = host.add_window("/a", false, true);
        assert!(matches!(
            host.focus(&frozen).await,
            Err(HostError::FocusRejected(_))
        ));

        let gone = WindowClient { id: 99, ..frozen };
        assert!(matches!(
            host.focus(&gone).await,
            Err(HostError::UnknownClient(99))
        ));
    }

    #[tokio::test]
    async fn open_window_resolves_against_origin() {
        let host = host();
        let opened = host.open_window("/items/42").await.unwrap().unwrap();
        assert_eq!(opened.url, "http://localhost:8080/items/42");
    }

    #[tokio::test]
    async fn open_window_disabled() {
        let host = SimulatedHost::new(Url::parse("http://localhost:8080").unwrap(), false);
        assert!(!host.supports_open_window());
        assert!(host.open_window("/").await.is_err());
        assert!(host.snapshot().windows.is_empty());
    }

    #[tokio::test]
    async fn close_removes_shown_notification() {
        let host = host();
        let shown = host
            .show_notification(
                "t".to_string(),
                NotificationOptions {
                    body: String::new(),
                    icon: "/i.png".to_string(),
                    data: NotificationData {
                        url: "/".to_string(),
                    },
                },
            )
            .await
            .unwrap();
        assert!(host.notification(shown.id).is_some());

        host.close_notification(&shown);
        host.close_notification(&shown);

        assert!(host.notification(shown.id).is_none());
        assert_eq!(
            host.snapshot().actions,
            vec![
                HostAction::Shown {
                    id: shown.id,
                    title: "t".to_string()
                },
                HostAction::Closed { id: shown.id },
            ]
        );
    }
}
