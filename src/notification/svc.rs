use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::model::NotificationPayload;
use crate::{
    host::{ClientQueryOptions, Host},
    worker::{NotificationEvent, PushEvent, ServiceWorker},
};

/// Shows pushed payloads as notifications and routes clicks on them to a
/// client window. Holds no state between events.
pub struct NotificationRelay {
    host: Arc<dyn Host>,
}

impl NotificationRelay {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    /// Wires both handlers into the worker. Called once during start-up.
    pub fn register(self: Arc<Self>, worker: &mut ServiceWorker) {
        let relay = Arc::clone(&self);
        worker.add_push_listener(move |event| relay.handle_push(event));
        worker.add_notification_click_listener(move |event| self.handle_notification_click(event));
    }

    pub fn handle_push(&self, event: &mut PushEvent) {
        let request = NotificationPayload::from_push_data(event.data()).into_display();
        debug!(title = %request.title, url = %request.options.data.url, "showing push");

        let host = Arc::clone(&self.host);
        event.wait_until(async move {
            host.show_notification(request.title, request.options)
                .await
                .inspect_err(|err| debug!(error = %err, "host did not show notification"))?;
            anyhow::Ok(())
        });
    }

    pub fn handle_notification_click(&self, event: &mut NotificationEvent) {
        self.host.close_notification(event.notification());
        let url = event.notification().data.url.clone();

        let host = Arc::clone(&self.host);
        event.wait_until(async move { Self::route(host.as_ref(), &url).await });
    }

    /// Focuses the first focusable window already at `url`, otherwise opens
    /// one there when the host can.
    async fn route(host: &dyn Host, url: &str) -> Result<()> {
        let clients = host.match_all(ClientQueryOptions::all_windows()).await?;
        if let Some(client) = clients
            .iter()
            .find(|client| client.url == url && client.focusable)
        {
            debug!(id = client.id, url, "focusing existing window");
            host.focus(client).await?;
            return Ok(());
        }

        if host.supports_open_window() {
            debug!(url, "opening new window");
            host.open_window(url).await?;
        }
        Ok(())
    }
}
