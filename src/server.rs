//! Dev harness that plays the browser: HTTP requests become push and
//! notification-click events for the worker, and the simulated host records
//! what the worker asked it to do.

use std::{future::Future, io, sync::Arc};

use anyhow::{Context, Result};
use request_http_parser::parser::{Method, Request};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot::{Receiver, Sender},
};
use tracing::{debug, error, info, warn};

use crate::{
    host::SimulatedHost,
    notification::alert::LowStockAlert,
    worker::{DispatchReport, NotificationEvent, PushEvent, WorkerEvent, WorkerHandle},
};

pub const BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\n\r\n";
pub const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\n\r\n";
pub const SERVICE_UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\n\r\n";
pub const OPTIONS_CORS: &str = "HTTP/1.1 204 No Content\r\n\
            Access-Control-Allow-Origin: *\r\n\
            Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
            Access-Control-Allow-Headers: Content-Type\r\n\
            Access-Control-Max-Age: 86400\r\n\
            \r\n";
pub const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
            Access-Control-Allow-Origin: *\r\n\
            Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
            Access-Control-Allow-Headers: Content-Type\r\n\
            Access-Control-Max-Age: 86400\r\n\
            Content-Type: application/json\r\n\
            \r\n";

const MAX_REQUEST: usize = 4048;

/// Sends the shutdown signal once `signal` fires. If the signal cannot be
/// listened for, the sender is kept alive so the server keeps running.
pub async fn forward_shutdown<S>(signal: S, shutdown_tx: Sender<()>)
where
    S: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            let _ = shutdown_tx.send(());
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClickRequest {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct OpenWindowRequest {
    url: String,
    #[serde(default = "enabled")]
    focusable: bool,
    #[serde(default = "enabled")]
    controlled: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Serialize)]
struct LowStockResponse {
    alerted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<DispatchReport>,
}

#[derive(Clone)]
pub struct Server {
    worker: WorkerHandle,
    host: Arc<SimulatedHost>,
}

impl Server {
    pub fn new(worker: WorkerHandle, host: Arc<SimulatedHost>) -> Self {
        Self { worker, host }
    }

    pub async fn start(self, bind_addr: &str, mut shutdown_rx: Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        info!("Harness running on http://{bind_addr}");

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    let (mut stream, peer) = conn?;
                    let server = self.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = stream.split();
                        if let Err(e) = server.handle_client(reader, writer).await {
                            warn!(%peer, error = %e, "connection error");
                        }
                    });
                }
                _ = &mut shutdown_rx => {
                    info!("Shutting down server...");
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn handle_client<Reader, Writer>(&self, mut reader: Reader, mut writer: Writer) -> Result<()>
    where
        Reader: AsyncRead + Unpin,
        Writer: AsyncWrite + Unpin,
    {
        let mut buffer = [0; MAX_REQUEST];
        let size = reader
            .read(&mut buffer)
            .await
            .context("Failed to read stream")?;
        if size >= MAX_REQUEST {
            debug!("request too large");
            return Self::respond(&mut writer, BAD_REQUEST, "Request too large").await;
        }
        let request = String::from_utf8_lossy(&buffer[..size]);
        let request = match Request::new(&request) {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, "unparsable request");
                return Self::respond(&mut writer, BAD_REQUEST, &e.to_string()).await;
            }
        };

        // Router
        let (status, content) = match (&request.method, request.path.as_str()) {
            (Method::OPTIONS, _) => (OPTIONS_CORS, String::new()),
            (Method::POST, "/push") => self.push(request.body.as_deref()).await,
            (Method::POST, "/low-stock") => self.low_stock(request.body.as_deref()).await,
            (Method::POST, "/notification-click") => self.click(request.body.as_deref()).await,
            (Method::POST, "/windows") => self.open_window(request.body.as_deref()),
            (_, "/state") => Self::json(&self.host.snapshot()),
            _ => (NOT_FOUND, "404 Not Found".to_string()),
        };

        Self::respond(&mut writer, status, &content).await
    }

    async fn push(&self, body: Option<&str>) -> (&'static str, String) {
        let payload = body
            .filter(|body| !body.is_empty())
            .map(|body| body.as_bytes().to_vec());
        self.dispatch(WorkerEvent::Push(PushEvent::from_bytes(payload)))
            .await
    }

    async fn low_stock(&self, body: Option<&str>) -> (&'static str, String) {
        let alert = match body.map(serde_json::from_str::<LowStockAlert>) {
            Some(Ok(alert)) => alert,
            _ => return (BAD_REQUEST, "expected {\"product_name\", \"stock\"}".to_string()),
        };
        let Some(payload) = alert.payload() else {
            return Self::json(&LowStockResponse {
                alerted: false,
                report: None,
            });
        };
        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => return (BAD_REQUEST, e.to_string()),
        };
        let event = WorkerEvent::Push(PushEvent::from_bytes(Some(bytes)));
        match self.worker.dispatch(event).await {
            Ok(report) => Self::json(&LowStockResponse {
                alerted: true,
                report: Some(report),
            }),
            Err(e) => {
                error!(error = %e, "worker unavailable");
                (SERVICE_UNAVAILABLE, e.to_string())
            }
        }
    }

    async fn click(&self, body: Option<&str>) -> (&'static str, String) {
        let click = match body.map(serde_json::from_str::<ClickRequest>) {
            Some(Ok(click)) => click,
            _ => return (BAD_REQUEST, "expected {\"id\"}".to_string()),
        };
        let Some(notification) = self.host.notification(click.id) else {
            return (NOT_FOUND, format!("no notification {}", click.id));
        };
        self.dispatch(WorkerEvent::NotificationClick(NotificationEvent::new(notification)))
            .await
    }

    fn open_window(&self, body: Option<&str>) -> (&'static str, String) {
        let window = match body.map(serde_json::from_str::<OpenWindowRequest>) {
            Some(Ok(window)) => window,
            _ => return (BAD_REQUEST, "expected {\"url\"}".to_string()),
        };
        let client = self
            .host
            .add_window(&window.url, window.focusable, window.controlled);
        Self::json(&client)
    }

    async fn dispatch(&self, event: WorkerEvent) -> (&'static str, String) {
        match self.worker.dispatch(event).await {
            Ok(report) => Self::json(&report),
            Err(e) => {
                error!(error = %e, "worker unavailable");
                (SERVICE_UNAVAILABLE, e.to_string())
            }
        }
    }

    fn json<T: Serialize>(value: &T) -> (&'static str, String) {
        match serde_json::to_string(value) {
            Ok(body) => (OK_RESPONSE, body),
            Err(e) => (BAD_REQUEST, e.to_string()),
        }
    }

    async fn respond<Writer>(writer: &mut Writer, status: &str, content: &str) -> Result<()>
    where
        Writer: AsyncWrite + Unpin,
    {
        writer
            .write_all(format!("{status}{content}").as_bytes())
            .await
            .context("Failed to write")?;
        writer.flush().await.context("Failed to flush")
    }
}
