use thiserror::Error;

/// The one failure the relay recognizes on its own: a push payload that is
/// not structured data. Always recovered by the plain-text fallback.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("push payload is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures reported by the host platform. The relay never retries these.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host declined to show notification: {0}")]
    ShowRejected(String),

    #[error("window {0} cannot be focused")]
    FocusRejected(u64),

    #[error("window {0} is no longer open")]
    UnknownClient(u64),

    #[error("cannot open window at {url}: {reason}")]
    OpenRejected { url: String, reason: String },
}
