use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::{error::PayloadError, worker::PushMessageData};

/// Title shown when the push carries none ("Notification").
pub const DEFAULT_TITLE: &str = "Bildirim";
pub const DEFAULT_BODY: &str = "";
/// Served by the static asset server.
pub const DEFAULT_ICON: &str = "/static/img/icons/icon-192x192.png";
pub const DEFAULT_URL: &str = "/";

/// Fields a push payload may carry. Every field is optional and defaulted
/// independently when the display request is composed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NotificationPayload {
    /// Interprets the data attached to a push event. Never fails: a missing
    /// payload is all defaults and an undecodable one becomes a plain-text
    /// body under the default title.
    pub fn from_push_data(data: Option<&PushMessageData>) -> Self {
        let Some(data) = data else {
            return Self::default();
        };
        match Self::decode(data) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "falling back to plain text payload");
                Self::plain_text(data.text())
            }
        }
    }

    pub fn decode(data: &PushMessageData) -> Result<Self, PayloadError> {
        let value: Value = data.json()?;
        Ok(Self::from_value(&value))
    }

    /// Valid json that is not an object carries no fields.
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self {
                head: text_field(map, "head"),
                body: text_field(map, "body"),
                icon: text_field(map, "icon"),
                url: text_field(map, "url"),
            },
            None => Self::default(),
        }
    }

    pub fn plain_text(body: String) -> Self {
        Self {
            head: Some(DEFAULT_TITLE.to_string()),
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn into_display(self) -> DisplayRequest {
        DisplayRequest {
            title: or_default(self.head, DEFAULT_TITLE),
            options: NotificationOptions {
                body: or_default(self.body, DEFAULT_BODY),
                icon: or_default(self.icon, DEFAULT_ICON),
                data: NotificationData {
                    url: or_default(self.url, DEFAULT_URL),
                },
            },
        }
    }
}

// Falsy json values (null, false, 0, "") count as absent.
fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number_text(number)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

// Integral floats print without a fraction (`1.0` -> `1`), as number-to-text
// coercion does in the browser.
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e21 => {
            format!("{value:.0}")
        }
        _ => number.to_string(),
    }
}

fn or_default(field: Option<String>, default: &str) -> String {
    field
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Data attached to a shown notification, consulted again on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub data: NotificationData,
}

/// The arguments of the host's show-notification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub title: String,
    pub options: NotificationOptions,
}

/// A notification as rendered by the host. Owned by the host; the relay only
/// sees it again through an activation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedNotification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub data: NotificationData,
}

impl DisplayedNotification {
    pub fn new(id: u64, title: String, options: NotificationOptions) -> Self {
        Self {
            id,
            title,
            body: options.body,
            icon: options.icon,
            data: options.data,
        }
    }
}
