use serde::Deserialize;

use super::model::{DEFAULT_ICON, NotificationPayload};

pub const DEFAULT_THRESHOLD: u32 = 3;

/// A product whose stock may have dropped far enough to alert on.
#[derive(Debug, Clone, Deserialize)]
pub struct LowStockAlert {
    pub product_name: String,
    pub stock: u32,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

impl LowStockAlert {
    pub fn new(product_name: impl Into<String>, stock: u32) -> Self {
        Self {
            product_name: product_name.into(),
            stock,
            threshold: DEFAULT_THRESHOLD,
            target_url: None,
            icon: default_icon(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn is_low(&self) -> bool {
        self.stock <= self.threshold
    }

    /// `None` while stock is above the threshold.
    pub fn payload(&self) -> Option<NotificationPayload> {
        if !self.is_low() {
            return None;
        }
        Some(NotificationPayload {
            head: Some("Stok Uyarısı".to_string()),
            body: Some(format!(
                "{} ürününün stoğu {} adetin altına düştü.",
                self.product_name, self.stock
            )),
            icon: Some(self.icon.clone()),
            url: self.target_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::DEFAULT_URL;

    #[test]
    fn stock_at_threshold_is_low() {
        assert!(LowStockAlert::new("Kalem", 3).is_low());
        assert!(!LowStockAlert::new("Kalem", 4).is_low());
        assert!(LowStockAlert::new("Kalem", 4).payload().is_none());
    }

    #[test]
    fn payload_describes_product() {
        let display = LowStockAlert::new("Defter", 2)
            .with_target_url("/products/7")
            .payload()
            .unwrap()
            .into_display();

        assert_eq!(display.title, "Stok Uyarısı");
        assert_eq!(
            display.options.body,
            "Defter ürününün stoğu 2 adetin altına düştü."
        );
        assert_eq!(display.options.icon, DEFAULT_ICON);
        assert_eq!(display.options.data.url, "/products/7");
    }

    #[test]
    fn missing_target_routes_to_default() {
        let display = LowStockAlert::new("Silgi", 0)
            .payload()
            .unwrap()
            .into_display();
        assert_eq!(display.options.data.url, DEFAULT_URL);
    }

    #[test]
    fn threshold_defaults_when_deserialized() {
        let alert: LowStockAlert =
            serde_json::from_str(r#"{"product_name":"Cetvel","stock":5}"#).unwrap();
        assert_eq!(alert.threshold, DEFAULT_THRESHOLD);
        assert_eq!(alert.icon, DEFAULT_ICON);
        assert!(alert.target_url.is_none());
    }

    #[test]
    fn custom_icon_is_carried() {
        let payload = LowStockAlert::new("Kalem", 1)
            .with_icon("/static/img/stock.png")
            .payload()
            .unwrap();
        assert_eq!(payload.icon.as_deref(), Some("/static/img/stock.png"));
    }
}
