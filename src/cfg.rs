use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use url::Url;

pub struct Config {
    pub bind_addr: String,
    pub origin: Url,
    pub open_window: bool,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

const DEFAULT_BIND_ADDR: &str = "localhost:8080";
const DEFAULT_ORIGIN: &str = "http://localhost:8080";

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("RELAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let origin = lookup("RELAY_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let origin = Url::parse(&origin).with_context(|| format!("RELAY_ORIGIN is not a url: {origin}"))?;
        let open_window = match lookup("RELAY_OPEN_WINDOW") {
            Some(flag) => parse_flag(&flag).context("RELAY_OPEN_WINDOW must be true or false")?,
            None => true,
        };
        Ok(Self {
            bind_addr,
            origin,
            open_window,
        })
    }
}

fn parse_flag(flag: &str) -> Result<bool> {
    match flag.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognized flag {other:?}"),
    }
}

/// Loads the process-wide configuration once; later calls return the
/// already loaded value.
pub fn init_config() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}
