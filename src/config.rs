use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

const DEFAULT_UPLOAD_URL: &str = "https://upload.heygen.com/v1/asset";
const DEFAULT_API_URL: &str = "https://api.heygen.com";
// the gateway refuses larger multipart files anyway
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Path the HeyGen webhook is registered under. It must match the
/// `#[forge::webhook(path = ...)]` attribute on `heygen_callback`.
pub const WEBHOOK_PATH: &str = "/webhooks/heygen";

/// Prefix the forge gateway mounts every built-in route under.
pub const GATEWAY_PREFIX: &str = "/_api";

/// Externally reachable callback path.
pub fn public_webhook_path() -> String {
    format!("{GATEWAY_PREFIX}{WEBHOOK_PATH}")
}

#[derive(Debug, Clone)]
pub struct HeygenConfig {
    pub api_key: String,
    pub upload_url: Url,
    pub generate_url: Url,
    pub status_url: Url,
    /// Where HeyGen should push completion events. `None` disables the push channel.
    pub callback_url: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub heygen: HeygenConfig,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("HEYGEN_API_KEY")
            .ok_or_else(|| Error::Config("HEYGEN_API_KEY not set".into()))?;

        let upload_url = parse_url(
            "HEYGEN_UPLOAD_URL",
            &get("HEYGEN_UPLOAD_URL").unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string()),
        )?;
        let api_base = get("HEYGEN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_base = api_base.trim_end_matches('/');
        let generate_url = parse_url(
            "HEYGEN_API_URL",
            &format!("{api_base}/v2/video/av4/generate"),
        )?;
        let status_url = parse_url("HEYGEN_API_URL", &format!("{api_base}/v1/video_status.get"))?;

        // the route is compiled in; an override would only desync the callback url
        if let Some(path) = get("WEBHOOK_PATH") {
            let public = public_webhook_path();
            if path != WEBHOOK_PATH && path != public {
                return Err(Error::Config(format!(
                    "WEBHOOK_PATH cannot be changed: HeyGen callbacks are served at \
                     `{public}`, got `{path}`"
                )));
            }
        }

        let callback_url = get("PUBLIC_BASE_URL")
            .map(|base| {
                let base = base.trim_end_matches('/').to_string();
                parse_url("PUBLIC_BASE_URL", &format!("{base}{}", public_webhook_path()))
            })
            .transpose()?;

        let timeout_secs = parse_number("HEYGEN_TIMEOUT_SECS", get("HEYGEN_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config("HEYGEN_TIMEOUT_SECS must be positive".into()));
        }

        let max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"))?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(Error::Config("MAX_UPLOAD_BYTES must be positive".into()));
        }

        Ok(Self {
            heygen: HeygenConfig {
                api_key,
                upload_url,
                generate_url,
                status_url,
                callback_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            max_upload_bytes,
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| Error::Config(format!("{key}: invalid url `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "{key}: unsupported url scheme `{other}`"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|_| Error::Config(format!("{key}: expected a number, got `{v}`")))
    })
    .transpose()
}
