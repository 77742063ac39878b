use axum::body::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::HeygenConfig;
use crate::error::{Error, Result};
use crate::schema::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    /// HeyGen has returned the handle under different keys across API
    /// versions; earlier keys win.
    pub fn handle_keys(self) -> &'static [&'static str] {
        match self {
            Self::Image => &["image_key", "asset_id"],
            Self::Audio => &["asset_id", "id"],
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub image_key: String,
    pub audio_asset_id: String,
    pub video_title: String,
    pub dimension: Dimension,
    pub fit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    Waiting,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl ProviderState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting" | "pending" => Self::Waiting,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderVideoStatus {
    pub state: ProviderState,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait VideoProvider: Send + Sync {
    async fn upload_asset(&self, kind: AssetKind, data: Bytes, content_type: &str)
    -> Result<String>;

    async fn generate_video(&self, request: &GenerateRequest) -> Result<String>;

    /// `None` means HeyGen does not know the video (yet).
    async fn video_status(&self, video_id: &str) -> Result<Option<ProviderVideoStatus>>;
}

pub struct HeygenClient {
    client: reqwest::Client,
    config: HeygenConfig,
}

impl HeygenClient {
    pub fn new(config: HeygenConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.config.callback_url.as_ref().map(|u| u.as_str())
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, serde_json::Value)> {
        let response = request
            .header("X-API-KEY", &self.config.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl VideoProvider for HeygenClient {
    async fn upload_asset(
        &self,
        kind: AssetKind,
        data: Bytes,
        content_type: &str,
    ) -> Result<String> {
        let size = data.len();
        let request = self
            .client
            .post(self.config.upload_url.clone())
            .header("Content-Type", content_type)
            .body(data);

        let (status, body) = match self.execute(request).await {
            Ok(result) => result,
            Err(Error::Provider { details, .. }) => {
                return Err(Error::UploadFailed {
                    asset: kind,
                    details,
                });
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(asset = %kind, %status, size, body = %body, "heygen upload response");

        if !status.is_success() {
            return Err(Error::UploadFailed {
                asset: kind,
                details: body,
            });
        }

        extract_handle(&body, kind.handle_keys()).ok_or(Error::UploadFailed {
            asset: kind,
            details: body,
        })
    }

    async fn generate_video(&self, request: &GenerateRequest) -> Result<String> {
        let http = self.client.post(self.config.generate_url.clone()).json(request);

        let (status, body) = match self.execute(http).await {
            Ok(result) => result,
            Err(Error::Provider { details, .. }) => {
                return Err(Error::SubmissionFailed { details });
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(%status, body = %body, "heygen generate response");

        if !status.is_success() || has_error(&body) {
            return Err(Error::SubmissionFailed { details: body });
        }

        extract_handle(&body, &["video_id"]).ok_or(Error::SubmissionFailed { details: body })
    }

    async fn video_status(&self, video_id: &str) -> Result<Option<ProviderVideoStatus>> {
        let http = self
            .client
            .get(self.config.status_url.clone())
            .query(&[("video_id", video_id)]);

        let (status, body) = self.execute(http).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Provider {
                status: Some(status.as_u16()),
                details: body,
            });
        }

        parse_status_body(&body).map(Some)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout
    } else {
        Error::Provider {
            status: e.status().map(|s| s.as_u16()),
            details: serde_json::Value::String(e.to_string()),
        }
    }
}

fn has_error(body: &serde_json::Value) -> bool {
    body.get("error").is_some_and(|e| !e.is_null())
}

/// First non-empty string under `data.<key>` for the given keys.
pub fn extract_handle(body: &serde_json::Value, keys: &[&str]) -> Option<String> {
    let data = body.get("data")?;
    keys.iter()
        .filter_map(|key| data.get(*key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(ToString::to_string)
}

pub fn parse_status_body(body: &serde_json::Value) -> Result<ProviderVideoStatus> {
    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| Error::Provider {
            status: None,
            details: body.clone(),
        })?;

    let text = |key: &str| {
        data.get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    };

    let state = ProviderState::parse(&text("status").unwrap_or_default());
    let error = match data.get("error") {
        Some(serde_json::Value::String(msg)) if !msg.trim().is_empty() => Some(msg.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("message")
            .or_else(|| obj.get("detail"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .or_else(|| Some(serde_json::Value::Object(obj.clone()).to_string())),
        _ => None,
    };

    Ok(ProviderVideoStatus {
        state,
        video_url: text("video_url"),
        thumbnail_url: text("thumbnail_url"),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use reqwest::Url;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn image_handle_prefers_image_key() {
        let body = json!({ "data": { "image_key": "img_1", "asset_id": "asset_1" } });
        assert_eq!(
            extract_handle(&body, AssetKind::Image.handle_keys()).as_deref(),
            Some("img_1")
        );
    }

    #[test]
    fn image_handle_falls_back_to_asset_id() {
        let body = json!({ "data": { "image_key": "", "asset_id": "asset_1" } });
        assert_eq!(
            extract_handle(&body, AssetKind::Image.handle_keys()).as_deref(),
            Some("asset_1")
        );
    }

    #[test]
    fn audio_handle_accepts_id_shape() {
        let body = json!({ "code": 100, "data": { "id": "aud_9" } });
        assert_eq!(
            extract_handle(&body, AssetKind::Audio.handle_keys()).as_deref(),
            Some("aud_9")
        );
    }

    #[test]
    fn missing_handle_is_none() {
        let body = json!({ "data": { "url": "https://x" } });
        assert!(extract_handle(&body, AssetKind::Audio.handle_keys()).is_none());
        assert!(extract_handle(&json!({ "error": "nope" }), &["video_id"]).is_none());
    }

    #[test]
    fn parses_provider_states() {
        assert_eq!(ProviderState::parse("waiting"), ProviderState::Waiting);
        assert_eq!(ProviderState::parse("Processing"), ProviderState::Processing);
        assert_eq!(ProviderState::parse("completed"), ProviderState::Completed);
        assert_eq!(ProviderState::parse("failed"), ProviderState::Failed);
        assert_eq!(
            ProviderState::parse("queued"),
            ProviderState::Unknown("queued".to_string())
        );
    }

    #[test]
    fn parses_completed_status_body() {
        let body = json!({
            "code": 100,
            "data": {
                "status": "completed",
                "video_url": "https://x/v.mp4",
                "thumbnail_url": "https://x/t.jpg",
                "error": null
            }
        });
        let status = parse_status_body(&body).unwrap();
        assert_eq!(status.state, ProviderState::Completed);
        assert_eq!(status.video_url.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(status.thumbnail_url.as_deref(), Some("https://x/t.jpg"));
        assert!(status.error.is_none());
    }

    #[test]
    fn parses_structured_error() {
        let body = json!({
            "data": {
                "status": "failed",
                "error": { "code": 40119, "message": "render error" }
            }
        });
        let status = parse_status_body(&body).unwrap();
        assert_eq!(status.state, ProviderState::Failed);
        assert_eq!(status.error.as_deref(), Some("render error"));
    }

    #[test]
    fn status_body_without_data_is_provider_error() {
        let err = parse_status_body(&json!({ "message": "bad" })).unwrap_err();
        assert!(matches!(err, Error::Provider { status: None, .. }));
    }

    #[test]
    fn generate_request_omits_absent_callback() {
        let request = GenerateRequest {
            image_key: "img".into(),
            audio_asset_id: "aud".into(),
            video_title: "Video_1".into(),
            dimension: Dimension {
                width: 1080,
                height: 1920,
            },
            fit: "cover",
            callback_url: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["fit"], "cover");
        assert_eq!(value["dimension"]["height"], 1920);
        assert!(value.get("callback_url").is_none());
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn client_for(base: &str, timeout: Duration) -> HeygenClient {
        HeygenClient::new(HeygenConfig {
            api_key: "test-key".into(),
            upload_url: Url::parse(&format!("{base}/v1/asset")).unwrap(),
            generate_url: Url::parse(&format!("{base}/v2/video/av4/generate")).unwrap(),
            status_url: Url::parse(&format!("{base}/v1/video_status.get")).unwrap(),
            callback_url: None,
            timeout,
        })
        .unwrap()
    }

    fn header(headers: &HeaderMap, name: &str) -> String {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn upload_sends_api_key_and_returns_handle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new().route(
            "/v1/asset",
            post({
                let seen = seen.clone();
                move |headers: HeaderMap, body: Bytes| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push((
                            header(&headers, "x-api-key"),
                            header(&headers, "content-type"),
                            body.len(),
                        ));
                        Json(json!({ "code": 100, "data": { "id": "aud_1" } }))
                    }
                }
            }),
        );
        let client = client_for(&serve(router).await, Duration::from_secs(5));

        let handle = client
            .upload_asset(AssetKind::Audio, Bytes::from_static(b"mp3-bytes"), "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(handle, "aud_1");

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[("test-key".to_string(), "audio/mpeg".to_string(), 9)]
        );
    }

    #[tokio::test]
    async fn failed_upload_carries_raw_body() {
        let router = Router::new().route(
            "/v1/asset",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "storage offline") }),
        );
        let client = client_for(&serve(router).await, Duration::from_secs(5));

        let err = client
            .upload_asset(AssetKind::Image, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap_err();
        match err {
            Error::UploadFailed { asset, details } => {
                assert_eq!(asset, AssetKind::Image);
                assert_eq!(details, json!("storage offline"));
            }
            other => panic!("expected an upload failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_with_error_field_is_submission_failure() {
        let router = Router::new().route(
            "/v2/video/av4/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["image_key"], "img");
                Json(json!({ "error": { "message": "quota exceeded" }, "data": null }))
            }),
        );
        let client = client_for(&serve(router).await, Duration::from_secs(5));
        let request = GenerateRequest {
            image_key: "img".into(),
            audio_asset_id: "aud".into(),
            video_title: "Video_1".into(),
            dimension: Dimension {
                width: 1080,
                height: 1920,
            },
            fit: "cover",
            callback_url: None,
        };

        let err = client.generate_video(&request).await.unwrap_err();
        assert!(matches!(
            &err,
            Error::SubmissionFailed { details } if details["error"]["message"] == "quota exceeded"
        ));
    }

    #[tokio::test]
    async fn status_lookup_maps_not_found_and_server_errors() {
        let router = Router::new().route(
            "/v1/video_status.get",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                match query.get("video_id").map(String::as_str) {
                    Some("ghost") => {
                        (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })))
                    }
                    Some("v_1") => (
                        StatusCode::OK,
                        Json(json!({
                            "data": { "status": "completed", "video_url": "https://x/v.mp4" }
                        })),
                    ),
                    _ => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "message": "busy" }))),
                }
            }),
        );
        let client = client_for(&serve(router).await, Duration::from_secs(5));

        assert!(client.video_status("ghost").await.unwrap().is_none());

        let done = client.video_status("v_1").await.unwrap().unwrap();
        assert_eq!(done.state, ProviderState::Completed);
        assert_eq!(done.video_url.as_deref(), Some("https://x/v.mp4"));

        let err = client.video_status("v_2").await.unwrap_err();
        assert!(matches!(err, Error::Provider { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn slow_provider_is_a_timeout() {
        let router = Router::new().route(
            "/v1/video_status.get",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let client = client_for(&serve(router).await, Duration::from_millis(500));

        let err = client.video_status("v_1").await.unwrap_err();
        assert!(matches!(err, Error::ProviderTimeout), "got {err:?}");
    }
}
