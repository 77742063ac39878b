use axum::body::Bytes;
use forge::prelude::Upload;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::schema::{NewVideo, Orientation, Video};
use crate::services::heygen::{AssetKind, GenerateRequest, VideoProvider};
use crate::services::store;

const FIT_COVER: &str = "cover";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl From<Upload> for UploadedFile {
    fn from(upload: Upload) -> Self {
        let content_type = upload.content_type().to_string();
        let file_name = Some(upload.name().to_string()).filter(|n| !n.is_empty());
        Self {
            data: upload.into_bytes(),
            content_type,
            file_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitInput {
    pub image: UploadedFile,
    pub audio: UploadedFile,
    pub orientation: Orientation,
}

/// Uploads both assets, starts generation and records the job. Nothing is
/// persisted unless HeyGen accepts the request.
pub async fn submit_video(
    db: &PgPool,
    provider: &dyn VideoProvider,
    callback_url: Option<String>,
    input: SubmitInput,
) -> Result<Video> {
    let SubmitInput {
        image,
        audio,
        orientation,
    } = input;

    tracing::info!(
        image = ?image.file_name,
        image_type = %image.content_type,
        audio = ?audio.file_name,
        audio_type = %audio.content_type,
        %orientation,
        "submitting video generation"
    );

    let image_key = upload(provider, AssetKind::Image, image).await?;
    let audio_asset_id = upload(provider, AssetKind::Audio, audio).await?;

    let title = video_title(chrono::Utc::now());
    let request = build_generate_request(
        image_key,
        audio_asset_id,
        orientation,
        title.clone(),
        callback_url,
    )?;

    let video_id = provider.generate_video(&request).await?;
    tracing::info!(video_id = %video_id, "HeyGen accepted generation request");

    store::insert_video(
        db,
        NewVideo {
            external_id: video_id,
            orientation,
            title,
        },
    )
    .await
}

async fn upload(
    provider: &dyn VideoProvider,
    kind: AssetKind,
    file: UploadedFile,
) -> Result<String> {
    let size = file.data.len();
    let handle = provider
        .upload_asset(kind, file.data, &file.content_type)
        .await
        .inspect_err(|e| {
            tracing::error!(
                asset = %kind,
                error = %e,
                details = ?e.details(),
                "asset upload failed"
            )
        })?;
    tracing::info!(asset = %kind, size, handle = %handle, "asset uploaded");
    Ok(handle)
}

pub fn video_title(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("Video_{}", now.timestamp_millis())
}

pub fn build_generate_request(
    image_key: String,
    audio_asset_id: String,
    orientation: Orientation,
    video_title: String,
    callback_url: Option<String>,
) -> Result<GenerateRequest> {
    if image_key.trim().is_empty() || audio_asset_id.trim().is_empty() {
        return Err(Error::Validation(
            "both an image and an audio asset handle are required".into(),
        ));
    }
    Ok(GenerateRequest {
        image_key,
        audio_asset_id,
        video_title,
        dimension: orientation.dimension(),
        fit: FIT_COVER,
        callback_url,
    })
}
