use forge::prelude::*;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::error::Error;
use crate::schema::Orientation;
use crate::services::{SubmitInput, UploadedFile, VideoProvider, submit_video};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerateVideoInput {
    pub image: Option<Upload>,
    pub audio: Option<Upload>,
    #[serde(default, alias = "aspectRatio")]
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoOutput {
    pub success: bool,
    pub video_id: String,
}

// uploads to HeyGen can be slow, so this outlives the default mutation timeout
#[forge::mutation(public, timeout = 300)]
pub async fn generate_video(
    ctx: &MutationContext,
    input: GenerateVideoInput,
) -> Result<GenerateVideoOutput> {
    let provider = crate::get_video_provider()?;
    let config = crate::get_app_config()?;
    generate_with(ctx.pool(), provider.as_ref(), config, input).await
}

pub async fn generate_with(
    db: &PgPool,
    provider: &dyn VideoProvider,
    config: &AppConfig,
    input: GenerateVideoInput,
) -> Result<GenerateVideoOutput> {
    let GenerateVideoInput {
        image,
        audio,
        aspect_ratio,
    } = input;
    let limit = config.max_upload_bytes;

    let image = accept_file("image", image, limit)?;
    let audio = accept_file("audio", audio, limit)?;
    let (Some(image), Some(audio)) = (image, audio) else {
        return Err(Error::Validation(
            "missing files: send both an image and an audio file".into(),
        )
        .into());
    };

    let callback_url = config.heygen.callback_url.as_ref().map(ToString::to_string);
    let video = submit_video(
        db,
        provider,
        callback_url,
        SubmitInput {
            image,
            audio,
            orientation: Orientation::parse_lenient(aspect_ratio.as_deref()),
        },
    )
    .await?;

    Ok(GenerateVideoOutput {
        success: true,
        video_id: video.external_id,
    })
}

/// Empty files count as missing.
fn accept_file(
    field: &str,
    upload: Option<Upload>,
    limit: usize,
) -> std::result::Result<Option<UploadedFile>, Error> {
    let Some(upload) = upload.filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    if upload.len() > limit {
        return Err(Error::PayloadTooLarge {
            field: field.to_string(),
            limit,
        });
    }
    Ok(Some(upload.into()))
}
