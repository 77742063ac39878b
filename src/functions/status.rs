use forge::prelude::*;
use sqlx::PgPool;

use crate::error::Error;
use crate::schema::VideoStatus;
use crate::services::{VideoProvider, poll};

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckStatusInput {
    #[serde(default, alias = "videoId")]
    pub video_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckStatusOutput {
    pub success: bool,
    pub status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Pull path, triggered by a viewer's refresh. A mutation because it writes
/// the reconciled state back.
#[forge::mutation(public, timeout = 120)]
pub async fn check_status(
    ctx: &MutationContext,
    input: CheckStatusInput,
) -> Result<CheckStatusOutput> {
    let provider = crate::get_video_provider()?;
    check_status_with(ctx.pool(), provider.as_ref(), input).await
}

pub async fn check_status_with(
    db: &PgPool,
    provider: &dyn VideoProvider,
    input: CheckStatusInput,
) -> Result<CheckStatusOutput> {
    let video_id = input
        .video_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Validation("missing videoId".into()))?;

    tracing::info!(video_id = %video_id, "checking video status");
    let result = poll(db, provider, video_id).await?;

    Ok(CheckStatusOutput {
        success: true,
        status: result.status,
        url: result.url,
    })
}
