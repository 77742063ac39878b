use forge::prelude::*;

use crate::schema::Video;
use crate::services::{DEFAULT_PAGE_SIZE, list_recent_videos};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListVideosInput {
    pub limit: Option<i64>,
}

/// Newest first. Subscribers are re-run whenever `videos` changes.
#[forge::query(public, tables = ["videos"])]
pub async fn list_videos(ctx: &QueryContext, input: ListVideosInput) -> Result<Vec<Video>> {
    let limit = input.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(list_recent_videos(ctx.db(), limit).await?)
}
