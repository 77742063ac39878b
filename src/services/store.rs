use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::schema::{NewVideo, Video, VideoStatus};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

const VIDEO_COLUMNS: &str = "id, external_id, status, result_url, thumbnail_url, error_message, \
                             orientation, title, created_at, updated_at";

/// Field-level patch. `None` fields are left untouched, never nulled out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPatch {
    pub status: Option<VideoStatus>,
    pub result_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    Applied(Video),
    AlreadyTerminal(Video),
    Missing,
}

fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}

/// Inserting an `external_id` that already exists returns the stored record.
pub async fn insert_video(db: &PgPool, video: NewVideo) -> Result<Video> {
    let inserted = sqlx::query_as::<_, Video>(&format!(
        r#"
        INSERT INTO videos (id, external_id, status, orientation, title)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&video.external_id)
    .bind(VideoStatus::Processing)
    .bind(video.orientation)
    .bind(&video.title)
    .fetch_one(db)
    .await?;
    Ok(inserted)
}

pub async fn find_video(db: &PgPool, external_id: &str) -> Result<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(db)
    .await?;
    Ok(video)
}

/// Applies `patch` only while the record is still `processing`. The check
/// and the write are one statement.
pub async fn patch_video(
    db: &PgPool,
    external_id: &str,
    patch: &VideoPatch,
) -> Result<PatchOutcome> {
    let updated = sqlx::query_as::<_, Video>(&format!(
        r#"
        UPDATE videos SET
            status = COALESCE($2, status),
            result_url = COALESCE($3, result_url),
            thumbnail_url = COALESCE($4, thumbnail_url),
            error_message = COALESCE($5, error_message),
            updated_at = now()
        WHERE external_id = $1 AND status = 'processing'
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(external_id)
    .bind(patch.status)
    .bind(&patch.result_url)
    .bind(&patch.thumbnail_url)
    .bind(&patch.error_message)
    .fetch_optional(db)
    .await?;

    if let Some(video) = updated {
        return Ok(PatchOutcome::Applied(video));
    }

    // nothing matched: tell a missing record apart from a finished one
    Ok(match find_video(db, external_id).await? {
        Some(video) => PatchOutcome::AlreadyTerminal(video),
        None => PatchOutcome::Missing,
    })
}

pub async fn list_recent_videos(db: &PgPool, limit: i64) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        r#"
        SELECT {VIDEO_COLUMNS}
        FROM videos
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#
    ))
    .bind(clamp_limit(limit))
    .fetch_all(db)
    .await?;
    Ok(videos)
}

/// Oldest first, so a long backlog is worked through in order.
pub async fn list_processing_videos(
    db: &PgPool,
    created_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        r#"
        SELECT {VIDEO_COLUMNS}
        FROM videos
        WHERE status = 'processing' AND created_at <= $1
        ORDER BY created_at, id
        LIMIT $2
        "#
    ))
    .bind(created_before)
    .bind(clamp_limit(limit))
    .fetch_all(db)
    .await?;
    Ok(videos)
}
