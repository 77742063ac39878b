use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use forge::testing::{IsolatedTestDb, TestDatabase};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::schema::{NewVideo, Orientation, Video};
use crate::services::heygen::{
    AssetKind, GenerateRequest, ProviderState, ProviderVideoStatus, VideoProvider,
};
use crate::services::store;

pub async fn setup_db(name: &str) -> (IsolatedTestDb, PgPool) {
    let base = TestDatabase::embedded().await.unwrap();
    let db = base.isolated(name).await.unwrap();
    db.run_sql(&forge::get_internal_sql()).await.unwrap();
    db.migrate(Path::new("migrations")).await.unwrap();
    let pool = db.pool().clone();
    (db, pool)
}

pub async fn insert_processing(pool: &PgPool, external_id: &str) -> Video {
    store::insert_video(
        pool,
        NewVideo {
            external_id: external_id.to_string(),
            orientation: Orientation::Portrait,
            title: format!("Video_{external_id}"),
        },
    )
    .await
    .unwrap()
}

/// Scripted provider: status responses are keyed by video id.
#[derive(Default)]
pub struct FakeProvider {
    pub statuses: Mutex<HashMap<String, Option<ProviderVideoStatus>>>,
    pub uploads: Mutex<Vec<(AssetKind, String, usize)>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
    pub fail_upload: Option<AssetKind>,
    pub video_id: Option<String>,
}

impl FakeProvider {
    pub async fn set_status(&self, id: &str, status: Option<ProviderVideoStatus>) {
        self.statuses.lock().await.insert(id.to_string(), status);
    }
}

#[async_trait::async_trait]
impl VideoProvider for FakeProvider {
    async fn upload_asset(
        &self,
        kind: AssetKind,
        data: Bytes,
        content_type: &str,
    ) -> Result<String> {
        if self.fail_upload == Some(kind) {
            return Err(Error::UploadFailed {
                asset: kind,
                details: serde_json::json!({ "message": "unsupported media" }),
            });
        }
        self.uploads
            .lock()
            .await
            .push((kind, content_type.to_string(), data.len()));
        Ok(format!("{kind}_handle"))
    }

    async fn generate_video(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());
        self.video_id.clone().ok_or(Error::SubmissionFailed {
            details: serde_json::json!({ "error": "quota exceeded" }),
        })
    }

    async fn video_status(&self, video_id: &str) -> Result<Option<ProviderVideoStatus>> {
        match self.statuses.lock().await.get(video_id) {
            Some(status) => Ok(status.clone()),
            None => Err(Error::Provider {
                status: Some(500),
                details: serde_json::json!("no scripted status"),
            }),
        }
    }
}

pub fn remote(state: ProviderState, url: Option<&str>) -> ProviderVideoStatus {
    ProviderVideoStatus {
        state,
        video_url: url.map(ToString::to_string),
        thumbnail_url: None,
        error: None,
    }
}
