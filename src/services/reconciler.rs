use serde::Deserialize;
use sqlx::PgPool;

use crate::error::Result;
use crate::schema::{Video, VideoStatus};
use crate::services::heygen::{ProviderState, ProviderVideoStatus, VideoProvider};
use crate::services::store::{self, PatchOutcome, VideoPatch};

const UNKNOWN_FAILURE: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: VideoStatus,
    pub result_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn processing() -> Self {
        Self {
            status: VideoStatus::Processing,
            result_url: None,
            thumbnail_url: None,
            error_message: None,
        }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            status: VideoStatus::Completed,
            result_url: Some(result_url.into()),
            ..Self::processing()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: VideoStatus::Failed,
            error_message: Some(message.into()),
            ..Self::processing()
        }
    }

    pub fn with_thumbnail(mut self, thumbnail_url: Option<String>) -> Self {
        self.thumbnail_url = thumbnail_url;
        self
    }

    pub fn from_provider(status: &ProviderVideoStatus) -> Self {
        let mapped = match &status.state {
            ProviderState::Completed => VideoStatus::Completed,
            ProviderState::Failed => VideoStatus::Failed,
            ProviderState::Waiting | ProviderState::Processing => VideoStatus::Processing,
            ProviderState::Unknown(raw) => {
                tracing::warn!(
                    provider_status = %raw,
                    "unrecognized HeyGen status, treating as processing"
                );
                VideoStatus::Processing
            }
        };
        Self {
            status: mapped,
            result_url: status.video_url.clone(),
            thumbnail_url: status.thumbnail_url.clone(),
            error_message: status.error.clone(),
        }
    }

    /// Turns the update into a store patch. Result URLs only travel with
    /// `completed`, error messages only with `failed`; a completion without
    /// a URL stays `processing` until one is known.
    pub fn into_patch(self) -> VideoPatch {
        let thumbnail_url = self.thumbnail_url.filter(|u| !u.trim().is_empty());
        match self.status {
            VideoStatus::Completed => match self.result_url.filter(|u| !u.trim().is_empty()) {
                Some(url) => VideoPatch {
                    status: Some(VideoStatus::Completed),
                    result_url: Some(url),
                    thumbnail_url,
                    error_message: None,
                },
                None => VideoPatch {
                    thumbnail_url,
                    ..Default::default()
                },
            },
            VideoStatus::Failed => VideoPatch {
                status: Some(VideoStatus::Failed),
                result_url: None,
                thumbnail_url,
                error_message: Some(
                    self.error_message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
                ),
            },
            VideoStatus::Processing => VideoPatch {
                thumbnail_url,
                ..Default::default()
            },
        }
    }
}

/// Push-path payload delivered by HeyGen to the webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_data: WebhookEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEventData {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl WebhookEvent {
    /// `None` for events that carry no state this service tracks.
    pub fn to_update(&self) -> Option<(String, StatusUpdate)> {
        let video_id = self
            .event_data
            .video_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_string();
        let data = &self.event_data;
        let update = match self.event_type.as_str() {
            "avatar_video.success" => StatusUpdate {
                status: VideoStatus::Completed,
                result_url: data.url.clone(),
                ..StatusUpdate::processing()
            },
            "avatar_video.fail" => StatusUpdate {
                status: VideoStatus::Failed,
                error_message: data.msg.clone(),
                ..StatusUpdate::processing()
            },
            _ => return None,
        };
        Some((video_id, update.with_thumbnail(data.thumbnail_url.clone())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Applied(Video),
    Unchanged(Video),
    AlreadyTerminal(Video),
    UnknownJob,
}

impl ReconcileOutcome {
    pub fn video(&self) -> Option<&Video> {
        match self {
            Self::Applied(v) | Self::Unchanged(v) | Self::AlreadyTerminal(v) => Some(v),
            Self::UnknownJob => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Unchanged(_) => "unchanged",
            Self::AlreadyTerminal(_) => "already_terminal",
            Self::UnknownJob => "unknown_job",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub status: VideoStatus,
    pub url: Option<String>,
}

impl From<&Video> for PollResult {
    fn from(video: &Video) -> Self {
        Self {
            status: video.status,
            url: video.result_url.clone(),
        }
    }
}

/// Folds one observation into the store. Terminal records never change, and
/// an update for an unknown job creates nothing.
pub async fn reconcile(
    db: &PgPool,
    external_id: &str,
    update: StatusUpdate,
) -> Result<ReconcileOutcome> {
    let requested = update.status;
    let patch = update.into_patch();

    let outcome = if patch == VideoPatch::default() {
        match store::find_video(db, external_id).await? {
            Some(video) if video.status.is_terminal() => ReconcileOutcome::AlreadyTerminal(video),
            Some(video) => ReconcileOutcome::Unchanged(video),
            None => ReconcileOutcome::UnknownJob,
        }
    } else {
        match store::patch_video(db, external_id, &patch).await? {
            PatchOutcome::Applied(video) => ReconcileOutcome::Applied(video),
            PatchOutcome::AlreadyTerminal(video) => ReconcileOutcome::AlreadyTerminal(video),
            PatchOutcome::Missing => ReconcileOutcome::UnknownJob,
        }
    };

    match &outcome {
        ReconcileOutcome::Applied(video) => {
            tracing::info!(
                video_id = %external_id,
                status = %video.status,
                has_url = video.result_url.is_some(),
                "reconciled video status"
            );
        }
        ReconcileOutcome::UnknownJob => {
            tracing::warn!(
                video_id = %external_id,
                requested = %requested,
                "status update for unknown video dropped"
            );
        }
        other => {
            tracing::debug!(
                video_id = %external_id,
                requested = %requested,
                outcome = other.label(),
                "status update ignored"
            );
        }
    }

    Ok(outcome)
}

/// Pull path: ask HeyGen for the current state and fold it into the store.
pub async fn poll(
    db: &PgPool,
    provider: &dyn VideoProvider,
    external_id: &str,
) -> Result<PollResult> {
    let Some(remote) = provider.video_status(external_id).await? else {
        tracing::info!(video_id = %external_id, "HeyGen does not know video yet, still processing");
        return Ok(match store::find_video(db, external_id).await? {
            Some(video) => PollResult::from(&video),
            None => PollResult {
                status: VideoStatus::Processing,
                url: None,
            },
        });
    };

    tracing::debug!(
        video_id = %external_id,
        state = ?remote.state,
        url = ?remote.video_url,
        "HeyGen status"
    );

    let update = StatusUpdate::from_provider(&remote);
    let fallback = PollResult {
        status: update.status,
        url: remote.video_url.clone(),
    };
    let outcome = reconcile(db, external_id, update).await?;

    Ok(outcome.video().map(PollResult::from).unwrap_or(fallback))
}

/// Push path.
pub async fn handle_event(db: &PgPool, event: &WebhookEvent) -> Result<Option<ReconcileOutcome>> {
    let Some((external_id, update)) = event.to_update() else {
        tracing::info!(event_type = %event.event_type, "ignoring webhook event");
        return Ok(None);
    };
    reconcile(db, &external_id, update).await.map(Some)
}
