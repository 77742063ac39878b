use forge::prelude::ForgeError;

use crate::services::heygen::AssetKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{field} exceeds the {limit} byte upload limit")]
    PayloadTooLarge { field: String, limit: usize },

    #[error("failed to upload {asset} to HeyGen")]
    UploadFailed {
        asset: AssetKind,
        details: serde_json::Value,
    },

    #[error("HeyGen rejected the video generation request")]
    SubmissionFailed { details: serde_json::Value },

    #[error("HeyGen request failed{}", status_suffix(.status))]
    Provider {
        status: Option<u16>,
        details: serde_json::Value,
    },

    #[error("HeyGen request timed out")]
    ProviderTimeout,

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl Error {
    /// Raw upstream payload, surfaced to the caller for diagnosis.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::UploadFailed { details, .. }
            | Self::SubmissionFailed { details }
            | Self::Provider { details, .. } => Some(details),
            _ => None,
        }
    }
}

// The gateway hides the message of most variants; provider failures go out
// as `Job` so the upstream payload reaches the caller.
impl From<Error> for ForgeError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(_) | Error::PayloadTooLarge { .. } => {
                ForgeError::Validation(err.to_string())
            }
            Error::ProviderTimeout => ForgeError::Timeout(err.to_string()),
            Error::UploadFailed { .. }
            | Error::SubmissionFailed { .. }
            | Error::Provider { .. } => {
                let message = match err.details() {
                    Some(details) => format!("{err}: {details}"),
                    None => err.to_string(),
                };
                ForgeError::Job(message)
            }
            Error::Store(e) => {
                tracing::error!(error = %e, "database error");
                ForgeError::Sql(e)
            }
            Error::Config(msg) => ForgeError::Config(msg),
        }
    }
}
