use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CaptureTrigger;

/// A captured screenshot. Owned by the capture/ingestion side; the batch
/// pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub capture_trigger: CaptureTrigger,
    pub active_app: Option<String>,
    /// Opaque reference understood by the image store.
    pub image_ref: String,
    /// One-line description from the per-screenshot analysis, when that
    /// upstream pipeline has already run.
    pub prior_analysis: Option<String>,
}

impl Screenshot {
    /// Active application, or "Unknown" when capture could not tell.
    pub fn app_name(&self) -> &str {
        self.active_app
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("Unknown")
    }
}
