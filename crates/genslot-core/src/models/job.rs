use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::asset::Asset;
use super::ids::JobId;

/// Status of a remote task as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

impl Display for RemoteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RemoteStatus::Pending => write!(f, "pending"),
            RemoteStatus::Processing => write!(f, "processing"),
            RemoteStatus::Completed => write!(f, "completed"),
            RemoteStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RemoteStatus {
    type Err = anyhow::Error;

    /// Accepts the spellings providers commonly use for each state.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" | "queued" | "waiting" | "starting" => Ok(RemoteStatus::Pending),
            "processing" | "running" | "in_progress" | "generating" => {
                Ok(RemoteStatus::Processing)
            }
            "completed" | "succeeded" | "success" => Ok(RemoteStatus::Completed),
            "failed" | "error" | "canceled" | "cancelled" => Ok(RemoteStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid remote status: {}", s)),
        }
    }
}

/// Normalized answer to a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: RemoteStatus,
    pub asset: Option<Asset>,
    pub error_message: Option<String>,
}

impl TaskStatusReport {
    pub fn pending() -> Self {
        Self {
            status: RemoteStatus::Pending,
            asset: None,
            error_message: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            status: RemoteStatus::Processing,
            asset: None,
            error_message: None,
        }
    }

    pub fn completed(asset: Asset) -> Self {
        Self {
            status: RemoteStatus::Completed,
            asset: Some(asset),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            asset: None,
            error_message: Some(message.into()),
        }
    }
}

/// Bookkeeping for one remote task. Owned by the poll scheduler while it runs.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub job_id: JobId,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub poll_count: u32,
    pub last_status: Option<RemoteStatus>,
}

impl GenerationJob {
    pub fn new(job_id: JobId, task_id: impl Into<String>) -> Self {
        Self {
            job_id,
            task_id: task_id.into(),
            started_at: Utc::now(),
            poll_count: 0,
            last_status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_aliases() {
        assert_eq!("QUEUED".parse::<RemoteStatus>().unwrap(), RemoteStatus::Pending);
        assert_eq!(
            "in_progress".parse::<RemoteStatus>().unwrap(),
            RemoteStatus::Processing
        );
        assert_eq!(
            "succeeded".parse::<RemoteStatus>().unwrap(),
            RemoteStatus::Completed
        );
        assert_eq!("error".parse::<RemoteStatus>().unwrap(), RemoteStatus::Failed);
        assert!("weird".parse::<RemoteStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RemoteStatus::Completed.is_terminal());
        assert!(RemoteStatus::Failed.is_terminal());
        assert!(!RemoteStatus::Processing.is_terminal());
        assert!(!TaskStatusReport::pending().status.is_terminal());
    }
}
