use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    pub user_agent: String,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Pause between "processing complete" and the results view. Cosmetic pacing only.
    #[serde(with = "humantime_serde")]
    pub results_delay: Duration,
    pub output_dir: PathBuf,
    pub check_server: bool,
}

/// Artifact kinds the conversion service produces for a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Csv,
    Excel,
    Summary,
}

impl DownloadKind {
    /// Path segment used in `/download/{session_id}/{kind}`.
    pub fn as_path_segment(self) -> &'static str {
        match self {
            DownloadKind::Csv => "csv",
            DownloadKind::Excel => "excel",
            DownloadKind::Summary => "summary",
        }
    }

    /// Extension of the served artifact, used when the server names no file.
    pub fn artifact_extension(self) -> &'static str {
        match self {
            DownloadKind::Csv => "csv",
            DownloadKind::Excel => "xlsx",
            DownloadKind::Summary => "md",
        }
    }

    pub fn all() -> [DownloadKind; 3] {
        [DownloadKind::Csv, DownloadKind::Excel, DownloadKind::Summary]
    }
}

impl std::fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path_segment())
    }
}

/// Workflow error taxonomy. Every variant is terminal for the current cycle;
/// recovery is an explicit reset or a new file selection, never a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WorkflowError {
    #[error("invalid file type: only PDF statements can be uploaded")]
    InvalidFileType,
    #[error("file too large: {size} bytes exceeds the {limit} byte ceiling")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("{0}")]
    Application(String),
    #[error("no processed statement available; upload a PDF first")]
    MissingSession,
}

impl WorkflowError {
    /// Validation errors are detected locally and must never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvalidFileType | WorkflowError::FileTooLarge { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub transaction_count: u64,
    pub page_count: u64,
    pub category_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_withdrawals: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_deposits: Option<f64>,
}

/// Wire shape of the `/upload` response. Error replies from the service carry
/// only an `error` field, so everything defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub stats: Option<SessionStats>,
}

/// Wire shape of the `/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub converter_available: bool,
    #[serde(default)]
    pub full_converter_available: Option<bool>,
    #[serde(default)]
    pub simple_converter_available: Option<bool>,
}

impl ServerHealth {
    pub fn to_message(&self) -> String {
        if self.converter_available {
            let tier = match self.full_converter_available {
                Some(true) => "full converter",
                _ => "basic converter",
            };
            format!("Server {} ({})", self.status, tier)
        } else {
            format!("Server {} (no converter available)", self.status)
        }
    }
}

/// Outcome of one successful upload cycle. Overwritten by each newer success,
/// cleared by reset, never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub source_file: String,
    pub stats: SessionStats,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub completed_at: String,
}

/// Structured info events emitted by the workflow and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    CheckingServer { base_url: String },
    DownloadStarted { kind: DownloadKind },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::CheckingServer { base_url } => {
                format!("Checking conversion service at {}", base_url)
            }
            InfoEvent::DownloadStarted { kind } => format!("Fetching {} artifact…", kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
    Progress {
        percent: u16,
        status: String,
    },
    Info(InfoEvent),
    HealthChecked {
        health: ServerHealth,
    },
    Completed {
        // Box to keep WorkflowEvent size small; SessionResult carries the full stats record.
        result: Box<SessionResult>,
    },
    /// Emitted after the cosmetic results delay; switches the view to results.
    ResultsReady,
    Failed {
        error: WorkflowError,
    },
    DownloadFinished {
        kind: DownloadKind,
        path: PathBuf,
    },
    DownloadFailed {
        kind: DownloadKind,
        message: String,
    },
    ResetAck,
}

/// The mutually exclusive UI mode. A single enum value, so exactly one view
/// exists at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewState {
    #[default]
    Idle,
    Processing,
    Results,
    Error,
}

impl ViewState {
    /// Event→view transition table, independent of any presentation layer.
    /// `None` leaves the current view in place.
    pub fn after(ev: &WorkflowEvent) -> Option<ViewState> {
        match ev {
            WorkflowEvent::Progress { .. } => Some(ViewState::Processing),
            WorkflowEvent::ResultsReady => Some(ViewState::Results),
            WorkflowEvent::Failed { .. } => Some(ViewState::Error),
            WorkflowEvent::ResetAck => Some(ViewState::Idle),
            WorkflowEvent::Completed { .. }
            | WorkflowEvent::Info(_)
            | WorkflowEvent::HealthChecked { .. }
            | WorkflowEvent::DownloadFinished { .. }
            | WorkflowEvent::DownloadFailed { .. } => None,
        }
    }
}
