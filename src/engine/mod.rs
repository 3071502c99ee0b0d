mod client;
mod validate;

pub use client::ConverterClient;
pub use validate::{classify, CandidateFile, MAX_UPLOAD_BYTES};

use crate::model::{SessionResult, UploadResponse, WorkflowError, WorkflowEvent};
use tokio::sync::mpsc;

/// Events leaving the engine carry the token of the submission that produced
/// them; the controller forwards a tag only while it is the latest issued.
pub type TaggedEvent = (u64, WorkflowEvent);

pub struct UploadEngine {
    client: ConverterClient,
}

impl UploadEngine {
    pub fn new(client: ConverterClient) -> Self {
        Self { client }
    }

    /// Drive exactly one submission cycle: validate, upload, classify the
    /// outcome. Validation failures return before any network traffic.
    pub async fn run(
        &self,
        candidate: &CandidateFile,
        token: u64,
        event_tx: &mpsc::UnboundedSender<TaggedEvent>,
    ) -> Result<SessionResult, WorkflowError> {
        candidate.validate()?;

        let _ = event_tx.send((
            token,
            WorkflowEvent::Progress {
                percent: 10,
                status: "Uploading PDF…".into(),
            },
        ));

        let bytes = tokio::fs::read(&candidate.path).await.map_err(|e| {
            WorkflowError::Transport(format!("cannot read {}: {}", candidate.path.display(), e))
        })?;

        let response = self
            .client
            .upload(&candidate.file_name, bytes.into())
            .await
            .map_err(|e| WorkflowError::Transport(format!("{e:#}")))?;

        let result = classify_response(&candidate.file_name, response)?;

        let _ = event_tx.send((
            token,
            WorkflowEvent::Progress {
                percent: 100,
                status: "Processing complete!".into(),
            },
        ));

        Ok(result)
    }
}

/// Map the wire response onto the workflow error taxonomy.
fn classify_response(
    source_file: &str,
    resp: UploadResponse,
) -> Result<SessionResult, WorkflowError> {
    if !resp.success {
        let msg = resp
            .error
            .or(resp.message)
            .unwrap_or_else(|| "processing failed".to_string());
        return Err(WorkflowError::Application(msg));
    }
    let session_id = resp.session_id.ok_or_else(|| {
        WorkflowError::Transport("service reported success without a session id".into())
    })?;
    let stats = resp.stats.ok_or_else(|| {
        WorkflowError::Transport("service reported success without statistics".into())
    })?;
    Ok(SessionResult {
        session_id,
        source_file: source_file.to_string(),
        stats,
        message: resp.message,
        completed_at: now_rfc3339(),
    })
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
