//! Workflow lifecycle controller.
//!
//! Owns the stored session, the submission token sequence, and the pacing
//! timer, and emits events for presentation layers.

use crate::engine::{CandidateFile, ConverterClient, TaggedEvent, UploadEngine};
use crate::model::{DownloadKind, InfoEvent, RunConfig, SessionResult, WorkflowError, WorkflowEvent};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to drive the workflow.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Select(PathBuf),
    Download(DownloadKind),
    Reset,
    Quit,
}

/// Run the workflow loop: commands in, events out.
///
/// Every submission gets a monotonically increasing token. Engine events come
/// back tagged and are forwarded only while their token is the latest issued,
/// so a newer selection or a reset silently discards stale responses. The
/// underlying request is never cancelled; only its UI effect is dropped.
pub(crate) async fn run_controller(
    cfg: RunConfig,
    event_tx: UnboundedSender<WorkflowEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let client = ConverterClient::new(&cfg)?;
    let (tag_tx, mut tag_rx) = tokio::sync::mpsc::unbounded_channel::<TaggedEvent>();

    if cfg.check_server {
        let _ = event_tx.send(WorkflowEvent::Info(InfoEvent::CheckingServer {
            base_url: cfg.base_url.clone(),
        }));
        let health_client = client.clone();
        let health_tx = event_tx.clone();
        tokio::spawn(async move {
            match health_client.fetch_health().await {
                Ok(health) => {
                    let _ = health_tx.send(WorkflowEvent::HealthChecked { health });
                }
                Err(e) => {
                    let _ = health_tx.send(WorkflowEvent::Info(InfoEvent::Message(format!(
                        "Service check failed: {e:#}"
                    ))));
                }
            }
        });
    }

    let mut next_token: u64 = 0;
    let mut latest: Option<u64> = None;
    let mut session: Option<SessionResult> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Select(path)) => {
                        next_token += 1;
                        let token = next_token;
                        latest = Some(token);

                        let candidate = match CandidateFile::from_path(&path) {
                            Ok(c) => c,
                            Err(e) => {
                                latest = None;
                                let _ = event_tx.send(WorkflowEvent::Failed {
                                    error: WorkflowError::Transport(format!("{e:#}")),
                                });
                                continue;
                            }
                        };

                        let engine = UploadEngine::new(client.clone());
                        let tx = tag_tx.clone();
                        tokio::spawn(async move {
                            match engine.run(&candidate, token, &tx).await {
                                Ok(result) => {
                                    let _ = tx.send((token, WorkflowEvent::Completed {
                                        result: Box::new(result),
                                    }));
                                }
                                Err(error) => {
                                    let _ = tx.send((token, WorkflowEvent::Failed { error }));
                                }
                            }
                        });
                    }
                    Some(UiCommand::Download(kind)) => {
                        match session.clone() {
                            None => {
                                let _ = event_tx.send(WorkflowEvent::Failed {
                                    error: WorkflowError::MissingSession,
                                });
                            }
                            Some(s) => {
                                let _ = event_tx.send(WorkflowEvent::Info(
                                    InfoEvent::DownloadStarted { kind },
                                ));
                                let dl_client = client.clone();
                                let dl_tx = event_tx.clone();
                                let dest = cfg.output_dir.clone();
                                tokio::spawn(async move {
                                    match dl_client.download(&s.session_id, kind, &dest).await {
                                        Ok(path) => {
                                            let _ = dl_tx.send(WorkflowEvent::DownloadFinished {
                                                kind,
                                                path,
                                            });
                                        }
                                        Err(e) => {
                                            let _ = dl_tx.send(WorkflowEvent::DownloadFailed {
                                                kind,
                                                message: format!("{e:#}"),
                                            });
                                        }
                                    }
                                });
                            }
                        }
                    }
                    Some(UiCommand::Reset) => {
                        // Invalidates every in-flight submission and pending
                        // results timer; the requests themselves keep running.
                        latest = None;
                        session = None;
                        let _ = event_tx.send(WorkflowEvent::ResetAck);
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some((token, ev)) = tag_rx.recv() => {
                if latest != Some(token) {
                    // Stale submission; its response lost the race.
                    continue;
                }
                match ev {
                    WorkflowEvent::Completed { result } => {
                        session = Some((*result).clone());
                        let _ = event_tx.send(WorkflowEvent::Completed { result });
                        // Pacing before the results view. Tagged with the same
                        // token, so a reset or newer selection clears it too.
                        let delay = cfg.results_delay;
                        let tx = tag_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send((token, WorkflowEvent::ResultsReady));
                        });
                    }
                    other => {
                        let _ = event_tx.send(other);
                    }
                }
            }
        }
    }

    Ok(())
}
