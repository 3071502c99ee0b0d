use crate::model::{DownloadKind, ServerHealth, SessionResult, ViewState, WorkflowEvent};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Entry transition marker window after a view change.
const ENTRY_MARKER: Duration = Duration::from_millis(400);

/// UI-side workflow state. Owned by the UI thread only; no cross-thread
/// mutation. The view is a single enum value, so exactly one section can be
/// visible at a time.
pub struct UiState {
    pub view: ViewState,
    pub view_entered: Instant,
    pub progress_percent: u16,
    pub status: String,
    pub info: String,
    pub error_message: Option<String>,
    pub session: Option<SessionResult>,
    pub selected_path: Option<PathBuf>,
    pub path_input: String,
    pub path_editing: bool,
    pub show_help: bool,
    pub server_health: Option<ServerHealth>,
    pub downloads: Vec<(DownloadKind, PathBuf)>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            view: ViewState::Idle,
            view_entered: Instant::now(),
            progress_percent: 0,
            status: String::new(),
            info: String::new(),
            error_message: None,
            session: None,
            selected_path: None,
            path_input: String::new(),
            path_editing: false,
            show_help: false,
            server_health: None,
            downloads: Vec::new(),
        }
    }
}

impl UiState {
    /// Apply one workflow event. View changes go through the model's
    /// transition table; everything else is presentation bookkeeping.
    pub fn apply_event(&mut self, ev: WorkflowEvent) {
        if let Some(next) = ViewState::after(&ev) {
            self.enter_view(next);
        }
        match ev {
            WorkflowEvent::Progress { percent, status } => {
                self.progress_percent = percent;
                self.status = status;
            }
            WorkflowEvent::Info(info) => self.info = info.to_message(),
            WorkflowEvent::HealthChecked { health } => {
                self.info = health.to_message();
                self.server_health = Some(health);
            }
            WorkflowEvent::Completed { result } => {
                self.progress_percent = 100;
                self.session = Some(*result);
            }
            WorkflowEvent::ResultsReady => {}
            WorkflowEvent::Failed { error } => {
                self.error_message = Some(error.to_string());
            }
            WorkflowEvent::DownloadFinished { kind, path } => {
                self.info = format!("Saved {}: {}", kind, path.display());
                self.downloads.push((kind, path));
            }
            WorkflowEvent::DownloadFailed { kind, message } => {
                self.info = format!("{} download failed: {}", kind, message);
            }
            WorkflowEvent::ResetAck => {
                self.progress_percent = 0;
                self.status.clear();
                self.error_message = None;
                self.session = None;
                self.selected_path = None;
                self.path_input.clear();
                self.path_editing = false;
                self.downloads.clear();
            }
        }
    }

    fn enter_view(&mut self, next: ViewState) {
        if self.view != next {
            self.view = next;
            self.view_entered = Instant::now();
        }
    }

    /// True briefly after a view change; drives the entry highlight.
    pub fn view_just_entered(&self) -> bool {
        self.view_entered.elapsed() < ENTRY_MARKER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InfoEvent, SessionStats, WorkflowError};

    fn session(id: &str) -> Box<SessionResult> {
        Box::new(SessionResult {
            session_id: id.into(),
            source_file: "statement.pdf".into(),
            stats: SessionStats {
                transaction_count: 10,
                page_count: 2,
                category_count: 3,
                date_range: None,
                total_withdrawals: None,
                total_deposits: None,
            },
            message: None,
            completed_at: String::new(),
        })
    }

    #[test]
    fn success_cycle_lands_in_results_with_the_session() {
        let mut state = UiState::default();
        state.apply_event(WorkflowEvent::Progress {
            percent: 10,
            status: "Uploading PDF…".into(),
        });
        assert_eq!(state.view, ViewState::Processing);
        assert_eq!(state.progress_percent, 10);

        state.apply_event(WorkflowEvent::Completed {
            result: session("abc"),
        });
        // Completion alone keeps the processing view; pacing decides when
        // results appear.
        assert_eq!(state.view, ViewState::Processing);
        assert_eq!(state.progress_percent, 100);

        state.apply_event(WorkflowEvent::ResultsReady);
        assert_eq!(state.view, ViewState::Results);
        let sess = state.session.as_ref().expect("session stored");
        assert_eq!(sess.session_id, "abc");
        assert_eq!(sess.stats.transaction_count, 10);
    }

    #[test]
    fn failure_shows_the_error_text() {
        let mut state = UiState::default();
        state.apply_event(WorkflowEvent::Failed {
            error: WorkflowError::Application("bad pdf".into()),
        });
        assert_eq!(state.view, ViewState::Error);
        assert_eq!(state.error_message.as_deref(), Some("bad pdf"));
    }

    #[test]
    fn reset_zeroes_progress_from_every_state() {
        for setup in [
            WorkflowEvent::Progress {
                percent: 55,
                status: "Uploading PDF…".into(),
            },
            WorkflowEvent::Failed {
                error: WorkflowError::MissingSession,
            },
            WorkflowEvent::ResultsReady,
        ] {
            let mut state = UiState::default();
            state.progress_percent = 55;
            state.apply_event(setup);
            state.apply_event(WorkflowEvent::ResetAck);
            assert_eq!(state.view, ViewState::Idle);
            assert_eq!(state.progress_percent, 0);
            assert!(state.session.is_none());
            assert!(state.error_message.is_none());
        }
    }

    #[test]
    fn info_events_do_not_change_the_view() {
        let mut state = UiState::default();
        state.apply_event(WorkflowEvent::Info(InfoEvent::Message("hello".into())));
        assert_eq!(state.view, ViewState::Idle);
        assert_eq!(state.info, "hello");
    }

    #[test]
    fn downloads_accumulate_until_reset() {
        let mut state = UiState::default();
        state.apply_event(WorkflowEvent::Completed {
            result: session("abc"),
        });
        state.apply_event(WorkflowEvent::DownloadFinished {
            kind: DownloadKind::Csv,
            path: PathBuf::from("/tmp/transactions.csv"),
        });
        assert_eq!(state.downloads.len(), 1);
        state.apply_event(WorkflowEvent::ResetAck);
        assert!(state.downloads.is_empty());
    }
}
