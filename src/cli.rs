use crate::engine::{CandidateFile, ConverterClient, TaggedEvent, UploadEngine};
use crate::model::{DownloadKind, InfoEvent, RunConfig, SessionResult, WorkflowEvent};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "statement-convert-cli",
    version,
    about = "Bank statement PDF converter client with optional TUI"
)]
pub struct Cli {
    /// Path to the PDF statement to upload on launch
    pub file: Option<PathBuf>,

    /// Base URL of the conversion service
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Print the session result as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Artifact kinds to fetch after a successful conversion (repeatable)
    #[arg(long, value_enum)]
    pub download: Vec<DownloadKind>,

    /// Fetch every artifact kind after a successful conversion
    #[arg(long)]
    pub download_all: bool,

    /// Directory for downloaded artifacts (defaults to the user's download directory)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Connection timeout for the conversion service
    #[arg(long, default_value = "10s")]
    pub connect_timeout: humantime::Duration,

    /// Overall request timeout; the conversion itself runs during the upload request
    #[arg(long, default_value = "5m")]
    pub request_timeout: humantime::Duration,

    /// Pause between processing completion and the results view
    #[arg(long, default_value = "500ms")]
    pub results_delay: humantime::Duration,

    /// Check service health on startup
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub check_server: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    // Silent mode takes precedence over other output modes
    if args.silent {
        return run_upload(args, true).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_upload(args, false).await;
    }

    run_text(args).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        base_url: args.base_url.clone(),
        user_agent: format!("statement-convert-cli/{}", env!("CARGO_PKG_VERSION")),
        connect_timeout: Duration::from(args.connect_timeout),
        request_timeout: Duration::from(args.request_timeout),
        results_delay: Duration::from(args.results_delay),
        output_dir: args.output.clone().unwrap_or_else(default_output_dir),
        check_server: args.check_server,
    }
}

/// Artifacts land in the user's download directory unless overridden.
fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Requested artifact kinds, deduplicated in the order given.
fn requested_kinds(args: &Cli) -> Vec<DownloadKind> {
    if args.download_all {
        return DownloadKind::all().to_vec();
    }
    let mut kinds = Vec::new();
    for k in &args.download {
        if !kinds.contains(k) {
            kinds.push(*k);
        }
    }
    kinds
}

/// One-shot upload for JSON and silent modes.
async fn run_upload(args: Cli, silent: bool) -> Result<()> {
    let path = args
        .file
        .clone()
        .context("FILE is required in --json/--silent mode")?;
    let cfg = build_config(&args);
    let client = ConverterClient::new(&cfg)?;
    let (out_tx, out_handle) = if silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    let candidate = CandidateFile::from_path(&path)?;
    let engine = UploadEngine::new(client.clone());
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TaggedEvent>();

    // Progress events only matter for a UI; drain them so the engine never
    // sends into a closed channel.
    let drain = tokio::spawn(async move { while evt_rx.recv().await.is_some() {} });

    let result = engine.run(&candidate, 0, &evt_tx).await?;
    drop(evt_tx);
    let _ = drain.await;

    let downloaded =
        fetch_artifacts(&client, &cfg, &result, &requested_kinds(&args), out_tx.as_ref()).await?;

    if let Some(tx) = out_tx.as_ref() {
        let out = serde_json::to_string_pretty(&result)?;
        let _ = tx.send(OutputLine::Stdout(out));
        for p in &downloaded {
            let _ = tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
        }
    }

    if let Some(tx) = out_tx {
        drop(tx);
    }
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let path = args.file.clone().context("FILE is required in --text mode")?;
    let cfg = build_config(&args);
    let client = ConverterClient::new(&cfg)?;
    let (out_tx, out_handle) = spawn_output_writer();

    if cfg.check_server {
        match client.fetch_health().await {
            Ok(health) => {
                let _ = out_tx.send(OutputLine::Stderr(health.to_message()));
            }
            Err(e) => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Service check failed: {e:#}")));
            }
        }
    }

    let candidate = CandidateFile::from_path(&path)?;
    let engine = UploadEngine::new(client.clone());
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TaggedEvent>();
    let progress_out = out_tx.clone();
    let progress = tokio::spawn(async move {
        while let Some((_token, ev)) = evt_rx.recv().await {
            match ev {
                WorkflowEvent::Progress { percent, status } => {
                    let _ =
                        progress_out.send(OutputLine::Stderr(format!("[{percent:>3}%] {status}")));
                }
                WorkflowEvent::Info(info) => {
                    let _ = progress_out.send(OutputLine::Stderr(info.to_message()));
                }
                _ => {}
            }
        }
    });

    let result = engine.run(&candidate, 0, &evt_tx).await?;
    drop(evt_tx);
    let _ = progress.await;

    let downloaded =
        fetch_artifacts(&client, &cfg, &result, &requested_kinds(&args), Some(&out_tx)).await?;

    let summary = crate::text_summary::build_text_summary(&result);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    for p in &downloaded {
        let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Fetch the requested artifact kinds for a completed session.
async fn fetch_artifacts(
    client: &ConverterClient,
    cfg: &RunConfig,
    result: &SessionResult,
    kinds: &[DownloadKind],
    out_tx: Option<&mpsc::UnboundedSender<OutputLine>>,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for kind in kinds {
        if let Some(tx) = out_tx {
            let _ = tx.send(OutputLine::Stderr(
                InfoEvent::DownloadStarted { kind: *kind }.to_message(),
            ));
        }
        let path = client
            .download(&result.session_id, *kind, &cfg.output_dir)
            .await
            .with_context(|| format!("download {} artifact", kind))?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).expect("argv should parse")
    }

    #[test]
    fn download_kinds_parse_and_dedupe() {
        let args = parse(&[
            "statement-convert-cli",
            "s.pdf",
            "--download",
            "csv",
            "--download",
            "excel",
            "--download",
            "csv",
        ]);
        assert_eq!(
            requested_kinds(&args),
            vec![DownloadKind::Csv, DownloadKind::Excel]
        );
    }

    #[test]
    fn download_all_covers_every_kind() {
        let args = parse(&["statement-convert-cli", "s.pdf", "--download-all"]);
        assert_eq!(requested_kinds(&args), DownloadKind::all().to_vec());
    }

    #[test]
    fn config_defaults_match_the_workflow_contract() {
        let args = parse(&["statement-convert-cli", "s.pdf"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.base_url, "http://127.0.0.1:5000");
        assert_eq!(cfg.results_delay, Duration::from_millis(500));
        assert!(cfg.check_server);
    }

    #[tokio::test]
    async fn silent_requires_json() {
        let args = parse(&["statement-convert-cli", "s.pdf", "--silent"]);
        let err = run(args).await.unwrap_err();
        assert!(err.to_string().contains("--silent"));
    }
}
