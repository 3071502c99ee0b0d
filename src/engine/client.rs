use crate::model::{DownloadKind, RunConfig, ServerHealth, UploadResponse};
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{multipart, Url};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// HTTP client for the conversion service. Cheap to clone; the inner
/// `reqwest::Client` is shared.
#[derive(Clone)]
pub struct ConverterClient {
    pub http: reqwest::Client,
    base_url: Url,
    upload_url: Url,
    health_url: Url,
}

impl ConverterClient {
    pub fn new(cfg: &RunConfig) -> Result<Self> {
        // Normalize to a trailing slash so Url::join keeps any base path.
        let mut raw = cfg.base_url.trim_end_matches('/').to_string();
        raw.push('/');
        let base_url =
            Url::parse(&raw).with_context(|| format!("invalid base URL: {}", cfg.base_url))?;
        let upload_url = base_url.join("upload").context("build upload URL")?;
        let health_url = base_url.join("health").context("build health URL")?;

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.request_timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            upload_url,
            health_url,
        })
    }

    /// Deterministic artifact address: `{base}/download/{session_id}/{kind}`.
    pub fn download_url(&self, session_id: &str, kind: DownloadKind) -> Result<Url> {
        self.base_url
            .join(&format!(
                "download/{}/{}",
                session_id,
                kind.as_path_segment()
            ))
            .context("build download URL")
    }

    /// Submit the statement as a multipart form with the single field `file`.
    /// Every error out of here is transport-class; the caller maps it.
    pub async fn upload(&self, file_name: &str, bytes: Bytes) -> Result<UploadResponse> {
        let len = bytes.len() as u64;
        let part = multipart::Part::stream_with_length(reqwest::Body::from(bytes), len)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .context("build multipart body")?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!(transport_detail(&e)))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| anyhow!(transport_detail(&e)))?;

        serde_json::from_slice::<UploadResponse>(&body)
            .map_err(|_| anyhow!("service returned a non-JSON response (HTTP {status})"))
    }

    pub async fn fetch_health(&self) -> Result<ServerHealth> {
        let resp = self
            .http
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| anyhow!(transport_detail(&e)))?;
        resp.json::<ServerHealth>()
            .await
            .context("decode health response")
    }

    /// Stream one artifact into `dest_dir`, named by the server when it says so.
    pub async fn download(
        &self,
        session_id: &str,
        kind: DownloadKind,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let url = self.download_url(session_id, kind)?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!(transport_detail(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            let msg = resp
                .bytes()
                .await
                .ok()
                .and_then(|b| serde_json::from_slice::<UploadResponse>(&b).ok())
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("{} artifact not available (HTTP {})", kind, status));
            return Err(anyhow!(msg));
        }

        let file_name = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("statement-{}.{}", session_id, kind.artifact_extension()));

        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("create output directory {}", dest_dir.display()))?;
        let dest = dest_dir.join(&file_name);
        let mut file = tokio::fs::File::create(&dest)
            .await
            .with_context(|| format!("create {}", dest.display()))?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let b = chunk.map_err(|e| anyhow!(transport_detail(&e)))?;
            file.write_all(&b).await.context("write artifact chunk")?;
        }
        file.flush().await.context("flush artifact")?;

        Ok(dest)
    }
}

/// Flatten a reqwest error with its source chain, so "connection refused" and
/// friends survive into user-facing messages.
fn transport_detail(err: &reqwest::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(s) = source {
        detail.push_str(": ");
        detail.push_str(&s.to_string());
        source = s.source();
    }
    detail
}

/// Pull the attachment name out of a Content-Disposition header, keeping only
/// the final path component.
fn attachment_filename(value: &str) -> Option<String> {
    let idx = value.find("filename=")?;
    let raw = value[idx + "filename=".len()..]
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"');
    let name = Path::new(raw).file_name().and_then(|n| n.to_str())?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(base_url: &str) -> RunConfig {
        RunConfig {
            base_url: base_url.to_string(),
            user_agent: "statement-convert-cli/test".into(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            results_delay: Duration::from_millis(0),
            output_dir: std::env::temp_dir(),
            check_server: false,
        }
    }

    #[test]
    fn download_url_is_deterministic() {
        let client = ConverterClient::new(&test_config("http://127.0.0.1:5000")).unwrap();
        let url = client.download_url("abc", DownloadKind::Csv).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/download/abc/csv");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let with = ConverterClient::new(&test_config("http://host:5000/")).unwrap();
        let without = ConverterClient::new(&test_config("http://host:5000")).unwrap();
        assert_eq!(
            with.download_url("s1", DownloadKind::Excel).unwrap(),
            without.download_url("s1", DownloadKind::Excel).unwrap()
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let client = ConverterClient::new(&test_config("http://host/api")).unwrap();
        let url = client.download_url("s1", DownloadKind::Summary).unwrap();
        assert_eq!(url.as_str(), "http://host/api/download/s1/summary");
    }

    #[test]
    fn attachment_filename_parses_quoted_and_bare() {
        assert_eq!(
            attachment_filename("attachment; filename=\"transactions.csv\""),
            Some("transactions.csv".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=summary.md"),
            Some("summary.md".to_string())
        );
        assert_eq!(attachment_filename("inline"), None);
    }

    #[test]
    fn attachment_filename_strips_path_components() {
        assert_eq!(
            attachment_filename("attachment; filename=\"../../etc/passwd\""),
            Some("passwd".to_string())
        );
    }
}
