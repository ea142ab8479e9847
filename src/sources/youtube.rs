use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, info};

use super::{MediaExtractor, MediaInfo, PlaylistListing, ResolutionError};

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

static UNSUPPORTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unsupported url|no video formats found|requested format is not available")
        .expect("static regex")
});

static NETWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unable to download|timed out|connection (reset|refused)|name resolution|http error 5\d\d|ssl")
        .expect("static regex")
});

/// Cliente para yt-dlp
pub struct YtDlp {
    binary: String,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    url: Option<String>,
}

/// Respuesta de `--flat-playlist --dump-single-json`
#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<YtDlpFlatEntry>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFlatEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    ie_key: Option<String>,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolutionError> {
        debug!("🔧 {} {}", self.binary, args.join(" "));

        let output = tokio::time::timeout(
            EXTRACT_TIMEOUT,
            Command::new(&self.binary).args(args).output(),
        )
        .await
        .map_err(|_| ResolutionError::Network("yt-dlp timed out".into()))?
        .map_err(|e| ResolutionError::Network(format!("could not run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.binary, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn probe(&self, locator: &str) -> Result<MediaInfo, ResolutionError> {
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", locator])
            .await?;
        parse_first_info(&stdout, locator)
    }

    async fn search_first(&self, text: &str) -> Result<MediaInfo, ResolutionError> {
        info!("🔍 Buscando en YouTube: {}", text);
        let search_query = format!("ytsearch1:{}", text);
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", &search_query])
            .await?;
        parse_first_info(&stdout, text)
    }

    async fn list_playlist(&self, url: &str, limit: usize) -> Result<PlaylistListing, ResolutionError> {
        let limit = limit.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-single-json",
                "--playlist-end",
                &limit,
                "--no-warnings",
                url,
            ])
            .await?;
        parse_playlist(&stdout)
    }
}

fn parse_first_info(stdout: &str, query: &str) -> Result<MediaInfo, ResolutionError> {
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;

    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| ResolutionError::UnsupportedFormat(format!("unreadable yt-dlp output: {e}")))?;

    let locator = info
        .webpage_url
        .or(info.original_url)
        .or(info.url)
        .ok_or_else(|| ResolutionError::UnsupportedFormat(format!("no playable address for `{query}`")))?;

    Ok(MediaInfo {
        title: info.title,
        locator,
        thumbnail: info.thumbnail,
        duration_secs: info.duration,
    })
}

fn parse_playlist(stdout: &str) -> Result<PlaylistListing, ResolutionError> {
    let playlist: YtDlpPlaylist = serde_json::from_str(stdout.trim())
        .map_err(|e| ResolutionError::UnsupportedFormat(format!("unreadable playlist: {e}")))?;

    let entries = playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            entry.webpage_url.or(entry.url).or_else(|| {
                // Algunas entradas planas solo traen el id
                match (entry.ie_key.as_deref(), entry.id) {
                    (Some("Youtube"), Some(id)) => Some(format!("https://www.youtube.com/watch?v={id}")),
                    _ => None,
                }
            })
        })
        .collect();

    Ok(PlaylistListing {
        title: playlist.title,
        entries,
    })
}

/// Traduce el stderr de yt-dlp a la taxonomía de errores
fn classify_failure(stderr: &str) -> ResolutionError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .unwrap_or(stderr)
        .trim()
        .to_string();

    if UNSUPPORTED.is_match(&message) {
        ResolutionError::UnsupportedFormat(message)
    } else if NETWORK.is_match(&message) {
        ResolutionError::Network(message)
    } else {
        ResolutionError::NotFound(message)
    }
}
