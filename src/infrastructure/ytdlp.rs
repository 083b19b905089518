use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::domain::track::{Track, TrackSource};
use crate::services::error::MusicError;

#[derive(Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    url: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
}

/// Metadata lookups through the `yt-dlp` binary.
pub struct YtDlp {
    program: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Lists up to `limit` playable entries for a URL, playlist or search target.
    ///
    /// The child is killed if it hasn't exited within the configured timeout.
    pub async fn lookup(&self, target: &str, limit: usize) -> Result<Vec<Track>, MusicError> {
        let lookup = Command::new(&self.program)
            .args([
                "-j",
                "--flat-playlist",
                "--no-warnings",
                "--playlist-end",
                &limit.to_string(),
                target,
            ])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!("Failed to run {}: {e}", self.program);
                return Err(MusicError::ResolutionFailed(target.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    "yt-dlp lookup for {target} timed out after {}s",
                    self.timeout.as_secs()
                );
                return Err(MusicError::ResolutionFailed(target.to_string()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("yt-dlp lookup for {target} failed: {}", stderr.trim());
            return Err(MusicError::ResolutionFailed(target.to_string()));
        }

        Ok(parse_entries(&output.stdout))
    }
}

/// One JSON object per line; lines that don't describe a playable entry are skipped.
fn parse_entries(stdout: &[u8]) -> Vec<Track> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => entry_to_track(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable yt-dlp line: {e}");
                None
            }
        })
        .collect()
}

fn entry_to_track(entry: YtDlpEntry) -> Option<Track> {
    let url = entry.webpage_url.or(entry.original_url).or(entry.url)?;

    let mut track = Track::new(
        entry.title.unwrap_or_else(|| url.clone()),
        TrackSource::Remote(url),
    );
    track.duration = entry.duration.map_or(0, |d| d.max(0.0) as u64);
    track.uploader = entry.uploader.or(entry.channel);
    track.thumbnail_url = entry.thumbnail;
    Some(track)
}
