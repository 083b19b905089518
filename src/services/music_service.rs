use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::track::{Track, TrackSource};
use crate::infrastructure::audio::AudioSource;
use crate::infrastructure::spotify::SpotifyClient;
use crate::infrastructure::ytdlp::YtDlp;
use crate::services::backend::QueryResolver;
use crate::services::error::MusicError;

static SPOTIFY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"open\.spotify\.com/(?:intl-[a-z]+/)?(track|playlist|album)/([a-zA-Z0-9]+)")
        .expect("valid Spotify URL pattern")
});

#[derive(Debug, PartialEq, Eq)]
pub enum SpotifyUrl {
    Track(String),
    Playlist(String),
    Album(String),
}

/// Resolves `/play` queries: local media files, Spotify links, then yt-dlp.
pub struct MusicService {
    spotify: Option<SpotifyClient>,
    ytdlp: YtDlp,
    media_dir: Option<PathBuf>,
    max_playlist_tracks: usize,
}

impl MusicService {
    pub fn new(
        spotify: Option<SpotifyClient>,
        ytdlp: YtDlp,
        media_dir: Option<PathBuf>,
        max_playlist_tracks: usize,
    ) -> Self {
        Self {
            spotify,
            ytdlp,
            media_dir,
            max_playlist_tracks,
        }
    }

    pub fn is_url(query: &str) -> bool {
        query.starts_with("http://") || query.starts_with("https://")
    }

    pub fn parse_spotify_url(query: &str) -> Option<SpotifyUrl> {
        let caps = SPOTIFY_URL_RE.captures(query)?;
        let kind = caps.get(1)?.as_str();
        let id = caps.get(2)?.as_str().to_string();
        match kind {
            "track" => Some(SpotifyUrl::Track(id)),
            "playlist" => Some(SpotifyUrl::Playlist(id)),
            "album" => Some(SpotifyUrl::Album(id)),
            _ => None,
        }
    }

    async fn resolve_spotify(
        &self,
        url: SpotifyUrl,
        query: &str,
    ) -> Result<Vec<Track>, MusicError> {
        let Some(spotify) = &self.spotify else {
            tracing::info!("Spotify link received but Spotify is not configured");
            return Err(MusicError::ResolutionFailed(query.to_string()));
        };
        let limit = self.max_playlist_tracks;
        Ok(match url {
            SpotifyUrl::Track(id) => spotify.get_track(&id).await.into_iter().collect(),
            SpotifyUrl::Playlist(id) => spotify.get_playlist_tracks(&id, limit).await,
            SpotifyUrl::Album(id) => spotify.get_album_tracks(&id, limit).await,
        })
    }

    async fn resolve_local(&self, query: &str) -> Option<Track> {
        let media_dir = self.media_dir.as_deref()?;
        let path = confine_to(media_dir, query).await?;
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| query.to_string());
        Some(Track::new(title, TrackSource::File(path)))
    }
}

#[async_trait]
impl QueryResolver for MusicService {
    async fn resolve(&self, query: &str, requester: &str) -> Result<Vec<Track>, MusicError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::ResolutionFailed(String::new()));
        }

        let tracks = if let Some(url) = Self::parse_spotify_url(query) {
            self.resolve_spotify(url, query).await?
        } else if let Some(track) = self.resolve_local(query).await {
            vec![track]
        } else if Self::is_url(query) {
            self.ytdlp.lookup(query, self.max_playlist_tracks).await?
        } else {
            self.ytdlp
                .lookup(&AudioSource::search_target(query), 1)
                .await?
        };

        if tracks.is_empty() {
            return Err(MusicError::ResolutionFailed(query.to_string()));
        }

        Ok(tracks
            .into_iter()
            .map(|mut track| {
                track.requester = Some(requester.to_string());
                track
            })
            .collect())
    }
}

/// Resolves `name` inside `media_dir`, refusing anything that escapes it.
async fn confine_to(media_dir: &Path, name: &str) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(media_dir).await.ok()?;
    let candidate = tokio::fs::canonicalize(root.join(name)).await.ok()?;
    if !candidate.starts_with(&root) {
        tracing::warn!("Rejected media path outside {}: {name}", root.display());
        return None;
    }
    let metadata = tokio::fs::metadata(&candidate).await.ok()?;
    metadata.is_file().then_some(candidate)
}
