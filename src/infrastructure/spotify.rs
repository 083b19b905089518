use futures::stream::TryStreamExt;
use rspotify::model::{AlbumId, FullTrack, PlayableItem, PlaylistId, SimplifiedTrack, TrackId};
use rspotify::{ClientCredsSpotify, ClientResult, Credentials, prelude::*};

use crate::domain::track::{Track, TrackSource};
use crate::infrastructure::audio::AudioSource;

/// Spotify metadata. Audio comes from a YouTube search for the same song.
pub struct SpotifyClient {
    client: ClientCredsSpotify,
}

impl SpotifyClient {
    pub async fn new(client_id: &str, client_secret: &str) -> ClientResult<Self> {
        let creds = Credentials::new(client_id, client_secret);
        let client = ClientCredsSpotify::new(creds);
        client.request_token().await?;
        Ok(Self { client })
    }

    pub async fn get_track(&self, id: &str) -> Option<Track> {
        let track_id = TrackId::from_id(id).ok()?;
        match self.client.track(track_id, None).await {
            Ok(full_track) => Some(full_track_to_track(full_track)),
            Err(e) => {
                tracing::warn!("Spotify track lookup failed: {e}");
                None
            }
        }
    }

    pub async fn get_playlist_tracks(&self, id: &str, limit: usize) -> Vec<Track> {
        let playlist_id = match PlaylistId::from_id(id) {
            Ok(id) => id,
            Err(_) => return Vec::new(),
        };

        let stream = self.client.playlist_items(playlist_id, None, None);
        futures::pin_mut!(stream);

        let mut tracks = Vec::new();
        while tracks.len() < limit {
            match stream.try_next().await {
                Ok(Some(item)) => {
                    if let Some(PlayableItem::Track(full_track)) = item.track {
                        tracks.push(full_track_to_track(full_track));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Spotify playlist page failed: {e}");
                    break;
                }
            }
        }
        tracks
    }

    pub async fn get_album_tracks(&self, id: &str, limit: usize) -> Vec<Track> {
        let album_id = match AlbumId::from_id(id) {
            Ok(id) => id,
            Err(_) => return Vec::new(),
        };

        let stream = self.client.album_track(album_id, None);
        futures::pin_mut!(stream);

        let mut tracks = Vec::new();
        while tracks.len() < limit {
            match stream.try_next().await {
                Ok(Some(track)) => tracks.push(simplified_track_to_track(&track)),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Spotify album page failed: {e}");
                    break;
                }
            }
        }
        tracks
    }
}

fn artist_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

fn searchable_track(title: String, artist: String, duration_ms: i64) -> Track {
    let query = format!("{title} {artist} audio");
    let mut track = Track::new(title, TrackSource::Remote(AudioSource::search_target(&query)));
    track.duration = (duration_ms.max(0) / 1000) as u64;
    track.uploader = Some(artist);
    track
}

fn full_track_to_track(full_track: FullTrack) -> Track {
    let artist = artist_names(full_track.artists.iter().map(|a| a.name.as_str()));
    let thumbnail_url = full_track.album.images.first().map(|img| img.url.clone());
    let mut track = searchable_track(
        full_track.name,
        artist,
        full_track.duration.num_milliseconds(),
    );
    track.thumbnail_url = thumbnail_url;
    track
}

// Album tracks don't carry album images.
fn simplified_track_to_track(track: &SimplifiedTrack) -> Track {
    let artist = artist_names(track.artists.iter().map(|a| a.name.as_str()));
    searchable_track(
        track.name.clone(),
        artist,
        track.duration.num_milliseconds(),
    )
}
