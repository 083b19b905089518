use reqwest::Client;
use songbird::input::{File, Input, YoutubeDl};

use crate::domain::track::TrackSource;

const SEARCH_PREFIX: &str = "ytsearch1:";

fn best_audio_args() -> Vec<String> {
    vec!["-f".to_string(), "bestaudio".to_string()]
}

pub struct AudioSource;

impl AudioSource {
    pub fn from_source(http: Client, source: &TrackSource) -> Input {
        match source {
            TrackSource::Remote(uri) => match uri.strip_prefix(SEARCH_PREFIX) {
                Some(query) => Self::from_search(http, query),
                None => Self::from_url(http, uri),
            },
            TrackSource::File(path) => File::new(path.clone()).into(),
        }
    }

    pub fn from_url(http: Client, url: &str) -> Input {
        YoutubeDl::new(http, url.to_string())
            .user_args(best_audio_args())
            .into()
    }

    pub fn from_search(http: Client, query: &str) -> Input {
        YoutubeDl::new_search(http, query.to_string())
            .user_args(best_audio_args())
            .into()
    }

    /// yt-dlp target that plays the first search hit for `query`.
    pub fn search_target(query: &str) -> String {
        format!("{SEARCH_PREFIX}{query}")
    }
}
