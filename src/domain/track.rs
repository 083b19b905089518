use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// A URL, or a yt-dlp search target such as `ytsearch1:<query>`.
    Remote(String),
    File(PathBuf),
}

impl TrackSource {
    /// Link target for embeds, if the source is a real web page.
    pub fn web_url(&self) -> Option<&str> {
        match self {
            TrackSource::Remote(uri)
                if uri.starts_with("http://") || uri.starts_with("https://") =>
            {
                Some(uri.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::Remote(_) => write!(f, "[WEB]"),
            TrackSource::File(_) => write!(f, "[FILE]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub source: TrackSource,
    /// Length in seconds, `0` when unknown.
    pub duration: u64,
    pub uploader: Option<String>,
    pub requester: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, source: TrackSource) -> Self {
        Self {
            title: title.into(),
            source,
            duration: 0,
            uploader: None,
            requester: None,
            thumbnail_url: None,
        }
    }

    pub fn display_duration(&self) -> String {
        format_duration(self.duration)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uploader {
            Some(uploader) => write!(f, "{} {} - {}", self.source, self.title, uploader),
            None => write!(f, "{} {}", self.source, self.title),
        }
    }
}

pub fn format_duration(secs: u64) -> String {
    if secs == 0 {
        return "--:--".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
