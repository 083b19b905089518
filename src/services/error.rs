use std::path::PathBuf;

use crate::domain::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("You must be in a voice channel")]
    NotInVoiceChannel,
    #[error("This command must be used in a server")]
    NotInGuild,
    #[error("I'm not in a voice channel")]
    NotConnected,
    #[error("Nothing is playing right now")]
    NothingPlaying,
    #[error("Couldn't find anything for `{0}`")]
    ResolutionFailed(String),
    #[error("The queue is full ({max} tracks max)")]
    QueueFull { max: usize },
    #[error("There is no track #{index} in the queue (it has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<QueueError> for MusicError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::IndexOutOfRange { index, len } => {
                MusicError::IndexOutOfRange { index, len }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Not connected to voice")]
    NotConnected,
    #[error("Failed to join voice channel: {0}")]
    Join(String),
    #[error("File not found: {}", .0.display())]
    FileMissing(PathBuf),
    #[error("Playback failed: {0}")]
    Playback(String),
}
