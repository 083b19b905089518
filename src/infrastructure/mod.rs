pub mod audio;
pub mod inactivity;
pub mod notifier;
pub mod spotify;
pub mod voice;
pub mod ytdlp;
