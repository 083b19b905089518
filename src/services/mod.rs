pub mod backend;
pub mod error;
pub mod music_service;
pub mod player_service;
