use std::collections::{HashSet, VecDeque};
use std::fmt;

use poise::serenity_prelude::UserId;
use rand::seq::SliceRandom;

use super::track::Track;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("There is no track #{index} in the queue (it has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Playback order for a single guild.
///
/// `pending` is played FIFO. `current` is the track playing (or about to play)
/// and is never part of `pending`. Skip votes belong to `current` and are
/// dropped whenever it changes.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    skip_votes: HashSet<UserId>,
}

impl PlaybackQueue {
    pub fn add(&mut self, track: Track) {
        self.pending.push_back(track);
    }

    /// Picks the track that should play once `current` has finished.
    pub fn next(&mut self) -> Option<&Track> {
        if self.loop_mode == LoopMode::Track && self.current.is_some() {
            return self.current.as_ref();
        }
        self.advance()
    }

    /// Like [`next`](Self::next), but moves on even when looping a single track.
    pub fn next_skipping(&mut self) -> Option<&Track> {
        self.advance()
    }

    fn advance(&mut self) -> Option<&Track> {
        // Re-enqueue first so a single looped track keeps cycling.
        if self.loop_mode == LoopMode::Queue {
            if let Some(previous) = self.current.take() {
                self.pending.push_back(previous);
            }
        }

        self.current = self.pending.pop_front();
        self.skip_votes.clear();
        self.current.as_ref()
    }

    /// Drops `current` without re-enqueueing it, even when looping the queue.
    pub fn discard_current(&mut self) -> Option<Track> {
        self.skip_votes.clear();
        self.current.take()
    }

    /// Drops every track and vote. The loop mode is kept.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
        self.skip_votes.clear();
    }

    /// Removes the pending track at 1-based `index`.
    pub fn remove(&mut self, index: usize) -> Result<Track, QueueError> {
        let len = self.pending.len();
        if index == 0 || index > len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        self.pending
            .remove(index - 1)
            .ok_or(QueueError::IndexOutOfRange { index, len })
    }

    pub fn shuffle(&mut self) {
        self.pending.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    /// Records a vote to skip `current` and returns the number of distinct voters.
    pub fn register_skip_vote(&mut self, voter: UserId) -> usize {
        self.skip_votes.insert(voter);
        self.skip_votes.len()
    }

    pub fn skip_votes(&self) -> usize {
        self.skip_votes.len()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> &VecDeque<Track> {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn loop_track(&self) -> bool {
        self.loop_mode == LoopMode::Track
    }

    pub fn loop_queue(&self) -> bool {
        self.loop_mode == LoopMode::Queue
    }

    pub fn set_loop_track(&mut self, enabled: bool) {
        if enabled {
            self.loop_mode = LoopMode::Track;
        } else if self.loop_track() {
            self.loop_mode = LoopMode::Off;
        }
    }

    pub fn set_loop_queue(&mut self, enabled: bool) {
        if enabled {
            self.loop_mode = LoopMode::Queue;
        } else if self.loop_queue() {
            self.loop_mode = LoopMode::Off;
        }
    }
}
