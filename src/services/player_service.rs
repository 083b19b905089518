use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::domain::queue::{LoopMode, PlaybackQueue};
use crate::domain::track::Track;
use crate::domain::vote::{self, SkipDecision};
use crate::infrastructure::inactivity::InactivityTimers;
use crate::services::backend::{Notifier, PlayerEvent, QueryResolver, VoiceBackend};
use crate::services::error::MusicError;

pub type GuildPlayers = Arc<RwLock<HashMap<GuildId, Arc<Mutex<GuildPlayer>>>>>;

#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub idle_timeout: Duration,
    pub max_queue_length: usize,
}

/// Per-guild playback state. Only [`PlayerService`] mutates it.
#[derive(Debug, Default)]
pub struct GuildPlayer {
    queue: PlaybackQueue,
    text_channel: Option<ChannelId>,
    /// Id handed to the backend for the track currently playing.
    playback_id: Option<u64>,
    skip_pending: bool,
    paused: bool,
}

impl GuildPlayer {
    fn reset(&mut self) {
        self.queue.clear();
        self.playback_id = None;
        self.skip_pending = false;
        self.paused = false;
    }
}

pub struct PlayRequest {
    pub guild_id: GuildId,
    pub voice_channel_id: ChannelId,
    pub text_channel_id: ChannelId,
    pub requester: String,
    pub query: String,
}

#[derive(Debug)]
pub struct PlayOutcome {
    pub enqueued: Vec<Track>,
    /// Set when the request started playback in an idle guild.
    pub started: Option<Track>,
    /// Position in the pending queue of the first enqueued track (1-based).
    pub position: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped(Track),
    Pending { votes: usize, required: usize },
}

#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub loop_mode: LoopMode,
    pub paused: bool,
    /// Votes cast against `current`.
    pub skip_votes: usize,
    /// An inactivity disconnect is scheduled.
    pub idle: bool,
}

/// Playback driver and registry of every guild's queue.
#[derive(Clone)]
pub struct PlayerService {
    players: GuildPlayers,
    backend: Arc<dyn VoiceBackend>,
    resolver: Arc<dyn QueryResolver>,
    notifier: Arc<dyn Notifier>,
    timers: InactivityTimers,
    settings: PlayerSettings,
    next_playback_id: Arc<AtomicU64>,
}

impl PlayerService {
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        resolver: Arc<dyn QueryResolver>,
        notifier: Arc<dyn Notifier>,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            players: Arc::new(RwLock::new(HashMap::new())),
            backend,
            resolver,
            notifier,
            timers: InactivityTimers::new(),
            settings,
            next_playback_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Processes backend events one at a time until the sender side is dropped.
    pub async fn run(self, mut events: UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::TrackFinished {
                    guild_id,
                    playback_id,
                    error,
                } => self.on_track_finished(guild_id, playback_id, error).await,
            }
        }
        debug!("player event channel closed");
    }

    pub async fn get_or_create(&self, guild_id: GuildId) -> Arc<Mutex<GuildPlayer>> {
        if let Some(player) = self.players.read().await.get(&guild_id) {
            return player.clone();
        }
        self.players
            .write()
            .await
            .entry(guild_id)
            .or_default()
            .clone()
    }

    async fn existing(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildPlayer>>> {
        self.players.read().await.get(&guild_id).cloned()
    }

    pub async fn play(&self, request: PlayRequest) -> Result<PlayOutcome, MusicError> {
        let guild_id = request.guild_id;

        // Resolve first so a query that finds nothing never joins voice.
        let tracks = self
            .resolver
            .resolve(&request.query, &request.requester)
            .await?;
        if tracks.is_empty() {
            return Err(MusicError::ResolutionFailed(request.query));
        }

        self.backend
            .connect(guild_id, request.voice_channel_id)
            .await?;

        let player = self.get_or_create(guild_id).await;
        let mut player = player.lock().await;

        let max = self.settings.max_queue_length;
        if player.queue.len() + tracks.len() > max {
            if player.playback_id.is_none() {
                self.start_idle_timer(guild_id).await;
            }
            return Err(MusicError::QueueFull { max });
        }

        player.text_channel = Some(request.text_channel_id);
        let position = player.queue.len() + 1;
        for track in &tracks {
            player.queue.add(track.clone());
        }
        info!(%guild_id, count = tracks.len(), "enqueued tracks");

        let started = if player.playback_id.is_none() {
            let started = self.start_next(guild_id, &mut player, false).await;
            if started.is_none() {
                self.queue_exhausted(guild_id, &player).await;
            }
            started
        } else {
            None
        };

        Ok(PlayOutcome {
            enqueued: tracks,
            started,
            position,
        })
    }

    pub async fn on_track_finished(
        &self,
        guild_id: GuildId,
        playback_id: u64,
        error: Option<String>,
    ) {
        let Some(player) = self.existing(guild_id).await else {
            return;
        };
        let mut player = player.lock().await;

        if player.playback_id != Some(playback_id) {
            debug!(%guild_id, playback_id, "ignoring stale track event");
            return;
        }

        if let Some(err) = &error {
            let title = player
                .queue
                .current()
                .map(|t| t.title.clone())
                .unwrap_or_default();
            warn!(%guild_id, "playback of {title} failed: {err}");
            self.notify(&player, format!("⚠️ Couldn't play **{title}**: {err}"))
                .await;
            player.queue.discard_current();
        }

        let skipping = std::mem::take(&mut player.skip_pending) || error.is_some();
        let replay = !skipping && player.queue.loop_track();

        match self.start_next(guild_id, &mut player, skipping).await {
            Some(track) if !replay => {
                let text = format!(
                    "🎶 Now playing **{}** `{}`",
                    track.title,
                    track.display_duration()
                );
                self.notify(&player, text).await;
            }
            Some(_) => {}
            None => self.queue_exhausted(guild_id, &player).await,
        }
    }

    /// Asks the queue for the next track and starts it, moving past tracks the
    /// backend refuses. Returns the track that is now playing.
    async fn start_next(
        &self,
        guild_id: GuildId,
        player: &mut GuildPlayer,
        mut skipping: bool,
    ) -> Option<Track> {
        loop {
            let next = if skipping {
                player.queue.next_skipping().cloned()
            } else {
                player.queue.next().cloned()
            };

            let Some(track) = next else {
                player.playback_id = None;
                player.paused = false;
                return None;
            };

            let playback_id = self.next_playback_id.fetch_add(1, Ordering::Relaxed);
            match self.backend.play(guild_id, &track, playback_id).await {
                Ok(()) => {
                    info!(%guild_id, playback_id, "now playing {track}");
                    player.playback_id = Some(playback_id);
                    player.paused = false;
                    return Some(track);
                }
                Err(e) => {
                    warn!(%guild_id, "failed to start {}: {e}", track.title);
                    self.notify(player, format!("⚠️ Couldn't play **{}**: {e}", track.title))
                        .await;
                    // Keep a broken track out of the loop-queue rotation.
                    player.queue.discard_current();
                    skipping = true;
                }
            }
        }
    }

    async fn queue_exhausted(&self, guild_id: GuildId, player: &GuildPlayer) {
        info!(%guild_id, "queue finished");
        self.notify(player, "Queue finished.".to_string()).await;
        self.start_idle_timer(guild_id).await;
    }

    pub async fn skip(
        &self,
        guild_id: GuildId,
        voter: UserId,
        is_admin: bool,
    ) -> Result<SkipOutcome, MusicError> {
        let player = self
            .existing(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;

        let members = self.backend.channel_members(guild_id).await;
        let listeners = members.iter().filter(|listener| !listener.is_bot).count();
        let in_channel = members
            .iter()
            .any(|listener| listener.id == voter && !listener.is_bot);

        let mut player = player.lock().await;
        if player.playback_id.is_none() {
            return Err(MusicError::NothingPlaying);
        }
        let current = player
            .queue
            .current()
            .cloned()
            .ok_or(MusicError::NothingPlaying)?;

        // Only people listening get a vote; admins may skip from anywhere.
        if !in_channel && !is_admin {
            return Err(MusicError::NotInVoiceChannel);
        }

        let votes = player.queue.register_skip_vote(voter);
        match vote::decide(votes, listeners, is_admin, in_channel) {
            SkipDecision::Pending { votes, required } => {
                debug!(%guild_id, votes, required, "skip vote registered");
                Ok(SkipOutcome::Pending { votes, required })
            }
            SkipDecision::Forced | SkipDecision::Passed => {
                info!(%guild_id, "skipping {}", current.title);
                // The finish event from stopping the track advances the queue.
                player.skip_pending = true;
                self.backend.stop(guild_id).await;
                Ok(SkipOutcome::Skipped(current))
            }
        }
    }

    /// Clears the queue and stops the current track, staying connected.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), MusicError> {
        if !self.backend.is_connected(guild_id).await {
            return Err(MusicError::NotConnected);
        }

        let player = self.get_or_create(guild_id).await;
        player.lock().await.reset();
        self.backend.stop(guild_id).await;
        info!(%guild_id, "playback stopped");

        self.start_idle_timer(guild_id).await;
        Ok(())
    }

    /// Stops playback and leaves the voice channel.
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), MusicError> {
        self.timers.cancel(guild_id).await;
        if let Some(player) = self.existing(guild_id).await {
            player.lock().await.reset();
        }
        self.backend.stop(guild_id).await;
        self.backend.disconnect(guild_id).await?;
        info!(%guild_id, "left voice");
        Ok(())
    }

    /// Drops a guild's state after the bot was disconnected from voice.
    pub async fn forget(&self, guild_id: GuildId) {
        self.timers.cancel(guild_id).await;
        if let Some(player) = self.players.write().await.remove(&guild_id) {
            player.lock().await.reset();
            debug!(%guild_id, "dropped guild player");
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<Track, MusicError> {
        let player = self
            .existing(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;
        let mut player = player.lock().await;
        let current = playing_track(&player)?;
        self.backend.pause(guild_id).await?;
        player.paused = true;
        Ok(current)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<Track, MusicError> {
        let player = self
            .existing(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;
        let mut player = player.lock().await;
        let current = playing_track(&player)?;
        self.backend.resume(guild_id).await?;
        player.paused = false;
        Ok(current)
    }

    /// Pauses or resumes; returns `true` if playback is now paused.
    pub async fn toggle_pause(&self, guild_id: GuildId) -> Result<bool, MusicError> {
        let paused = match self.existing(guild_id).await {
            Some(player) => player.lock().await.paused,
            None => return Err(MusicError::NothingPlaying),
        };
        if paused {
            self.resume(guild_id).await?;
        } else {
            self.pause(guild_id).await?;
        }
        Ok(!paused)
    }

    pub async fn remove(&self, guild_id: GuildId, index: usize) -> Result<Track, MusicError> {
        let player = self.get_or_create(guild_id).await;
        let removed = player.lock().await.queue.remove(index)?;
        Ok(removed)
    }

    /// Returns the number of shuffled tracks.
    pub async fn shuffle(&self, guild_id: GuildId) -> usize {
        let player = self.get_or_create(guild_id).await;
        let mut player = player.lock().await;
        if player.queue.is_empty() {
            return 0;
        }
        player.queue.shuffle();
        player.queue.len()
    }

    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) {
        let player = self.get_or_create(guild_id).await;
        let mut player = player.lock().await;
        match mode {
            LoopMode::Off => {
                player.queue.set_loop_track(false);
                player.queue.set_loop_queue(false);
            }
            LoopMode::Track => player.queue.set_loop_track(true),
            LoopMode::Queue => player.queue.set_loop_queue(true),
        }
        debug!(%guild_id, %mode, "loop mode changed");
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let Some(player) = self.existing(guild_id).await else {
            return QueueSnapshot::default();
        };
        let player = player.lock().await;
        QueueSnapshot {
            current: player
                .playback_id
                .and_then(|_| player.queue.current().cloned()),
            pending: player.queue.pending().iter().cloned().collect(),
            loop_mode: player.queue.loop_mode(),
            paused: player.paused,
            skip_votes: player.queue.skip_votes(),
            idle: self.timers.is_active(guild_id).await,
        }
    }

    async fn start_idle_timer(&self, guild_id: GuildId) {
        let this = self.clone();
        self.timers
            .start(guild_id, self.settings.idle_timeout, move || async move {
                this.disconnect_if_idle(guild_id).await;
            })
            .await;
    }

    async fn disconnect_if_idle(&self, guild_id: GuildId) {
        if !self.backend.is_connected(guild_id).await || self.backend.is_playing(guild_id).await {
            debug!(%guild_id, "inactivity check passed, staying connected");
            return;
        }

        if let Err(e) = self.backend.disconnect(guild_id).await {
            warn!(%guild_id, "inactivity disconnect failed: {e}");
            return;
        }

        let text_channel = match self.existing(guild_id).await {
            Some(player) => {
                let mut player = player.lock().await;
                player.reset();
                player.text_channel
            }
            None => None,
        };
        info!(%guild_id, "disconnected after inactivity");

        if let Some(channel_id) = text_channel {
            let minutes = self.settings.idle_timeout.as_secs() / 60;
            self.notifier
                .send(
                    channel_id,
                    format!("Disconnected after {minutes} minutes of inactivity."),
                )
                .await;
        }
    }

    async fn notify(&self, player: &GuildPlayer, text: String) {
        if let Some(channel_id) = player.text_channel {
            self.notifier.send(channel_id, text).await;
        }
    }
}

fn playing_track(player: &GuildPlayer) -> Result<Track, MusicError> {
    player
        .playback_id
        .and_then(|_| player.queue.current().cloned())
        .ok_or(MusicError::NothingPlaying)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::track::TrackSource;
    use crate::services::backend::Listener;
    use crate::services::error::BackendError;

    #[derive(Default)]
    struct FakeVoice {
        connected: bool,
        playing: bool,
        played: Vec<(String, u64)>,
        stops: usize,
        disconnects: usize,
        failing: HashSet<String>,
        members: Vec<Listener>,
    }

    #[derive(Default)]
    struct FakeBackend {
        state: StdMutex<FakeVoice>,
    }

    impl FakeBackend {
        fn played(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state.played.iter().map(|(title, _)| title.clone()).collect()
        }

        fn last_playback_id(&self) -> u64 {
            self.state.lock().unwrap().played.last().unwrap().1
        }
    }

    #[async_trait]
    impl VoiceBackend for FakeBackend {
        async fn connect(&self, _: GuildId, _: ChannelId) -> Result<(), BackendError> {
            self.state.lock().unwrap().connected = true;
            Ok(())
        }

        async fn disconnect(&self, _: GuildId) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(BackendError::NotConnected);
            }
            state.connected = false;
            state.playing = false;
            state.disconnects += 1;
            Ok(())
        }

        async fn play(
            &self,
            _: GuildId,
            track: &Track,
            playback_id: u64,
        ) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            if state.failing.contains(&track.title) {
                return Err(BackendError::Playback("unsupported codec".to_string()));
            }
            state.played.push((track.title.clone(), playback_id));
            state.playing = true;
            Ok(())
        }

        async fn stop(&self, _: GuildId) {
            let mut state = self.state.lock().unwrap();
            state.stops += 1;
            state.playing = false;
        }

        async fn pause(&self, _: GuildId) -> Result<(), BackendError> {
            self.state.lock().unwrap().playing = false;
            Ok(())
        }

        async fn resume(&self, _: GuildId) -> Result<(), BackendError> {
            self.state.lock().unwrap().playing = true;
            Ok(())
        }

        async fn is_playing(&self, _: GuildId) -> bool {
            self.state.lock().unwrap().playing
        }

        async fn is_connected(&self, _: GuildId) -> bool {
            self.state.lock().unwrap().connected
        }

        async fn channel_members(&self, _: GuildId) -> Vec<Listener> {
            self.state.lock().unwrap().members.clone()
        }
    }

    /// `list:A,B` resolves to several tracks, `nothing` fails, anything else is
    /// a single track titled after the query.
    struct FakeResolver;

    #[async_trait]
    impl QueryResolver for FakeResolver {
        async fn resolve(&self, query: &str, requester: &str) -> Result<Vec<Track>, MusicError> {
            if query == "nothing" {
                return Err(MusicError::ResolutionFailed(query.to_string()));
            }
            let titles: Vec<&str> = match query.strip_prefix("list:") {
                Some(list) => list.split(',').collect(),
                None => vec![query],
            };
            Ok(titles
                .into_iter()
                .map(|title| {
                    let mut track = Track::new(
                        title,
                        TrackSource::Remote(format!("https://example.com/{title}")),
                    );
                    track.requester = Some(requester.to_string());
                    track
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        sent: StdMutex<Vec<String>>,
    }

    impl FakeNotifier {
        fn contains(&self, needle: &str) -> bool {
            self.sent.lock().unwrap().iter().any(|m| m.contains(needle))
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(&self, _: ChannelId, text: String) {
            self.sent.lock().unwrap().push(text);
        }
    }

    struct Harness {
        service: PlayerService,
        backend: Arc<FakeBackend>,
        notifier: Arc<FakeNotifier>,
    }

    fn harness_with_limit(max_queue_length: usize) -> Harness {
        let backend = Arc::new(FakeBackend::default());
        let notifier = Arc::new(FakeNotifier::default());
        let service = PlayerService::new(
            backend.clone(),
            Arc::new(FakeResolver),
            notifier.clone(),
            PlayerSettings {
                idle_timeout: Duration::from_secs(300),
                max_queue_length,
            },
        );
        Harness {
            service,
            backend,
            notifier,
        }
    }

    fn harness() -> Harness {
        harness_with_limit(100)
    }

    fn gid() -> GuildId {
        GuildId::new(1)
    }

    fn request(query: &str) -> PlayRequest {
        PlayRequest {
            guild_id: gid(),
            voice_channel_id: ChannelId::new(10),
            text_channel_id: ChannelId::new(20),
            requester: "<@5>".to_string(),
            query: query.to_string(),
        }
    }

    fn humans(count: u64) -> Vec<Listener> {
        let mut members: Vec<Listener> = (1..=count)
            .map(|n| Listener {
                id: UserId::new(n),
                is_bot: false,
            })
            .collect();
        members.push(Listener {
            id: UserId::new(999),
            is_bot: true,
        });
        members
    }

    impl Harness {
        async fn finish_current(&self) {
            let id = self.backend.last_playback_id();
            self.service.on_track_finished(gid(), id, None).await;
        }

        async fn pending_titles(&self) -> Vec<String> {
            let snapshot = self.service.snapshot(gid()).await;
            snapshot.pending.into_iter().map(|t| t.title).collect()
        }
    }

    #[tokio::test]
    async fn test_play_starts_first_track_and_queues_rest() {
        let h = harness();

        let outcome = h.service.play(request("list:A,B,C")).await.unwrap();

        assert_eq!(outcome.enqueued.len(), 3);
        assert_eq!(outcome.started.map(|t| t.title).as_deref(), Some("A"));
        assert_eq!(outcome.position, 1);
        assert_eq!(h.backend.played(), ["A"]);
        assert_eq!(h.pending_titles().await, ["B", "C"]);
        assert!(h.backend.state.lock().unwrap().connected);
    }

    #[tokio::test]
    async fn test_play_while_playing_only_enqueues() {
        let h = harness();
        h.service.play(request("A")).await.unwrap();

        let outcome = h.service.play(request("B")).await.unwrap();

        assert!(outcome.started.is_none());
        assert_eq!(outcome.position, 1);
        assert_eq!(h.backend.played(), ["A"]);
        assert_eq!(h.pending_titles().await, ["B"]);
    }

    #[tokio::test]
    async fn test_finish_advances_then_reports_exhaustion() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();

        h.finish_current().await;
        assert_eq!(h.backend.played(), ["A", "B"]);
        assert!(h.notifier.contains("Now playing **B**"));

        h.finish_current().await;
        assert_eq!(h.backend.played(), ["A", "B"]);
        assert!(h.notifier.contains("Queue finished."));
        let snapshot = h.service.snapshot(gid()).await;
        assert!(snapshot.current.is_none());
        assert!(snapshot.idle);
    }

    #[tokio::test]
    async fn test_loop_track_replays_without_announcing() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();
        h.service.set_loop_mode(gid(), LoopMode::Track).await;

        for _ in 0..3 {
            h.finish_current().await;
        }

        assert_eq!(h.backend.played(), ["A", "A", "A", "A"]);
        assert_eq!(h.pending_titles().await, ["B"]);
        assert!(!h.notifier.contains("Now playing"));
    }

    #[tokio::test]
    async fn test_loop_queue_cycles_through_driver() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();
        h.service.set_loop_mode(gid(), LoopMode::Queue).await;

        for _ in 0..3 {
            h.finish_current().await;
        }

        assert_eq!(h.backend.played(), ["A", "B", "A", "B"]);
    }

    #[tokio::test]
    async fn test_stale_finish_event_is_ignored() {
        let h = harness();
        h.service.play(request("list:A,B,C")).await.unwrap();
        let first = h.backend.last_playback_id();

        h.service.on_track_finished(gid(), first, None).await;
        h.service.on_track_finished(gid(), first, None).await;

        assert_eq!(h.backend.played(), ["A", "B"]);
    }

    #[tokio::test]
    async fn test_lone_listener_skips_immediately() {
        let h = harness();
        h.backend.state.lock().unwrap().members = humans(1);
        h.service.play(request("list:A,B")).await.unwrap();

        let outcome = h.service.skip(gid(), UserId::new(1), false).await.unwrap();

        let current = h.service.snapshot(gid()).await.current.unwrap();
        assert_eq!(outcome, SkipOutcome::Skipped(current));
        assert_eq!(h.backend.state.lock().unwrap().stops, 1);

        // Stopping the track reports it finished, which advances the queue.
        h.finish_current().await;
        assert_eq!(h.backend.played(), ["A", "B"]);
    }

    #[tokio::test]
    async fn test_skip_from_outside_the_channel_is_rejected() {
        let h = harness();
        h.backend.state.lock().unwrap().members = humans(1);
        h.service.play(request("list:A,B")).await.unwrap();

        let outsider = h.service.skip(gid(), UserId::new(42), false).await;

        assert!(matches!(outsider, Err(MusicError::NotInVoiceChannel)));
        assert_eq!(h.backend.state.lock().unwrap().stops, 0);
        assert_eq!(h.service.snapshot(gid()).await.skip_votes, 0);
    }

    #[tokio::test]
    async fn test_admin_outside_the_channel_can_skip() {
        let h = harness();
        h.backend.state.lock().unwrap().members = humans(3);
        h.service.play(request("list:A,B")).await.unwrap();

        let outcome = h.service.skip(gid(), UserId::new(42), true).await.unwrap();

        assert!(matches!(outcome, SkipOutcome::Skipped(track) if track.title == "A"));
        assert_eq!(h.backend.state.lock().unwrap().stops, 1);
    }

    #[tokio::test]
    async fn test_skip_votes_need_majority() {
        let h = harness();
        h.backend.state.lock().unwrap().members = humans(5);
        h.service.play(request("list:A,B")).await.unwrap();

        let first = h.service.skip(gid(), UserId::new(1), false).await.unwrap();
        assert_eq!(first, SkipOutcome::Pending { votes: 1, required: 2 });

        let repeat = h.service.skip(gid(), UserId::new(1), false).await.unwrap();
        assert_eq!(repeat, SkipOutcome::Pending { votes: 1, required: 2 });
        assert_eq!(h.backend.state.lock().unwrap().stops, 0);
        assert_eq!(h.service.snapshot(gid()).await.skip_votes, 1);

        let second = h.service.skip(gid(), UserId::new(2), false).await.unwrap();
        assert!(matches!(second, SkipOutcome::Skipped(track) if track.title == "A"));
        assert_eq!(h.backend.state.lock().unwrap().stops, 1);
    }

    #[tokio::test]
    async fn test_admin_skip_overrides_loop_track() {
        let h = harness();
        h.backend.state.lock().unwrap().members = humans(6);
        h.service.play(request("list:A,B")).await.unwrap();
        h.service.set_loop_mode(gid(), LoopMode::Track).await;

        let outcome = h.service.skip(gid(), UserId::new(3), true).await.unwrap();
        assert!(matches!(outcome, SkipOutcome::Skipped(_)));

        h.finish_current().await;
        assert_eq!(h.backend.played(), ["A", "B"]);
    }

    #[tokio::test]
    async fn test_skip_with_nothing_playing() {
        let h = harness();
        let err = h.service.skip(gid(), UserId::new(1), false).await;
        assert!(matches!(err, Err(MusicError::NothingPlaying)));
    }

    #[tokio::test]
    async fn test_resolution_failure_leaves_queue_alone() {
        let h = harness();

        let err = h.service.play(request("nothing")).await;

        assert!(matches!(err, Err(MusicError::ResolutionFailed(_))));
        assert!(h.backend.played().is_empty());
        assert!(h.pending_titles().await.is_empty());
        assert!(!h.backend.state.lock().unwrap().connected);
        assert!(!h.service.timers.is_active(gid()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_in_idle_guild_still_times_out() {
        let h = harness_with_limit(2);

        let err = h.service.play(request("list:A,B,C")).await;

        assert!(matches!(err, Err(MusicError::QueueFull { max: 2 })));
        assert!(h.backend.state.lock().unwrap().connected);
        assert!(h.service.snapshot(gid()).await.idle);

        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(h.backend.state.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_moves_to_next_track() {
        let h = harness();
        h.backend
            .state
            .lock()
            .unwrap()
            .failing
            .insert("B".to_string());

        let outcome = h.service.play(request("list:B,C")).await.unwrap();

        assert_eq!(outcome.started.map(|t| t.title).as_deref(), Some("C"));
        assert_eq!(h.backend.played(), ["C"]);
        assert!(h.notifier.contains("Couldn't play **B**"));
    }

    #[tokio::test]
    async fn test_every_track_failing_under_loop_queue_terminates() {
        let h = harness();
        {
            let mut state = h.backend.state.lock().unwrap();
            state.failing.insert("A".to_string());
            state.failing.insert("B".to_string());
        }
        h.service.set_loop_mode(gid(), LoopMode::Queue).await;

        let outcome = h.service.play(request("list:A,B")).await.unwrap();

        assert!(outcome.started.is_none());
        assert!(h.pending_titles().await.is_empty());
        assert!(h.notifier.contains("Queue finished."));
    }

    #[tokio::test]
    async fn test_playback_error_event_advances_despite_loop_track() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();
        h.service.set_loop_mode(gid(), LoopMode::Track).await;

        let id = h.backend.last_playback_id();
        h.service
            .on_track_finished(gid(), id, Some("decoder error".to_string()))
            .await;

        assert_eq!(h.backend.played(), ["A", "B"]);
        assert!(h.notifier.contains("decoder error"));
    }

    #[tokio::test]
    async fn test_stop_clears_queue_and_ignores_late_finish() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();
        h.service.set_loop_mode(gid(), LoopMode::Queue).await;

        h.service.stop(gid()).await.unwrap();
        h.finish_current().await;

        let snapshot = h.service.snapshot(gid()).await;
        assert!(snapshot.current.is_none());
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.loop_mode, LoopMode::Queue);
        assert_eq!(h.backend.played(), ["A"]);
        assert!(h.service.timers.is_active(gid()).await);
    }

    #[tokio::test]
    async fn test_stop_requires_connection() {
        let h = harness();
        assert!(matches!(
            h.service.stop(gid()).await,
            Err(MusicError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_leave_disconnects_and_cancels_timer() {
        let h = harness();
        h.service.play(request("A")).await.unwrap();
        h.finish_current().await;
        assert!(h.service.timers.is_active(gid()).await);

        h.service.leave(gid()).await.unwrap();

        assert!(!h.service.timers.is_active(gid()).await);
        assert_eq!(h.backend.state.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_queue_limit() {
        let h = harness_with_limit(2);

        let err = h.service.play(request("list:A,B,C")).await;

        assert!(matches!(err, Err(MusicError::QueueFull { max: 2 })));
        assert!(h.backend.played().is_empty());
    }

    #[tokio::test]
    async fn test_remove_out_of_range() {
        let h = harness();
        h.service.play(request("list:A,B,C")).await.unwrap();

        let err = h.service.remove(gid(), 3).await;
        assert!(matches!(
            err,
            Err(MusicError::IndexOutOfRange { index: 3, len: 2 })
        ));
        assert_eq!(h.pending_titles().await, ["B", "C"]);

        let removed = h.service.remove(gid(), 1).await.unwrap();
        assert_eq!(removed.title, "B");
        assert_eq!(h.pending_titles().await, ["C"]);
    }

    #[tokio::test]
    async fn test_toggle_pause() {
        let h = harness();
        assert!(matches!(
            h.service.toggle_pause(gid()).await,
            Err(MusicError::NothingPlaying)
        ));

        h.service.play(request("A")).await.unwrap();

        assert!(h.service.toggle_pause(gid()).await.unwrap());
        assert!(h.service.snapshot(gid()).await.paused);
        assert!(!h.backend.state.lock().unwrap().playing);

        assert!(!h.service.toggle_pause(gid()).await.unwrap());
        assert!(h.backend.state.lock().unwrap().playing);
    }

    #[tokio::test]
    async fn test_events_are_processed_by_run_loop() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let runner = tokio::spawn(h.service.clone().run(rx));

        tx.send(PlayerEvent::TrackFinished {
            guild_id: gid(),
            playback_id: h.backend.last_playback_id(),
            error: None,
        })
        .unwrap();
        drop(tx);
        runner.await.unwrap();

        assert_eq!(h.backend.played(), ["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_guild_is_disconnected() {
        let h = harness();
        h.service.play(request("A")).await.unwrap();
        h.finish_current().await;
        h.backend.state.lock().unwrap().playing = false;

        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(h.backend.state.lock().unwrap().disconnects, 1);
        assert!(h.notifier.contains("Disconnected after 5 minutes of inactivity."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_resumed_before_timer_keeps_connection() {
        let h = harness();
        h.service.play(request("A")).await.unwrap();
        h.finish_current().await;
        h.backend.state.lock().unwrap().playing = false;

        tokio::time::sleep(Duration::from_secs(60)).await;
        h.service.play(request("B")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(h.backend.state.lock().unwrap().disconnects, 0);
        assert_eq!(h.backend.played(), ["A", "B"]);
    }

    #[tokio::test]
    async fn test_guilds_do_not_share_queues() {
        let h = harness();
        h.service.play(request("list:A,B")).await.unwrap();

        let other = GuildId::new(2);
        assert_eq!(h.service.shuffle(other).await, 0);
        h.service.set_loop_mode(other, LoopMode::Track).await;

        assert_eq!(h.service.snapshot(other).await.pending.len(), 0);
        assert_eq!(h.service.snapshot(gid()).await.loop_mode, LoopMode::Off);
        assert_eq!(h.pending_titles().await, ["B"]);
    }

    #[tokio::test]
    async fn test_loop_off_clears_either_mode() {
        let h = harness();

        h.service.set_loop_mode(gid(), LoopMode::Track).await;
        h.service.set_loop_mode(gid(), LoopMode::Queue).await;
        assert_eq!(h.service.snapshot(gid()).await.loop_mode, LoopMode::Queue);

        h.service.set_loop_mode(gid(), LoopMode::Off).await;
        assert_eq!(h.service.snapshot(gid()).await.loop_mode, LoopMode::Off);
    }
}
