use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{Phase, PlaybackState, QueueFull, QueueStatus},
        registry::GuildStateRegistry,
        track::Track,
        voice::{
            CompletionHandle, ConnectionError, PlaybackError, PlaybackEvent, TrackOutcome,
            VoiceGateway, VoiceSession,
        },
    },
    presence::PresenceAggregator,
    sources::{ResolutionError, TrackResolver},
    stats::StatsAccumulator,
};

/// Avisos para el canal de texto del último pedido
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying(Track),
    QueueEmpty,
}

/// Entrega avisos al canal de texto. Fire-and-forget.
pub trait Announcer: Send + Sync {
    fn announce(&self, guild_id: GuildId, channel_id: ChannelId, notice: Notice);
}

/// Pedido de reproducción que llega desde la capa de comandos
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub text_channel: ChannelId,
    pub voice_channel: Option<ChannelId>,
    pub requested_by: UserId,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The guild was idle; `track` started right away and `queued` more wait behind it.
    NowPlaying { track: Track, queued: usize },
    /// Something was already playing.
    Queued {
        first: Track,
        added: usize,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    Skipped(Option<Track>),
    NothingPlaying,
}

#[derive(Debug, Error)]
pub enum PlayError {
    #[error("requester is not in a voice channel")]
    NotInVoiceChannel,
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("queue is full ({max_size} tracks)")]
    QueueFull { max_size: usize },
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl From<QueueFull> for PlayError {
    fn from(full: QueueFull) -> Self {
        PlayError::QueueFull {
            max_size: full.max_size,
        }
    }
}

enum Advance {
    Started(Track),
    Drained(Option<PlaybackError>),
}

/// Máquina de estados Idle / Playing / CountdownToDisconnect por guild.
///
/// Every mutation of a guild happens while holding that guild's lock, and
/// completions from the voice transport only reach the state through the
/// event channel drained by [`run`](Self::run).
pub struct PlaybackOrchestrator {
    registry: Arc<GuildStateRegistry>,
    resolver: Arc<dyn TrackResolver>,
    voice: Arc<dyn VoiceGateway>,
    presence: Arc<PresenceAggregator>,
    stats: Arc<StatsAccumulator>,
    announcer: Arc<dyn Announcer>,
    disconnect_grace: Duration,
    events_tx: flume::Sender<PlaybackEvent>,
    events_rx: flume::Receiver<PlaybackEvent>,
}

impl PlaybackOrchestrator {
    pub fn new(
        registry: Arc<GuildStateRegistry>,
        resolver: Arc<dyn TrackResolver>,
        voice: Arc<dyn VoiceGateway>,
        presence: Arc<PresenceAggregator>,
        stats: Arc<StatsAccumulator>,
        announcer: Arc<dyn Announcer>,
        disconnect_grace: Duration,
    ) -> Self {
        let (events_tx, events_rx) = flume::unbounded();

        Self {
            registry,
            resolver,
            voice,
            presence,
            stats,
            announcer,
            disconnect_grace,
            events_tx,
            events_rx,
        }
    }

    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    /// Consume eventos de finalización y de cuenta regresiva hasta el apagado.
    pub async fn run(self: Arc<Self>) {
        info!("🔁 Bucle de eventos de reproducción iniciado");

        while let Ok(event) = self.events_rx.recv_async().await {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackEnded {
                guild_id,
                generation,
                outcome,
            } => {
                self.on_track_completed(guild_id, generation, outcome).await;
            }
            PlaybackEvent::CountdownExpired {
                guild_id,
                generation,
            } => {
                self.on_countdown_expired(guild_id, generation).await;
            }
        }
    }

    /// Resuelve la consulta y la agrega a la cola del guild.
    ///
    /// Resolution and connection failures leave the guild untouched.
    pub async fn enqueue(&self, request: PlayRequest) -> Result<EnqueueOutcome, PlayError> {
        let guild_id = request.guild_id;
        let voice_channel = request.voice_channel.ok_or(PlayError::NotInVoiceChannel)?;

        let tracks = self
            .resolver
            .resolve(&request.query)
            .await?
            .requested_by(request.requested_by)
            .into_tracks();
        let Some(first) = tracks.first().cloned() else {
            return Err(ResolutionError::NotFound(request.query).into());
        };

        let handle = self.registry.get_or_create(guild_id);
        let mut state = handle.lock().await;

        if state.remaining_capacity() == 0 {
            return Err(QueueFull {
                max_size: state.max_size(),
            }
            .into());
        }

        self.ensure_connected(&mut state, voice_channel).await?;

        state.set_announce_channel(request.text_channel);
        let (added, position) = state.push_tracks(tracks)?;

        if state.phase() == Phase::Playing {
            info!("📝 [{}] {} agregado(s) a la cola en posición {}", guild_id, added, position);
            return Ok(EnqueueOutcome::Queued {
                first,
                added,
                position,
            });
        }

        state.cancel_countdown();

        match self.start_next(&mut state).await {
            Advance::Started(track) => Ok(EnqueueOutcome::NowPlaying {
                track,
                queued: state.queue_len(),
            }),
            Advance::Drained(last_error) => {
                self.arm_countdown(&mut state);
                Err(last_error
                    .unwrap_or_else(|| PlaybackError("nothing could be played".into()))
                    .into())
            }
        }
    }

    /// Leaves a connected session on the guild, joining `channel_id` if needed.
    async fn ensure_connected(
        &self,
        state: &mut PlaybackState,
        channel_id: ChannelId,
    ) -> Result<(), ConnectionError> {
        if let Some(session) = state.voice() {
            if session.is_connected().await {
                return Ok(());
            }

            warn!("🔌 [{}] Sesión de voz perdida, reconectando", state.guild_id());
            if state.phase() == Phase::Playing {
                state.interrupt();
                self.registry.sync_index(state);
                self.presence.recompute();
            }
        }

        let session = self.voice.connect(state.guild_id(), channel_id).await?;
        info!("🔊 [{}] Conectado al canal de voz {}", state.guild_id(), channel_id);
        state.set_voice(session);
        Ok(())
    }

    /// Arranca la cabeza de la cola. Tracks the transport refuses are skipped
    /// the same way a mid-track failure is.
    async fn start_next(&self, state: &mut PlaybackState) -> Advance {
        let Some(session) = state.voice() else {
            warn!("🔇 [{}] Sin sesión de voz, no se puede reproducir", state.guild_id());
            return Advance::Drained(None);
        };

        let mut last_error = None;
        while let Some((track, generation)) = state.take_next() {
            let completion =
                CompletionHandle::new(state.guild_id(), generation, self.events_tx.clone());

            match session.play(&track, completion).await {
                Ok(()) => {
                    state.confirm_playing(track.clone());
                    self.on_playing(state, &track);
                    return Advance::Started(track);
                }
                Err(e) => {
                    error!("❌ [{}] No se pudo iniciar {}: {}", state.guild_id(), track.title(), e);
                    last_error = Some(e);
                }
            }
        }

        Advance::Drained(last_error)
    }

    fn on_playing(&self, state: &PlaybackState, track: &Track) {
        info!(
            "🎵 [{}] Reproduciendo (gen {}, {}): {}",
            state.guild_id(),
            state.generation(),
            track.origin().as_str(),
            track.title()
        );

        self.registry.sync_index(state);
        self.stats.record_play(track);
        self.presence.recompute();

        if let Some(channel_id) = state.announce_channel() {
            self.announcer
                .announce(state.guild_id(), channel_id, Notice::NowPlaying(track.clone()));
        }
    }

    fn arm_countdown(&self, state: &mut PlaybackState) {
        let generation = state.enter_countdown();
        self.registry.sync_index(state);
        self.presence.recompute();

        info!(
            "⏳ [{}] Cola vacía, desconexión en {:?}",
            state.guild_id(),
            self.disconnect_grace
        );

        if let Some(channel_id) = state.announce_channel() {
            self.announcer
                .announce(state.guild_id(), channel_id, Notice::QueueEmpty);
        }

        let events = self.events_tx.clone();
        let guild_id = state.guild_id();
        let deadline = tokio::time::Instant::now() + self.disconnect_grace;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = events.send(PlaybackEvent::CountdownExpired {
                guild_id,
                generation,
            });
        });
    }

    /// El track actual terminó o falló. Returns whether the event was applied.
    pub async fn on_track_completed(
        &self,
        guild_id: GuildId,
        generation: u64,
        outcome: TrackOutcome,
    ) -> bool {
        let handle = self.registry.get_or_create(guild_id);
        let mut state = handle.lock().await;

        if state.phase() != Phase::Playing || state.generation() != generation {
            debug!(
                "🗑️ [{}] Notificación obsoleta (gen {} / actual {}, {})",
                guild_id,
                generation,
                state.generation(),
                state.phase().as_str()
            );
            return false;
        }

        if let TrackOutcome::Errored(reason) = &outcome {
            warn!("⚠️ [{}] Error durante la reproducción, avanzando: {}", guild_id, reason);
        }

        match self.start_next(&mut state).await {
            Advance::Started(_) => {}
            Advance::Drained(_) => self.arm_countdown(&mut state),
        }
        true
    }

    /// Returns whether the countdown was still live and the guild was disconnected.
    async fn on_countdown_expired(&self, guild_id: GuildId, generation: u64) -> bool {
        let handle = self.registry.get_or_create(guild_id);
        let mut state = handle.lock().await;

        if !state.countdown_still_due(generation) {
            debug!("⏳ [{}] Cuenta regresiva superada, se ignora", guild_id);
            return false;
        }

        let session = state.reset();
        self.registry.sync_index(&state);
        self.presence.recompute();

        if let Some(session) = session {
            session.disconnect().await;
        }
        info!("👋 [{}] Desconectado por inactividad", guild_id);
        true
    }

    /// Salta el track actual. Advancement goes through the completion path.
    pub async fn skip(&self, guild_id: GuildId) -> SkipOutcome {
        let handle = self.registry.get_or_create(guild_id);
        let state = handle.lock().await;

        if state.phase() != Phase::Playing {
            return SkipOutcome::NothingPlaying;
        }

        let current = state.current().cloned();
        if let Some(session) = state.voice() {
            if !session.is_playing().await {
                debug!("⏭️ [{}] El transporte ya no reproducía", guild_id);
            }
            session.stop().await;
        }

        // El transporte también avisará; el duplicado se descarta por generación
        let _ = self.events_tx.send(PlaybackEvent::TrackEnded {
            guild_id,
            generation: state.generation(),
            outcome: TrackOutcome::Finished,
        });

        info!("⏭️ [{}] Track saltado", guild_id);
        SkipOutcome::Skipped(current)
    }

    /// Limpia la cola, cancela la cuenta regresiva y desconecta.
    pub async fn stop(&self, guild_id: GuildId) {
        let handle = self.registry.get_or_create(guild_id);
        let mut state = handle.lock().await;

        let session = state.reset();
        self.registry.sync_index(&state);
        self.presence.recompute();

        if let Some(session) = session {
            session.stop().await;
            session.disconnect().await;
        }
        info!("⏹️ [{}] Reproducción detenida", guild_id);
    }

    /// The transport reports the bot was removed from voice by someone else.
    pub async fn voice_lost(&self, guild_id: GuildId) {
        let handle = self.registry.get_or_create(guild_id);
        let mut state = handle.lock().await;

        if state.voice().is_none() && state.phase() == Phase::Idle {
            return;
        }

        let _ = state.reset();
        self.registry.sync_index(&state);
        self.presence.recompute();
        info!("🔌 [{}] Sesión de voz cerrada externamente", guild_id);
    }

    pub async fn queue_status(&self, guild_id: GuildId) -> QueueStatus {
        let handle = self.registry.get_or_create(guild_id);
        let state = handle.lock().await;
        state.status()
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        let handle = self.registry.get_or_create(guild_id);
        let state = handle.lock().await;
        state.current().cloned()
    }

    #[cfg(test)]
    async fn drain_events(&self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event).await;
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::track::{Resolved, TrackOrigin},
        presence::{Presence, PresencePublisher},
        sources::MockTrackResolver,
        storage::JsonStorage,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const GUILD: GuildId = GuildId::new(100);
    const GRACE: Duration = Duration::from_secs(3);

    #[derive(Default)]
    struct FakeSession {
        connected: AtomicBool,
        played: Mutex<Vec<String>>,
        completions: Mutex<Vec<CompletionHandle>>,
        refuse: Mutex<Vec<String>>,
        stops: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl FakeSession {
        fn played(&self) -> Vec<String> {
            self.played.lock().clone()
        }

        fn last_completion(&self) -> CompletionHandle {
            self.completions.lock().last().cloned().expect("nothing was played")
        }

        fn finish_current(&self, outcome: TrackOutcome) {
            self.last_completion().complete(outcome);
        }
    }

    #[async_trait]
    impl VoiceSession for FakeSession {
        async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), PlaybackError> {
            if self.refuse.lock().iter().any(|t| t == track.title()) {
                return Err(PlaybackError(format!("refused {}", track.title())));
            }
            self.played.lock().push(track.title().to_string());
            self.completions.lock().push(on_complete);
            Ok(())
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        async fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn is_playing(&self) -> bool {
            !self.completions.lock().is_empty()
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        session: Arc<FakeSession>,
        connects: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl VoiceGateway for FakeGateway {
        async fn connect(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Arc<dyn VoiceSession>, ConnectionError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ConnectionError("missing permissions".into()));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.session.connected.store(true, Ordering::SeqCst);
            Ok(self.session.clone())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher(Mutex<Vec<Presence>>);

    impl PresencePublisher for RecordingPublisher {
        fn set_presence(&self, presence: &Presence) -> anyhow::Result<()> {
            self.0.lock().push(presence.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAnnouncer(Mutex<Vec<Notice>>);

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, _guild_id: GuildId, _channel_id: ChannelId, notice: Notice) {
            self.0.lock().push(notice);
        }
    }

    struct Harness {
        orchestrator: PlaybackOrchestrator,
        gateway: Arc<FakeGateway>,
        publisher: Arc<RecordingPublisher>,
        announcer: Arc<RecordingAnnouncer>,
        registry: Arc<GuildStateRegistry>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn session(&self) -> &FakeSession {
            &self.gateway.session
        }

        async fn phase(&self) -> Phase {
            self.registry.get_or_create(GUILD).lock().await.phase()
        }

        /// Estado coherente tras cada transición
        async fn assert_invariants(&self) {
            let handle = self.registry.get_or_create(GUILD);
            let state = handle.lock().await;
            match state.phase() {
                Phase::Playing => {
                    assert!(state.current().is_some());
                    assert!(!state.countdown_active());
                    assert!(self.session().is_connected().await);
                }
                Phase::CountdownToDisconnect => {
                    assert!(state.current().is_none());
                    assert!(state.is_queue_empty());
                    assert!(state.countdown_active());
                }
                Phase::Idle => assert!(!state.countdown_active()),
            }
        }
    }

    fn track_for(query: &str) -> Track {
        Track::new(
            query.to_string(),
            format!("https://www.youtube.com/watch?v={query}"),
            TrackOrigin::Search,
        )
        .with_duration(Duration::from_secs(125))
    }

    fn echo_resolver() -> MockTrackResolver {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|query| {
            if query == "missing" {
                return Err(ResolutionError::NotFound(query.to_string()));
            }
            if let Some(rest) = query.strip_prefix("playlist:") {
                let tracks = rest.split(',').map(track_for).collect();
                return Ok(Resolved::Playlist { title: None, tracks });
            }
            Ok(Resolved::Single(track_for(query)))
        });
        resolver
    }

    async fn harness() -> Harness {
        harness_with(10).await
    }

    async fn harness_with(max_queue: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        let stats = Arc::new(StatsAccumulator::load(storage).await);
        let registry = Arc::new(GuildStateRegistry::new(max_queue));
        let publisher = Arc::new(RecordingPublisher::default());
        let presence = Arc::new(PresenceAggregator::new(registry.clone(), publisher.clone(), "/play"));
        let gateway = Arc::new(FakeGateway::default());
        let announcer = Arc::new(RecordingAnnouncer::default());

        let orchestrator = PlaybackOrchestrator::new(
            registry.clone(),
            Arc::new(echo_resolver()),
            gateway.clone(),
            presence,
            stats,
            announcer.clone(),
            GRACE,
        );

        Harness {
            orchestrator,
            gateway,
            publisher,
            announcer,
            registry,
            _dir: dir,
        }
    }

    fn request(query: &str) -> PlayRequest {
        PlayRequest {
            guild_id: GUILD,
            text_channel: ChannelId::new(1),
            voice_channel: Some(ChannelId::new(2)),
            requested_by: UserId::new(3),
            query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn test_idle_enqueue_starts_playing() {
        let h = harness().await;

        let outcome = h.orchestrator.enqueue(request("intro")).await.unwrap();

        assert!(matches!(outcome, EnqueueOutcome::NowPlaying { ref track, queued: 0 } if track.title() == "intro"));
        assert_eq!(h.phase().await, Phase::Playing);
        assert_eq!(h.session().played(), vec!["intro"]);
        assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.stats().snapshot().total_tracks, 1);
        assert_eq!(h.orchestrator.stats().snapshot().total_seconds, 125.0);
        assert_eq!(h.publisher.0.lock().last().unwrap().text, "intro");
        assert_eq!(
            h.announcer.0.lock().clone(),
            vec![Notice::NowPlaying(track_for("intro").with_requested_by(UserId::new(3)))]
        );
        h.assert_invariants().await;
    }

    #[tokio::test]
    async fn test_fifo_order_after_current_track() {
        let h = harness().await;
        h.orchestrator.enqueue(request("D")).await.unwrap();

        for (query, expected_position) in [("A", 1), ("B", 2), ("C", 3)] {
            let outcome = h.orchestrator.enqueue(request(query)).await.unwrap();
            assert!(matches!(
                outcome,
                EnqueueOutcome::Queued { added: 1, position, .. } if position == expected_position
            ));
        }
        h.assert_invariants().await;

        for _ in 0..3 {
            h.session().finish_current(TrackOutcome::Finished);
            assert_eq!(h.orchestrator.drain_events().await, 1);
            h.assert_invariants().await;
        }

        assert_eq!(h.session().played(), vec!["D", "A", "B", "C"]);
        assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_completion_applies_once() {
        let h = harness().await;
        h.orchestrator.enqueue(request("one")).await.unwrap();
        h.orchestrator.enqueue(request("two")).await.unwrap();
        h.orchestrator.enqueue(request("three")).await.unwrap();

        let completion = h.session().last_completion();
        completion.complete(TrackOutcome::Finished);
        completion.complete(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;

        assert_eq!(h.session().played(), vec!["one", "two"]);
        let status = h.orchestrator.queue_status(GUILD).await;
        assert_eq!(status.upcoming.len(), 1);
        assert_eq!(status.current.unwrap().title(), "two");
    }

    #[tokio::test]
    async fn test_mid_track_error_advances_queue() {
        let h = harness().await;
        h.orchestrator.enqueue(request("broken")).await.unwrap();
        h.orchestrator.enqueue(request("next")).await.unwrap();

        h.session()
            .finish_current(TrackOutcome::Errored("decoder hiccup".into()));
        h.orchestrator.drain_events().await;

        assert_eq!(h.phase().await, Phase::Playing);
        assert_eq!(h.session().played(), vec!["broken", "next"]);
    }

    #[tokio::test]
    async fn test_refused_track_is_skipped_at_start() {
        let h = harness().await;
        h.session().refuse.lock().push("bad".into());

        let outcome = h
            .orchestrator
            .enqueue(request("playlist:bad,good"))
            .await
            .unwrap();

        assert!(matches!(outcome, EnqueueOutcome::NowPlaying { ref track, .. } if track.title() == "good"));
        assert_eq!(h.orchestrator.stats().snapshot().total_tracks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_expiry_disconnects() {
        let h = harness().await;
        h.orchestrator.enqueue(request("last")).await.unwrap();

        h.session().finish_current(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;
        assert_eq!(h.phase().await, Phase::CountdownToDisconnect);
        assert_eq!(h.announcer.0.lock().last(), Some(&Notice::QueueEmpty));
        assert_eq!(h.publisher.0.lock().last().unwrap().text, "/play");
        h.assert_invariants().await;

        tokio::time::sleep(GRACE + Duration::from_millis(50)).await;
        assert_eq!(h.orchestrator.drain_events().await, 1);

        assert_eq!(h.phase().await, Phase::Idle);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 1);
        assert!(!h.session().is_connected().await);
        h.assert_invariants().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_countdown_supersedes_it() {
        let h = harness().await;
        h.orchestrator.enqueue(request("first")).await.unwrap();
        h.session().finish_current(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;
        assert_eq!(h.phase().await, Phase::CountdownToDisconnect);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let outcome = h.orchestrator.enqueue(request("second")).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::NowPlaying { .. }));

        tokio::time::sleep(GRACE).await;
        h.orchestrator.drain_events().await;

        assert_eq!(h.phase().await, Phase::Playing);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 0);
        assert!(h.session().is_connected().await);
        assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 1);
        h.assert_invariants().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_countdown_does_not_cut_a_newer_one_short() {
        let h = harness().await;
        h.orchestrator.enqueue(request("a")).await.unwrap();
        h.session().finish_current(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;

        // Vuelve a sonar y a vaciarse antes de que venza la primera cuenta
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.orchestrator.enqueue(request("b")).await.unwrap();
        h.session().finish_current(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.orchestrator.drain_events().await;
        assert_eq!(h.phase().await, Phase::CountdownToDisconnect);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 0);

        tokio::time::sleep(GRACE).await;
        h.orchestrator.drain_events().await;
        assert_eq!(h.phase().await, Phase::Idle);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skip_while_idle_reports_nothing_playing() {
        let h = harness().await;

        assert_eq!(h.orchestrator.skip(GUILD).await, SkipOutcome::NothingPlaying);
        assert_eq!(h.orchestrator.drain_events().await, 0);
        assert_eq!(h.phase().await, Phase::Idle);
    }

    #[tokio::test]
    async fn test_skip_routes_through_completion() {
        let h = harness().await;
        h.orchestrator.enqueue(request("long")).await.unwrap();
        h.orchestrator.enqueue(request("short")).await.unwrap();

        let outcome = h.orchestrator.skip(GUILD).await;
        assert!(matches!(outcome, SkipOutcome::Skipped(Some(ref t)) if t.title() == "long"));
        assert_eq!(h.session().stops.load(Ordering::SeqCst), 1);

        // El transporte también reporta el fin del track detenido
        h.session().completions.lock()[0].complete(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;

        assert_eq!(h.session().played(), vec!["long", "short"]);
        h.assert_invariants().await;
    }

    #[tokio::test]
    async fn test_stop_resets_and_disconnects() {
        let h = harness().await;
        h.orchestrator.enqueue(request("x")).await.unwrap();
        h.orchestrator.enqueue(request("y")).await.unwrap();
        let completion = h.session().last_completion();

        h.orchestrator.stop(GUILD).await;

        assert_eq!(h.phase().await, Phase::Idle);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 1);
        let status = h.orchestrator.queue_status(GUILD).await;
        assert!(status.current.is_none());
        assert!(status.upcoming.is_empty());

        // La notificación tardía del track detenido no revive nada
        completion.complete(TrackOutcome::Finished);
        h.orchestrator.drain_events().await;
        assert_eq!(h.phase().await, Phase::Idle);
        assert_eq!(h.session().played(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_resolution_failure_leaves_state_untouched() {
        let h = harness().await;

        let err = h.orchestrator.enqueue(request("missing")).await.unwrap_err();

        assert!(matches!(err, PlayError::Resolution(ResolutionError::NotFound(_))));
        assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 0);
        assert_eq!(h.phase().await, Phase::Idle);
    }

    #[tokio::test]
    async fn test_connection_failure_leaves_state_untouched() {
        let h = harness().await;
        h.gateway.failing.store(true, Ordering::SeqCst);

        let err = h.orchestrator.enqueue(request("song")).await.unwrap_err();

        assert!(matches!(err, PlayError::Connection(_)));
        let status = h.orchestrator.queue_status(GUILD).await;
        assert!(status.upcoming.is_empty());
        assert_eq!(status.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_requester_outside_voice_is_rejected() {
        let h = harness().await;
        let mut req = request("song");
        req.voice_channel = None;

        assert!(matches!(
            h.orchestrator.enqueue(req).await,
            Err(PlayError::NotInVoiceChannel)
        ));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_playlist_is_truncated() {
        let h = harness_with(2).await;
        h.orchestrator.enqueue(request("now")).await.unwrap();

        let outcome = h
            .orchestrator
            .enqueue(request("playlist:a,b,c"))
            .await
            .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Queued { added: 2, position: 1, .. }));

        let err = h.orchestrator.enqueue(request("more")).await.unwrap_err();
        assert!(matches!(err, PlayError::QueueFull { max_size: 2 }));
    }

    #[tokio::test]
    async fn test_voice_lost_resets_guild() {
        let h = harness().await;
        h.orchestrator.enqueue(request("song")).await.unwrap();
        h.orchestrator.enqueue(request("queued")).await.unwrap();

        h.orchestrator.voice_lost(GUILD).await;

        assert_eq!(h.phase().await, Phase::Idle);
        assert_eq!(h.registry.count_playing(), 0);
        assert_eq!(h.session().disconnects.load(Ordering::SeqCst), 0);
        assert!(h.orchestrator.now_playing(GUILD).await.is_none());
    }

    #[tokio::test]
    async fn test_reconnects_when_session_dropped_while_playing() {
        let h = harness().await;
        h.orchestrator.enqueue(request("first")).await.unwrap();
        h.session().connected.store(false, Ordering::SeqCst);

        let outcome = h.orchestrator.enqueue(request("second")).await.unwrap();

        assert!(matches!(outcome, EnqueueOutcome::NowPlaying { ref track, .. } if track.title() == "second"));
        assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 2);
        h.assert_invariants().await;
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let h = harness().await;
        h.orchestrator.enqueue(request("here")).await.unwrap();

        let mut other = request("there");
        other.guild_id = GuildId::new(200);
        h.orchestrator.enqueue(other).await.unwrap();

        assert_eq!(h.registry.count_playing(), 2);
        assert_eq!(h.publisher.0.lock().last().unwrap().text, "music in 2 communities");

        h.orchestrator.stop(GuildId::new(200)).await;
        assert_eq!(h.phase().await, Phase::Playing);
        assert_eq!(h.publisher.0.lock().last().unwrap().text, "here");
    }
}
