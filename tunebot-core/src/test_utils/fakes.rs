// File: tunebot-core/src/test_utils/fakes.rs
//
// In-memory stand-ins for the Discord, YouTube and voice collaborators.
// Each one records what it was asked to do so tests can assert on it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use twilight_model::id::Id;

use tunebot_common::models::{
    Candidate, ChannelId, CommandOrigin, GuildId, MessageRef, PresentationHandle, ResultSet, TrackSignal, UserId,
};
use tunebot_common::traits::{
    MediaSource, Notifier, Search, StreamSource, TrackControl, VoiceChannelLookup, VoiceConnection, VoiceTransport,
};

use crate::Error;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct FakeSearch {
    response: Mutex<Result<Vec<Candidate>, String>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<(String, usize)>>,
}

impl FakeSearch {
    pub fn returning(candidates: Vec<Candidate>) -> Self {
        Self {
            response: Mutex::new(Ok(candidates)),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let search = Self::returning(Vec::new());
        *lock(&search.response) = Err(reason.to_string());
        search
    }

    pub fn set_results(&self, candidates: Vec<Candidate>) {
        *lock(&self.response) = Ok(candidates);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every (query, limit) pair seen so far.
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl Search for FakeSearch {
    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.queries).push((query.to_string(), limit));
        lock(&self.response)
            .clone()
            .map_err(Error::SearchUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Records presentations and notices. Presented messages get fresh ids
/// starting at 9000 so they never collide with command message ids.
pub struct RecordingNotifier {
    presented: Mutex<Vec<(CommandOrigin, PresentationHandle, ResultSet)>>,
    notices: Mutex<Vec<(MessageRef, String)>>,
    cleared: Mutex<Vec<MessageRef>>,
    next_message: AtomicU64,
    fail_present: AtomicBool,
    notices_open: watch::Sender<bool>,
    presented_count: watch::Sender<usize>,
    notice_count: watch::Sender<usize>,
    cleared_count: watch::Sender<usize>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            presented: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            next_message: AtomicU64::new(9000),
            fail_present: AtomicBool::new(false),
            notices_open: watch::Sender::new(true),
            presented_count: watch::Sender::new(0),
            notice_count: watch::Sender::new(0),
            cleared_count: watch::Sender::new(0),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_presentations(&self, fail: bool) {
        self.fail_present.store(fail, Ordering::SeqCst);
    }

    /// Makes `notify` park until `release_notices`, like a slow REST call.
    pub fn hold_notices(&self) {
        self.notices_open.send_replace(false);
    }

    pub fn release_notices(&self) {
        self.notices_open.send_replace(true);
    }

    pub fn presentations(&self) -> Vec<PresentationHandle> {
        lock(&self.presented).iter().map(|(_, p, _)| p.clone()).collect()
    }

    pub fn presented_sets(&self) -> Vec<ResultSet> {
        lock(&self.presented).iter().map(|(_, _, r)| r.clone()).collect()
    }

    pub fn notices(&self) -> Vec<(MessageRef, String)> {
        lock(&self.notices).clone()
    }

    pub fn notice_texts(&self) -> Vec<String> {
        lock(&self.notices).iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn cleared(&self) -> Vec<MessageRef> {
        lock(&self.cleared).clone()
    }

    /// Waits until at least `n` presentations happened and returns the nth.
    pub async fn wait_for_presentation(&self, n: usize) -> PresentationHandle {
        let mut rx = self.presented_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
        lock(&self.presented)[n - 1].1.clone()
    }

    pub async fn wait_for_notices(&self, n: usize) -> Vec<String> {
        let mut rx = self.notice_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
        self.notice_texts()
    }

    pub async fn wait_for_clears(&self, n: usize) {
        let mut rx = self.cleared_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn present_choices(&self, origin: &CommandOrigin, results: &ResultSet) -> Result<PresentationHandle, Error> {
        if self.fail_present.load(Ordering::SeqCst) {
            return Err(Error::Platform("embed rejected".into()));
        }
        let presentation = PresentationHandle {
            message: MessageRef {
                channel_id: origin.message.channel_id,
                message_id: Id::new(self.next_message.fetch_add(1, Ordering::SeqCst)),
            },
            tokens: results.tokens(),
        };
        lock(&self.presented).push((origin.clone(), presentation.clone(), results.clone()));
        self.presented_count.send_modify(|count| *count += 1);
        Ok(presentation)
    }

    async fn notify(&self, target: &MessageRef, text: &str) -> Result<(), Error> {
        let mut open = self.notices_open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        lock(&self.notices).push((*target, text.to_string()));
        self.notice_count.send_modify(|count| *count += 1);
        Ok(())
    }

    async fn clear_choices(&self, presentation: &PresentationHandle) -> Result<(), Error> {
        lock(&self.cleared).push(presentation.message);
        self.cleared_count.send_modify(|count| *count += 1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Hands out streams whose payload is the media id itself.
#[derive(Default)]
pub struct FakeMedia {
    unavailable: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unavailable(&self, media_id: &str) {
        lock(&self.unavailable).insert(media_id.to_string());
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn open_audio_stream(&self, candidate_id: &str) -> Result<StreamSource, Error> {
        if lock(&self.unavailable).contains(candidate_id) {
            return Err(Error::MediaUnavailable(format!("{candidate_id} is private")));
        }
        lock(&self.opened).push(candidate_id.to_string());
        Ok(StreamSource::new(candidate_id, candidate_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

/// Counts `stop` calls made through one track's control.
#[derive(Clone, Default)]
pub struct FakeTrackControl {
    stops: Arc<AtomicUsize>,
}

impl FakeTrackControl {
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TrackControl for FakeTrackControl {
    fn stop(&self) -> Result<(), Error> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One stream handed to a [`FakeConnection`]. Tests drive its lifecycle
/// through `signals`.
#[derive(Clone)]
pub struct PlayedTrack {
    pub label: String,
    pub signals: UnboundedSender<TrackSignal>,
    pub control: FakeTrackControl,
}

impl PlayedTrack {
    pub fn send(&self, signal: TrackSignal) {
        let _ = self.signals.send(signal);
    }
}

pub struct FakeConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    connected: AtomicBool,
    fail_play: AtomicBool,
    played: Mutex<Vec<PlayedTrack>>,
}

impl FakeConnection {
    pub fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
            connected: AtomicBool::new(true),
            fail_play: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn played(&self) -> Vec<PlayedTrack> {
        lock(&self.played).clone()
    }

    pub fn last_played(&self) -> Option<PlayedTrack> {
        lock(&self.played).last().cloned()
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn play(
        &self,
        source: StreamSource,
        signals: UnboundedSender<TrackSignal>,
    ) -> Result<Box<dyn TrackControl>, Error> {
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::MediaUnavailable("sink rejected the stream".into()));
        }
        let label = source.into_payload::<String>()?;
        let control = FakeTrackControl::default();
        lock(&self.played).push(PlayedTrack {
            label,
            signals,
            control: control.clone(),
        });
        Ok(Box::new(control))
    }
}

/// Voice transport that hands out [`FakeConnection`]s.
#[derive(Default)]
pub struct FakeVoiceTransport {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reject: AtomicBool,
    delay: Mutex<Option<Duration>>,
    live: Mutex<HashMap<GuildId, Arc<FakeConnection>>>,
    history: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeVoiceTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every connect take `delay` before it completes.
    pub fn with_delay(delay: Duration) -> Self {
        let transport = Self::default();
        *lock(&transport.delay) = Some(delay);
        transport
    }

    pub fn reject_connects(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// The connection currently open in `guild_id`, if any.
    pub fn live(&self, guild_id: GuildId) -> Option<Arc<FakeConnection>> {
        lock(&self.live).get(&guild_id).cloned()
    }

    /// Every connection ever opened, oldest first.
    pub fn history(&self) -> Vec<Arc<FakeConnection>> {
        lock(&self.history).clone()
    }
}

#[async_trait]
impl VoiceTransport for FakeVoiceTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::VoiceConnect(format!("channel {channel_id} is full")));
        }
        let connection = Arc::new(FakeConnection::new(guild_id, channel_id));
        lock(&self.live).insert(guild_id, Arc::clone(&connection));
        lock(&self.history).push(Arc::clone(&connection));
        Ok(connection)
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), Error> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = lock(&self.live).remove(&guild_id) {
            connection.set_connected(false);
        }
        Ok(())
    }
}

/// Voice lookup over a fixed table of (guild, user) -> channel.
#[derive(Default)]
pub struct StaticVoiceLookup {
    states: Mutex<HashMap<(GuildId, UserId), ChannelId>>,
}

impl StaticVoiceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, guild_id: GuildId, user_id: UserId, channel_id: ChannelId) -> Self {
        self.join(guild_id, user_id, channel_id);
        self
    }

    pub fn join(&self, guild_id: GuildId, user_id: UserId, channel_id: ChannelId) {
        lock(&self.states).insert((guild_id, user_id), channel_id);
    }

    pub fn leave(&self, guild_id: GuildId, user_id: UserId) {
        lock(&self.states).remove(&(guild_id, user_id));
    }
}

impl VoiceChannelLookup for StaticVoiceLookup {
    fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        lock(&self.states).get(&(guild_id, user_id)).copied()
    }
}
