//! Playback state machine, one active handle per voice session.
//!
//! `Idle -> Buffering` on attach, `Buffering -> Playing` when the transport
//! reports audio flowing, `Buffering|Playing -> Stopped` on end, stop or
//! preemption, and any non-terminal state `-> Errored` on a transport fault.
//! Each transition that produces a notification does so exactly once, since
//! a transition can only be taken once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use tunebot_common::models::{GuildId, PlaybackEvent, PlaybackStatus, TrackSignal};
use tunebot_common::traits::{StreamSource, TrackControl};

use crate::Error;
use crate::voice::session_manager::VoiceSession;

struct TrackState {
    id: u64,
    guild_id: GuildId,
    status: watch::Sender<PlaybackStatus>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl TrackState {
    fn current(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    fn advance(&self, next: PlaybackStatus) -> bool {
        let moved = self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            debug!("(PlaybackController) track {} in guild {} -> {next:?}", self.id, self.guild_id);
        }
        moved
    }

    fn mark_playing(&self) {
        if self.advance(PlaybackStatus::Playing) {
            let _ = self.events.send(PlaybackEvent::Playing);
        }
    }

    fn mark_stopped(&self) {
        if self.advance(PlaybackStatus::Stopped) {
            let _ = self.events.send(PlaybackEvent::Stopped);
        }
    }

    fn mark_errored(&self, reason: String) {
        if self.advance(PlaybackStatus::Errored) {
            error!("(PlaybackController) track {} in guild {} failed: {reason}", self.id, self.guild_id);
            let _ = self.events.send(PlaybackEvent::Errored(reason));
        }
    }

    fn apply(&self, signal: TrackSignal) {
        match signal {
            TrackSignal::Playing => self.mark_playing(),
            TrackSignal::Ended => self.mark_stopped(),
            TrackSignal::Fault(reason) => self.mark_errored(reason),
        }
    }
}

struct ActiveTrack {
    state: Arc<TrackState>,
    session: VoiceSession,
    control: Box<dyn TrackControl>,
}

impl ActiveTrack {
    fn halt(&self) {
        if let Err(e) = self.control.stop() {
            warn!(
                "(PlaybackController) transport refused to stop track {} in guild {}: {e}",
                self.state.id, self.state.guild_id
            );
        }
    }
}

type Slot = Arc<Mutex<Option<ActiveTrack>>>;

/// Observable lifecycle of one attached stream.
pub struct PlaybackHandle {
    label: String,
    session: VoiceSession,
    status: watch::Receiver<PlaybackStatus>,
    events: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
}

impl PlaybackHandle {
    /// What is being played (the media id it was opened from).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Waits until the handle reaches `target`, or a terminal state.
    pub async fn wait_for(&self, target: PlaybackStatus) -> PlaybackStatus {
        let mut rx = self.status.clone();
        if let Ok(status) = rx.wait_for(|s| *s == target || s.is_terminal()).await {
            return *status;
        }
        self.status()
    }

    /// Notification stream for this handle. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PlaybackEvent>> {
        self.events.take()
    }
}

#[derive(Default)]
pub struct PlaybackController {
    slots: DashMap<GuildId, Slot>,
    next_id: AtomicU64,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, guild_id: GuildId) -> Slot {
        Arc::clone(self.slots.entry(guild_id).or_default().value())
    }

    fn existing_slot(&self, guild_id: GuildId) -> Option<Slot> {
        self.slots.get(&guild_id).map(|s| Arc::clone(s.value()))
    }

    /// Streams `source` into `session`. A handle already attached to the
    /// session is stopped first. Returns as soon as the stream is handed to
    /// the transport; later transitions arrive through the handle.
    pub async fn attach(&self, session: &VoiceSession, source: StreamSource) -> Result<PlaybackHandle, Error> {
        let guild_id = session.guild_id();
        if !session.is_connected() {
            return Err(Error::NotConnected(format!(
                "guild {guild_id} channel {}",
                session.channel_id()
            )));
        }

        let slot = self.slot(guild_id);
        let mut current = slot.lock().await;

        if let Some(previous) = current.take() {
            info!(
                "(PlaybackController) preempting track {} in guild {guild_id}",
                previous.state.id
            );
            previous.state.mark_stopped();
            previous.halt();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let label = source.label.clone();
        let (status_tx, status_rx) = watch::channel(PlaybackStatus::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(TrackState {
            id,
            guild_id,
            status: status_tx,
            events: events_tx,
        });

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let control = session.connection().play(source, signal_tx).await?;
        state.advance(PlaybackStatus::Buffering);

        tokio::spawn(observe(Arc::clone(&state), signal_rx, Arc::clone(&slot)));

        *current = Some(ActiveTrack {
            state,
            session: session.clone(),
            control,
        });
        info!("(PlaybackController) track {id} '{label}' attached in guild {guild_id}");

        Ok(PlaybackHandle {
            label,
            session: session.clone(),
            status: status_rx,
            events: Some(events_rx),
        })
    }

    /// Stops whatever is attached in the guild. Returns whether anything was.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        let Some(slot) = self.existing_slot(guild_id) else {
            return false;
        };
        let taken = slot.lock().await.take();
        match taken {
            Some(track) => {
                info!("(PlaybackController) stopping track {} in guild {guild_id}", track.state.id);
                track.state.mark_stopped();
                track.halt();
                true
            }
            None => false,
        }
    }

    /// Stops every attached track. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let guilds: Vec<GuildId> = self.slots.iter().map(|entry| *entry.key()).collect();
        let mut stopped = 0;
        for guild_id in guilds {
            if self.stop(guild_id).await {
                stopped += 1;
            }
        }
        stopped
    }

    /// Errors the guild's active track if its session lost its connection.
    pub async fn fault_if_disconnected(&self, guild_id: GuildId, reason: &str) -> bool {
        let Some(slot) = self.existing_slot(guild_id) else {
            return false;
        };
        let mut current = slot.lock().await;
        let dead = current.as_ref().is_some_and(|track| !track.session.is_connected());
        if !dead {
            return false;
        }
        if let Some(track) = current.take() {
            track.state.mark_errored(reason.to_string());
            track.halt();
        }
        true
    }

    /// Whether a Buffering or Playing handle is attached to a live session in
    /// the guild.
    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        let Some(slot) = self.existing_slot(guild_id) else {
            return false;
        };
        let current = slot.lock().await;
        current
            .as_ref()
            .is_some_and(|track| track.state.current().is_active() && track.session.is_connected())
    }
}

/// Applies transport signals to one track until it reaches a terminal state,
/// then frees the slot if the track still occupies it.
async fn observe(state: Arc<TrackState>, mut signals: mpsc::UnboundedReceiver<TrackSignal>, slot: Slot) {
    let mut status = state.status.subscribe();
    while !state.current().is_terminal() {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(signal) => state.apply(signal),
                // Transport dropped the stream without a final word.
                None => state.mark_stopped(),
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let mut current = slot.lock().await;
    if current.as_ref().is_some_and(|track| track.state.id == state.id) {
        *current = None;
        debug!("(PlaybackController) track {} in guild {} detached", state.id, state.guild_id);
    }
}
