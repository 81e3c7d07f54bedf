//! songbird.rs
//!
//! Voice transport and media source backed by Songbird. The gateway side of
//! Songbird is fed by the Discord shard runners; this module only joins,
//! leaves and plays.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use songbird::error::JoinError;
use songbird::input::{Compose, Input, YoutubeDl};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use tunebot_common::models::{ChannelId, GuildId, TrackSignal};
use tunebot_common::traits::{MediaSource, StreamSource, TrackControl, VoiceConnection, VoiceTransport};

use crate::Error;
use crate::eventbus::{BotEvent, EventBus};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Joins and leaves voice channels through Songbird.
pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    events: EventBus,
}

impl SongbirdTransport {
    pub fn new(songbird: Arc<Songbird>, events: EventBus) -> Self {
        Self { songbird, events }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, Error> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| Error::VoiceConnect(format!("join {channel_id} in guild {guild_id}: {e}")))?;

        let connected = Arc::new(AtomicBool::new(true));
        {
            let mut handler = call.lock().await;
            let watcher = ConnectionWatcher {
                guild_id,
                connected: Arc::clone(&connected),
                events: self.events.clone(),
            };
            handler.add_global_event(Event::Core(CoreEvent::DriverDisconnect), watcher.clone());
            handler.add_global_event(Event::Core(CoreEvent::DriverConnect), watcher.clone());
            handler.add_global_event(Event::Core(CoreEvent::DriverReconnect), watcher);
        }
        debug!("(SongbirdTransport) call ready in guild {guild_id}");

        Ok(Arc::new(SongbirdConnection { call, connected }))
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), Error> {
        match self.songbird.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(Error::VoiceConnect(format!("leave guild {guild_id}: {e}"))),
        }
    }
}

/// Tracks driver liveness for one call and reports drops on the event bus.
#[derive(Clone)]
struct ConnectionWatcher {
    guild_id: GuildId,
    connected: Arc<AtomicBool>,
    events: EventBus,
}

#[async_trait]
impl EventHandler for ConnectionWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::DriverDisconnect(data) => {
                if self.connected.swap(false, Ordering::SeqCst) {
                    warn!(
                        "(SongbirdTransport) driver disconnected in guild {}: {:?}",
                        self.guild_id, data.reason
                    );
                    self.events.publish(BotEvent::VoiceDisconnected {
                        guild_id: self.guild_id,
                    });
                }
            }
            EventContext::DriverConnect(_) | EventContext::DriverReconnect(_) => {
                self.connected.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
        None
    }
}

pub struct SongbirdConnection {
    call: Arc<Mutex<Call>>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn play(
        &self,
        source: StreamSource,
        signals: UnboundedSender<TrackSignal>,
    ) -> Result<Box<dyn TrackControl>, Error> {
        let label = source.label.clone();
        let input: Input = source.into_payload()?;

        let track = self.call.lock().await.play_input(input);
        let notifier = TrackNotifier { signals };
        for event in [TrackEvent::Play, TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| Error::MediaUnavailable(format!("track '{label}' is gone: {e}")))?;
        }
        debug!("(SongbirdConnection) started track '{label}'");

        Ok(Box::new(SongbirdTrack(track)))
    }
}

/// Relays Songbird track events as [`TrackSignal`]s.
#[derive(Clone)]
struct TrackNotifier {
    signals: UnboundedSender<TrackSignal>,
}

#[async_trait]
impl EventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                let signal = match &state.playing {
                    PlayMode::Play => TrackSignal::Playing,
                    PlayMode::End | PlayMode::Stop => TrackSignal::Ended,
                    PlayMode::Errored(e) => TrackSignal::Fault(e.to_string()),
                    _ => continue,
                };
                // The observer is gone once the track is settled.
                let _ = self.signals.send(signal);
            }
        }
        None
    }
}

struct SongbirdTrack(TrackHandle);

impl TrackControl for SongbirdTrack {
    fn stop(&self) -> Result<(), Error> {
        match self.0.stop() {
            Ok(()) => Ok(()),
            // Already finished; nothing left to stop.
            Err(songbird::error::ControlError::Finished) => Ok(()),
            Err(e) => Err(Error::Platform(format!("stopping track {}: {e}", self.0.uuid()))),
        }
    }
}

/// Resolves video ids to lazily-started yt-dlp streams.
pub struct YoutubeMedia {
    client: reqwest::Client,
    program: Option<&'static str>,
}

impl YoutubeMedia {
    /// `program` overrides the extractor binary (defaults to `yt-dlp` on the PATH).
    pub fn new(client: reqwest::Client, program: Option<String>) -> Self {
        Self {
            client,
            // Songbird wants a 'static program name; this happens once at startup.
            program: program.map(|p| &*Box::leak(p.into_boxed_str())),
        }
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("{WATCH_URL}{video_id}")
    }
}

#[async_trait]
impl MediaSource for YoutubeMedia {
    async fn open_audio_stream(&self, candidate_id: &str) -> Result<StreamSource, Error> {
        let url = Self::watch_url(candidate_id);
        let mut source = match self.program {
            Some(program) => YoutubeDl::new_ytdl_like(program, self.client.clone(), url.clone()),
            None => YoutubeDl::new(self.client.clone(), url.clone()),
        };

        let metadata = source
            .aux_metadata()
            .await
            .map_err(|e| Error::MediaUnavailable(format!("{url}: {e}")))?;
        let label = metadata.title.unwrap_or(url);
        info!("(YoutubeMedia) resolved '{label}' for {candidate_id}");

        Ok(StreamSource::new(label, Input::from(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url_embeds_video_id() {
        assert_eq!(
            YoutubeMedia::watch_url("jfKfPfyJRdk"),
            "https://www.youtube.com/watch?v=jfKfPfyJRdk"
        );
    }

    #[tokio::test]
    async fn foreign_payloads_are_rejected() {
        let source = StreamSource::new("not songbird", 42u32);
        assert!(matches!(source.into_payload::<Input>(), Err(Error::MediaUnavailable(_))));
    }
}
