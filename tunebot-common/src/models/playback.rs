/// Lifecycle of one playback handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    Idle,
    Buffering,
    Playing,
    Stopped,
    Errored,
}

impl PlaybackStatus {
    /// Buffering or Playing: the handle currently owns the session's sink.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Buffering | PlaybackStatus::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackStatus::Stopped | PlaybackStatus::Errored)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PlaybackStatus) -> bool {
        use PlaybackStatus::*;
        match (self, next) {
            (Idle, Buffering) => true,
            (Buffering, Playing) => true,
            (Buffering | Playing, Stopped) => true,
            (Idle | Buffering | Playing, Errored) => true,
            _ => false,
        }
    }
}

/// Raw signals the voice transport pushes for an attached stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSignal {
    /// Audio data started flowing.
    Playing,
    /// Stream exhausted or stopped.
    Ended,
    /// Transport-level fault.
    Fault(String),
}

/// Notifications surfaced to the requester, at most one of each per attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Playing,
    Stopped,
    Errored(String),
}

impl PlaybackEvent {
    pub fn notice(&self) -> &'static str {
        match self {
            PlaybackEvent::Playing => "🎵 play!",
            PlaybackEvent::Stopped => "🎵 stop!",
            PlaybackEvent::Errored(_) => "An error occurred during playback.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackStatus::*;

    #[test]
    fn transitions_follow_the_state_machine() {
        assert!(Idle.can_transition_to(Buffering));
        assert!(Buffering.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Stopped));
        assert!(Buffering.can_transition_to(Stopped));
        assert!(Playing.can_transition_to(Errored));

        assert!(!Idle.can_transition_to(Playing));
        assert!(!Stopped.can_transition_to(Playing));
        assert!(!Stopped.can_transition_to(Errored));
        assert!(!Errored.can_transition_to(Stopped));
        assert!(!Playing.can_transition_to(Buffering));
    }
}
