pub mod playback;
pub mod session_manager;

pub use playback::{PlaybackController, PlaybackHandle};
pub use session_manager::{VoiceSession, VoiceSessionManager};
