pub mod candidate;
pub mod discord;
pub mod playback;
pub mod selection;

pub use candidate::Candidate;
pub use discord::*;
pub use playback::*;
pub use selection::*;
