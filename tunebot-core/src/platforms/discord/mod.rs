pub mod notifier;
pub mod runtime;
pub mod voice_lookup;

pub use notifier::DiscordNotifier;
pub use runtime::DiscordPlatform;
pub use voice_lookup::CacheVoiceLookup;
