// File: src/services/mod.rs

pub mod command;
pub mod dispatcher;
pub mod orchestrator;
pub mod youtube;

pub use command::ChatCommand;
pub use dispatcher::Dispatcher;
pub use orchestrator::{Collaborators, SessionOrchestrator, SessionSettings};
pub use youtube::YoutubeSearch;
