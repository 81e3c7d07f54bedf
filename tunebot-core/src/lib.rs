// src/lib.rs

pub mod config;
pub mod eventbus;
pub mod http;
pub mod platforms;
pub mod selection;
pub mod services;
pub mod test_utils;
pub mod voice;

pub use config::BotConfig;
pub use http::{DefaultHttpClient, HttpClient};
pub use tunebot_common::error::{Error, ErrorKind};
