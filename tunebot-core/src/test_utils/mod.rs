// File: tunebot-core/src/test_utils/mod.rs

pub mod fakes;
pub mod helpers;
