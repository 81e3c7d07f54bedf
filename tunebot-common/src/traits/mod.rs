pub mod api;
pub mod voice_traits;

pub use api::*;
pub use voice_traits::*;
