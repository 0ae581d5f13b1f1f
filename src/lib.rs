pub mod autoplay;
pub mod code_view;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod playback;
#[cfg(feature = "play")]
pub mod player;
pub mod prompt;
pub mod render;
pub mod response;
pub mod schema;
pub mod session;
pub mod source;

pub use error::{StoryResult, StoryboardError};
pub use schema::{Frame, Storyboard};
