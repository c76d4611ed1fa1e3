//! Voice turn-taking: listener, wake-word gate, turn coordinator, playback.

pub mod citations;
pub mod coordinator;
pub mod events;
pub mod listener;
pub mod playback;
pub mod voice_session;
pub mod wake;

pub use events::SessionEvent;
pub use voice_session::{VoicePorts, VoiceSession, VoiceSessionHandle};
