pub mod ai;
pub mod config;
pub mod history;
pub mod preferences;
pub mod session;
pub mod speech;
pub mod state;
pub mod store;
pub mod transcript;

// Re-export main types for convenience
pub use ai::{ChatBackend, GeminiClient, GeminiError, GenerateRequest, GenerateResponse};
pub use config::Config;
pub use history::LogStore;
pub use preferences::Preferences;
pub use session::{Rejected, SendOutcome, SendPhase, Session};
pub use speech::{CommandSpeaker, SilentSpeaker, Speaker, SpeechEvent};
pub use state::{AttachedImage, Role, Turn, TurnContent};
pub use store::Store;
pub use transcript::{HistoryEntry, TranscriptEntry};
