pub mod auth;
pub mod role;
pub mod transcription;

pub use auth::{Authenticator, JwtAuthenticator};
pub use role::RoleAssigner;
pub use transcription::{AssemblyAiTranscriber, AudioSource, SpeechToText};
