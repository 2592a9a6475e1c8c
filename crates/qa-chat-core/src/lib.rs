pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use config::Config;
pub use error::RequestFailed;
pub use service::{QaClient, QaService};
pub use session::{
    ChatSession, SendOutcome, SessionEvent, SessionView, TranscriptEntry, NO_RESPONSE_PLACEHOLDER,
    REQUEST_FAILED_MESSAGE,
};
pub use state::{Message, SessionState, Speaker};
