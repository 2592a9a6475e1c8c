pub mod http;

pub use http::QaClient;

use async_trait::async_trait;

use crate::error::RequestFailed;
use crate::state::Message;

/// The remote question-answering endpoint a chat session talks to.
#[async_trait]
pub trait QaService: Send + Sync {
    /// Ask `question` given the transcript so far (which already ends with
    /// the question itself).
    ///
    /// `Ok(None)` means the service answered but the answer field was absent.
    async fn ask(&self, question: &str, history: &[Message]) -> Result<Option<String>, RequestFailed>;
}
