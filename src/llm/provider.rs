use async_trait::async_trait;

use crate::errors::DeskGroundResult;
use crate::llm::types::ChatMessage;

/// The language-model collaborator. One call per agent step; the engine waits
/// for it before doing anything else.
///
/// Transport failures come back as `Err` and are recorded as a parse error
/// for that step rather than aborting the session.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Returns the raw text reply for the given conversation.
    async fn generate(&self, messages: Vec<ChatMessage>) -> DeskGroundResult<String>;
}
