//! Design-assistant chat.

use crate::layer::unix_millis;
use crate::storage::{ApiError, ApiResult, ChatRecord, ChatRequest, ProjectApi};

/// Reply shown when the backend answers with an error status.
pub const ASSISTANT_UNAVAILABLE: &str =
    "Sorry, the AI assistant is not available right now. Please check that the Gemini API key is configured.";
/// Reply shown when the request could not be completed at all.
pub const ASSISTANT_FAILED: &str = "Sorry, I encountered an error. Please try again.";

/// Who wrote a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub sender: ChatSender,
    pub text: String,
    pub timestamp_millis: u64,
}

/// `session_<millis>_<9 base36 chars>`, the suffix taken from `entropy`.
pub fn session_id(now_millis: u64, entropy: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut value = entropy;
    let suffix: String = (0..9)
        .map(|_| {
            let digit = DIGITS[(value % 36) as usize] as char;
            value /= 36;
            digit
        })
        .collect();
    format!("session_{}_{}", now_millis, suffix)
}

/// One conversation with the assistant.
#[derive(Debug, Clone)]
pub struct ChatSession {
    session_id: String,
    messages: Vec<ChatEntry>,
    typing: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Start a conversation with a fresh session id.
    pub fn new() -> Self {
        Self::with_session_id(session_id(unix_millis(), uuid::Uuid::new_v4().as_u128()))
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), messages: Vec::new(), typing: false }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }

    /// Whether a reply is being waited for.
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    fn push(&mut self, sender: ChatSender, text: impl Into<String>) {
        self.messages.push(ChatEntry { sender, text: text.into(), timestamp_millis: unix_millis() });
    }

    /// Send a message and append the assistant's reply.
    ///
    /// Blank input is ignored. Failures never propagate: they are turned into
    /// a canned assistant reply. Returns the reply entry.
    pub async fn send<A: ProjectApi + ?Sized>(&mut self, api: &A, input: &str) -> Option<&ChatEntry> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }
        self.push(ChatSender::User, message);
        self.typing = true;

        let request = ChatRequest { message: message.to_string(), session_id: self.session_id.clone() };
        let reply = match api.chat(&request).await {
            Ok(reply) => reply.response,
            Err(ApiError::Status { status, detail }) => {
                log::warn!("Assistant unavailable ({}): {}", status, detail);
                ASSISTANT_UNAVAILABLE.to_string()
            }
            Err(e) => {
                log::error!("Chat error: {}", e);
                ASSISTANT_FAILED.to_string()
            }
        };

        self.typing = false;
        self.push(ChatSender::Assistant, reply);
        self.messages.last()
    }

    /// Exchanges stored on the backend for this session.
    pub async fn history<A: ProjectApi + ?Sized>(&self, api: &A) -> ApiResult<Vec<ChatRecord>> {
        Ok(api.chat_history(&self.session_id).await?.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryApi;
    use crate::testing::block_on;

    #[test]
    fn test_session_id_format() {
        let id = session_id(1_700_000_000_000, 0x1234_5678_9abc_def0);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts[0], "session");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_fresh_sessions_differ() {
        assert_ne!(ChatSession::new().session_id(), ChatSession::new().session_id());
    }

    #[test]
    fn test_successful_reply() {
        let api = MemoryApi::new();
        api.set_chat_reply(Some("Try a warmer palette."));
        let mut chat = ChatSession::with_session_id("s1");

        let reply = block_on(chat.send(&api, "  colors?  ")).unwrap().clone();
        assert_eq!(reply.sender, ChatSender::Assistant);
        assert_eq!(reply.text, "Try a warmer palette.");
        assert_eq!(chat.messages()[0].text, "colors?");
        assert!(!chat.is_typing());
        assert_eq!(block_on(chat.history(&api)).unwrap().len(), 1);
    }

    #[test]
    fn test_error_status_gives_unavailable_reply() {
        let api = MemoryApi::new();
        let mut chat = ChatSession::with_session_id("s1");

        let reply = block_on(chat.send(&api, "hello")).unwrap();
        assert_eq!(reply.text, ASSISTANT_UNAVAILABLE);
    }

    #[test]
    fn test_network_failure_gives_error_reply() {
        let api = MemoryApi::new();
        api.set_offline(true);
        let mut chat = ChatSession::with_session_id("s1");

        let reply = block_on(chat.send(&api, "hello")).unwrap();
        assert_eq!(reply.text, ASSISTANT_FAILED);
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_blank_input_ignored() {
        let api = MemoryApi::new();
        let mut chat = ChatSession::with_session_id("s1");

        assert!(block_on(chat.send(&api, "   ")).is_none());
        assert!(chat.messages().is_empty());
    }
}
