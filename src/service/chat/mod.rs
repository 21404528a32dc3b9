pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ReplyTarget, Void};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Slack. Implementing this trait allows different chat services to be used
/// with the infini-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Returns the unique identifier for the bot in the chat platform,
    /// which is used to detect when the bot is mentioned.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform and begins dispatching
    /// incoming messages.
    async fn start(&self) -> Void;

    /// Send a message to the conversation an event came from.
    async fn send_message(&self, target: &ReplyTarget, text: &str) -> Void;

    /// React to the message an event came from with an emoji.
    async fn react_to_message(&self, target: &ReplyTarget, emoji: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

// Tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// A chat client that records what it was asked to do.
    #[derive(Clone, Default)]
    pub struct RecordingChat {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        reactions: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingChat {
        pub fn client(&self) -> ChatClient {
            ChatClient::new(Arc::new(self.clone()))
        }

        /// Sent messages as `(channel, text)`.
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        /// Reactions as `(message_ts, emoji)`.
        pub fn reactions(&self) -> Vec<(String, String)> {
            self.reactions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenericChatClient for RecordingChat {
        fn bot_user_id(&self) -> &str {
            "UBOT"
        }

        async fn start(&self) -> Void {
            Ok(())
        }

        async fn send_message(&self, target: &ReplyTarget, text: &str) -> Void {
            self.sent.lock().unwrap().push((target.channel_id.clone(), text.to_string()));
            Ok(())
        }

        async fn react_to_message(&self, target: &ReplyTarget, emoji: &str) -> Void {
            self.reactions.lock().unwrap().push((target.message_ts.clone(), emoji.to_string()));
            Ok(())
        }
    }

    pub fn null_chat() -> ChatClient {
        RecordingChat::default().client()
    }
}
