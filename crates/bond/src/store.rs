use crate::models::message::Message;

/// The ordered history of one conversation.
///
/// Messages are only ever appended; `reset` is the single way to drop them. The store does
/// not check message shapes, producers are expected to hand in well formed messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the tail of the conversation
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a batch of messages in one step
    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) {
        self.messages.extend(messages);
    }

    /// An owned copy of the conversation, in insertion order
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Read only view of the conversation
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop every message
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for MessageStore {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
