//! An inbound chat message as delivered by the events endpoint.

/// One message from the chat stream, stripped down to what classification
/// and command handling need.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Identity used for rule matching: the posting bot's id, or the user id
    /// for human messages.
    pub sender: String,
    /// Channel the message was posted in.
    pub channel: String,
    /// User id of the author, for ephemeral replies. Empty for bot messages.
    pub user: String,
    /// Raw message text, possibly multi-line.
    pub text: String,
}
