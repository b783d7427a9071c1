use thiserror::Error;

/// Domain failures of the chat state machine. Each one is converted at the
/// dispatch boundary into an `{"error": ...}` frame on the originating
/// channel; none of them closes the connection.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("NonMatchingDirectChatId: user {0} is not a participant of chat '{1}'")]
    NonMatchingDirectChatId(i64, String),

    #[error("UserNotInChat: user {0} is not a member of project chat {1}")]
    UserNotInChat(i64, i64),

    #[error("UserNotMessageAuthor: user {0} did not author message {1}")]
    UserNotMessageAuthor(i64, i64),

    #[error("WrongChatId: message {0} does not belong to chat '{1}'")]
    WrongChatId(i64, String),

    #[error("MessageDeleted: message {0} is deleted")]
    MessageDeleted(i64),

    #[error("ChatNotFound: chat '{0}' does not exist")]
    ChatNotFound(String),

    #[error("MessageNotFound: message {0} does not exist")]
    MessageNotFound(i64),

    #[error("MissingField: required key '{0}' is absent")]
    MissingField(&'static str),

    #[error("InvalidField: key '{0}' has an unexpected type")]
    InvalidField(&'static str),

    #[error("UnknownChatType: '{0}'")]
    UnknownChatType(String),

    #[error("EmptyMessage: message text is empty")]
    EmptyMessage,

    #[error("MessageTooLong: message text exceeds 8192 characters")]
    MessageTooLong,

    #[error("PersistenceUnavailable: {0}")]
    PersistenceUnavailable(#[from] anyhow::Error),
}
