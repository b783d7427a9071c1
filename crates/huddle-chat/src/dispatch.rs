use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, warn};

use huddle_db::Database;
use huddle_db::models::MessageRow;
use huddle_gateway::broker::{Broker, OutboundFrame};
use huddle_gateway::connection::{ConnectionCtx, FrameHandler, FrameOutcome};
use huddle_gateway::presence::PresenceRegistry;
use huddle_gateway::rooms::GENERAL_ROOM;
use huddle_types::events::{Envelope, EventKind, ServerEvent};
use huddle_types::models::{ChatKind, MessageBody};

use crate::direct::DirectStrategy;
use crate::error::ChatError;
use crate::project::ProjectStrategy;

/// Maximum message length after trimming, in characters.
pub const MAX_MESSAGE_CHARS: usize = 8192;

/// The chat state machine. One instance serves every connection; per-chat
/// ordering falls out of each connection task calling in sequentially.
pub struct ChatEngine {
    pub(crate) db: Arc<Database>,
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) presence: PresenceRegistry,
}

impl ChatEngine {
    pub fn new(db: Arc<Database>, broker: Arc<dyn Broker>, presence: PresenceRegistry) -> Self {
        Self {
            db,
            broker,
            presence,
        }
    }

    async fn dispatch(
        &self,
        ctx: &ConnectionCtx,
        kind: EventKind,
        content: &Value,
    ) -> Result<(), ChatError> {
        match kind {
            EventKind::SetOnline => {
                self.presence.set_online(ctx.user_id);
                self.broker.group_send(
                    GENERAL_ROOM,
                    &OutboundFrame::event(&ServerEvent::SetOnline {
                        user_id: ctx.user_id,
                    }),
                );
                Ok(())
            }
            EventKind::SetOffline => {
                self.presence.set_offline(ctx.user_id);
                self.broker.group_send(
                    GENERAL_ROOM,
                    &OutboundFrame::event(&ServerEvent::SetOffline {
                        user_id: ctx.user_id,
                    }),
                );
                Ok(())
            }
            _ => {
                let chat_type = str_field(content, "chat_type")?;
                let chat_kind = ChatKind::parse(chat_type)
                    .ok_or_else(|| ChatError::UnknownChatType(chat_type.to_string()))?;
                let chat_id = chat_id_field(content)?;

                match chat_kind {
                    ChatKind::Direct => {
                        DirectStrategy { engine: self, ctx }
                            .handle(kind, &chat_id, content)
                            .await
                    }
                    ChatKind::Project => {
                        ProjectStrategy { engine: self, ctx }
                            .handle(kind, &chat_id, content)
                            .await
                    }
                }
            }
        }
    }

    /// Load a message and check it belongs to the chat the event names.
    pub(crate) fn load_chat_message(
        &self,
        chat_id: &str,
        message_id: i64,
    ) -> Result<MessageRow, ChatError> {
        let row = self
            .db
            .get_message(message_id)?
            .ok_or(ChatError::MessageNotFound(message_id))?;
        if row.chat_id != chat_id {
            return Err(ChatError::WrongChatId(message_id, chat_id.to_string()));
        }
        Ok(row)
    }

    fn send_error(&self, ctx: &ConnectionCtx, message: &str) {
        self.broker.send(&ctx.channel, &OutboundFrame::error(message));
    }
}

impl FrameHandler for ChatEngine {
    async fn handle_frame(&self, ctx: &ConnectionCtx, text: &str) -> FrameOutcome {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.send_error(ctx, &format!("malformed frame: {e}"));
                return FrameOutcome::Continue;
            }
        };

        let Some(kind) = EventKind::parse(&envelope.kind) else {
            warn!(
                "{} ({}) sent unknown event type '{}'",
                ctx.username, ctx.user_id, envelope.kind
            );
            return FrameOutcome::CloseUnknownType;
        };

        if let Err(err) = self.dispatch(ctx, kind, &envelope.content).await {
            if let ChatError::PersistenceUnavailable(e) = &err {
                error!("storage failure while handling {}: {e}", kind.as_str());
            }
            self.send_error(ctx, &err.to_string());
        }
        FrameOutcome::Continue
    }
}

// -- Content field extraction --
//
// Event content is duck-shaped JSON; every required key is pulled through
// these helpers so a missing key surfaces as a recoverable error frame.

pub(crate) fn str_field<'a>(content: &'a Value, key: &'static str) -> Result<&'a str, ChatError> {
    match content.get(key) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) => Err(ChatError::MissingField(key)),
        Some(_) => Err(ChatError::InvalidField(key)),
    }
}

pub(crate) fn i64_field(content: &Value, key: &'static str) -> Result<i64, ChatError> {
    match content.get(key) {
        Some(value) => value
            .as_i64()
            .ok_or(if value.is_null() {
                ChatError::MissingField(key)
            } else {
                ChatError::InvalidField(key)
            }),
        None => Err(ChatError::MissingField(key)),
    }
}

pub(crate) fn opt_i64_field(content: &Value, key: &'static str) -> Result<Option<i64>, ChatError> {
    match content.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or(ChatError::InvalidField(key)),
    }
}

/// `chat_id` arrives as a string for direct chats ("3_7") and as either a
/// string or a number for project chats.
pub(crate) fn chat_id_field(content: &Value) -> Result<String, ChatError> {
    match content.get("chat_id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        None | Some(Value::Null) => Err(ChatError::MissingField("chat_id")),
        Some(_) => Err(ChatError::InvalidField("chat_id")),
    }
}

/// Trim and bound message text.
pub(crate) fn validate_text(text: &str) -> Result<&str, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::MessageTooLong);
    }
    Ok(trimmed)
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Wire form of a stored row. A deleted message keeps its envelope but never
/// surfaces its text.
pub(crate) fn message_body(row: &MessageRow) -> MessageBody {
    MessageBody {
        id: row.id,
        chat_id: row.chat_id.clone(),
        chat_kind: ChatKind::parse(&row.chat_kind).unwrap_or_else(|| {
            warn!("corrupt chat_kind '{}' on message {}", row.chat_kind, row.id);
            ChatKind::Direct
        }),
        author_id: row.author_id,
        text: if row.is_deleted {
            String::new()
        } else {
            row.text.clone()
        },
        reply_to_id: row.reply_to_id,
        created_at: parse_timestamp(&row.created_at, row.id),
        edited_at: row.edited_at.as_deref().map(|s| parse_timestamp(s, row.id)),
        is_edited: row.is_edited,
        is_deleted: row.is_deleted,
        is_read: row.is_read,
    }
}

fn parse_timestamp(s: &str, message_id: i64) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("corrupt timestamp '{}' on message '{}': {}", s, message_id, e);
        DateTime::default()
    })
}
