use chrono::{TimeDelta, Utc};
use serde_json::Value;

use huddle_db::models::MessagePatch;
use huddle_gateway::broker::OutboundFrame;
use huddle_gateway::connection::ConnectionCtx;
use huddle_types::events::{EventKind, ServerEvent};
use huddle_types::models::{ChatKind, DirectChatId};

use crate::dispatch::{
    ChatEngine, i64_field, message_body, now_rfc3339, opt_i64_field, str_field, validate_text,
};
use crate::error::ChatError;

/// One-to-one conversations. Delivery is targeted: the sender's own channel
/// plus the other participant's bound channel, collapsing to a single send
/// for a self-chat.
pub(crate) struct DirectStrategy<'a> {
    pub(crate) engine: &'a ChatEngine,
    pub(crate) ctx: &'a ConnectionCtx,
}

impl DirectStrategy<'_> {
    pub(crate) async fn handle(
        &self,
        kind: EventKind,
        chat_id: &str,
        content: &Value,
    ) -> Result<(), ChatError> {
        let not_matching =
            || ChatError::NonMatchingDirectChatId(self.ctx.user_id, chat_id.to_string());

        let (a, b) = DirectChatId::parse(chat_id).ok_or_else(not_matching)?;
        let supplied = DirectChatId::new(a, b);
        if !supplied.contains(self.ctx.user_id) {
            return Err(not_matching());
        }
        // The canonical min_max spelling wins over whatever the client sent.
        let chat = DirectChatId::new(self.ctx.user_id, supplied.other(self.ctx.user_id));

        match kind {
            EventKind::NewMessage => self.new_message(&chat, content),
            EventKind::EditMessage => self.edit_message(&chat, content),
            EventKind::DeleteMessage => self.delete_message(&chat, content),
            EventKind::ReadMessage => self.read_message(&chat, content),
            EventKind::Typing => self.typing(&chat),
            // Presence events never reach a strategy.
            EventKind::SetOnline | EventKind::SetOffline => Ok(()),
        }
    }

    fn new_message(&self, chat: &DirectChatId, content: &Value) -> Result<(), ChatError> {
        let text = validate_text(str_field(content, "text")?)?;
        let reply_to = opt_i64_field(content, "reply_to")?;
        let chat_id = chat.to_string();

        // The chat row is created lazily on first send.
        if self.engine.db.get_direct_chat(&chat_id)?.is_none() {
            self.engine.db.create_direct_chat(chat.low, chat.high)?;
        }

        // A reply reference that does not exist or points into another chat
        // degrades to null rather than failing the send.
        let reply_to_id = match reply_to {
            Some(id) => self
                .engine
                .db
                .get_message(id)?
                .filter(|m| m.chat_id == chat_id)
                .map(|m| m.id),
            None => None,
        };

        let row = self.engine.db.create_message(
            &chat_id,
            ChatKind::Direct.as_str(),
            self.ctx.user_id,
            text,
            reply_to_id,
            &now_rfc3339(),
        )?;

        self.emit(
            chat,
            &ServerEvent::NewMessage {
                chat_type: ChatKind::Direct,
                chat_id,
                message: message_body(&row),
            },
        );
        Ok(())
    }

    fn edit_message(&self, chat: &DirectChatId, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;
        let text = validate_text(str_field(content, "text")?)?;
        let chat_id = chat.to_string();

        let row = self.engine.load_chat_message(&chat_id, message_id)?;
        if row.is_deleted {
            return Err(ChatError::MessageDeleted(message_id));
        }
        if row.author_id != self.ctx.user_id {
            return Err(ChatError::UserNotMessageAuthor(self.ctx.user_id, message_id));
        }

        self.engine.db.update_message(
            message_id,
            &MessagePatch {
                text: Some(text.to_string()),
                edited_at: Some(now_rfc3339()),
                is_edited: Some(true),
                ..Default::default()
            },
        )?;
        let row = self
            .engine
            .db
            .get_message(message_id)?
            .ok_or(ChatError::MessageNotFound(message_id))?;

        self.emit(
            chat,
            &ServerEvent::EditMessage {
                chat_type: ChatKind::Direct,
                chat_id,
                message: message_body(&row),
            },
        );
        Ok(())
    }

    fn delete_message(&self, chat: &DirectChatId, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;
        let chat_id = chat.to_string();

        let row = self.engine.load_chat_message(&chat_id, message_id)?;
        if row.is_deleted {
            return Err(ChatError::MessageDeleted(message_id));
        }
        if row.author_id != self.ctx.user_id {
            return Err(ChatError::UserNotMessageAuthor(self.ctx.user_id, message_id));
        }

        self.engine.db.update_message(
            message_id,
            &MessagePatch {
                is_deleted: Some(true),
                ..Default::default()
            },
        )?;

        self.emit(
            chat,
            &ServerEvent::DeleteMessage {
                chat_type: ChatKind::Direct,
                chat_id,
                message_id,
            },
        );
        Ok(())
    }

    fn read_message(&self, chat: &DirectChatId, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;
        let chat_id = chat.to_string();

        let row = self.engine.load_chat_message(&chat_id, message_id)?;
        // Only the other participant's messages can be marked read; a user
        // never "reads" their own.
        if row.author_id != chat.other(self.ctx.user_id) || row.author_id == self.ctx.user_id {
            return Err(ChatError::WrongChatId(message_id, chat_id));
        }

        self.engine.db.update_message(
            message_id,
            &MessagePatch {
                is_read: Some(true),
                ..Default::default()
            },
        )?;

        self.emit(
            chat,
            &ServerEvent::ReadMessage {
                chat_type: ChatKind::Direct,
                chat_id,
                message_id,
            },
        );
        Ok(())
    }

    fn typing(&self, chat: &DirectChatId) -> Result<(), ChatError> {
        self.emit(
            chat,
            &ServerEvent::Typing {
                chat_type: ChatKind::Direct,
                chat_id: chat.to_string(),
                user_id: self.ctx.user_id,
                end_time: Utc::now() + TimeDelta::seconds(5),
            },
        );
        Ok(())
    }

    /// Deliver to the originating channel and, when bound, to the other
    /// participant's channel. A self-chat collapses to the single send.
    fn emit(&self, chat: &DirectChatId, event: &ServerEvent) {
        let frame = OutboundFrame::event(event);
        self.engine.broker.send(&self.ctx.channel, &frame);

        let other = chat.other(self.ctx.user_id);
        if other != self.ctx.user_id {
            if let Some(channel) = self.engine.presence.lookup(other) {
                self.engine.broker.send(&channel, &frame);
            }
        }
    }
}
