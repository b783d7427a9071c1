use chrono::{TimeDelta, Utc};
use serde_json::Value;

use huddle_db::models::{MessagePatch, ProjectChatRow};
use huddle_gateway::broker::OutboundFrame;
use huddle_gateway::connection::ConnectionCtx;
use huddle_gateway::rooms::chat_room;
use huddle_types::events::{EventKind, ServerEvent};
use huddle_types::models::ChatKind;

use crate::dispatch::{
    ChatEngine, i64_field, message_body, now_rfc3339, opt_i64_field, str_field, validate_text,
};
use crate::error::ChatError;

/// Group conversations owned by a project. Authorization is membership-based
/// and delivery goes through the chat room, reaching every currently
/// subscribed member once.
pub(crate) struct ProjectStrategy<'a> {
    pub(crate) engine: &'a ChatEngine,
    pub(crate) ctx: &'a ConnectionCtx,
}

impl ProjectStrategy<'_> {
    pub(crate) async fn handle(
        &self,
        kind: EventKind,
        chat_id: &str,
        content: &Value,
    ) -> Result<(), ChatError> {
        self.authorize(chat_id)?;

        match kind {
            EventKind::NewMessage => self.new_message(chat_id, content),
            EventKind::EditMessage => self.edit_message(chat_id, content),
            EventKind::DeleteMessage => self.delete_message(chat_id, content),
            EventKind::ReadMessage => self.read_message(chat_id, content),
            EventKind::Typing => self.typing(chat_id),
            // Presence events never reach a strategy.
            EventKind::SetOnline | EventKind::SetOffline => Ok(()),
        }
    }

    /// The caller must be the project's leader or one of its collaborators.
    fn authorize(&self, chat_id: &str) -> Result<ProjectChatRow, ChatError> {
        let chat_pk: i64 = chat_id
            .parse()
            .map_err(|_| ChatError::ChatNotFound(chat_id.to_string()))?;
        let chat = self
            .engine
            .db
            .get_project_chat(chat_pk)?
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))?;

        if !self
            .engine
            .db
            .is_project_member(chat.project_id, self.ctx.user_id)?
        {
            return Err(ChatError::UserNotInChat(self.ctx.user_id, chat_pk));
        }
        Ok(chat)
    }

    fn new_message(&self, chat_id: &str, content: &Value) -> Result<(), ChatError> {
        let text = validate_text(str_field(content, "text")?)?;
        let reply_to = opt_i64_field(content, "reply_to")?;

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
            chat_id,
            ChatKind::Project.as_str(),
            self.ctx.user_id,
            text,
            reply_to_id,
            &now_rfc3339(),
        )?;

        self.emit(
            chat_id,
            &ServerEvent::NewMessage {
                chat_type: ChatKind::Project,
                chat_id: chat_id.to_string(),
                message: message_body(&row),
            },
        );
        Ok(())
    }

    fn edit_message(&self, chat_id: &str, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;
        let text = validate_text(str_field(content, "text")?)?;

        let row = self.engine.load_chat_message(chat_id, message_id)?;
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
            chat_id,
            &ServerEvent::EditMessage {
                chat_type: ChatKind::Project,
                chat_id: chat_id.to_string(),
                message: message_body(&row),
            },
        );
        Ok(())
    }

    fn delete_message(&self, chat_id: &str, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;

        let row = self.engine.load_chat_message(chat_id, message_id)?;
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
            chat_id,
            &ServerEvent::DeleteMessage {
                chat_type: ChatKind::Project,
                chat_id: chat_id.to_string(),
                message_id,
            },
        );
        Ok(())
    }

    fn read_message(&self, chat_id: &str, content: &Value) -> Result<(), ChatError> {
        let message_id = i64_field(content, "message_id")?;

        let row = self.engine.load_chat_message(chat_id, message_id)?;
        // A user cannot mark their own message read.
        if row.author_id == self.ctx.user_id {
            return Err(ChatError::WrongChatId(message_id, chat_id.to_string()));
        }

        self.engine.db.update_message(
            message_id,
            &MessagePatch {
                is_read: Some(true),
                ..Default::default()
            },
        )?;

        self.emit(
            chat_id,
            &ServerEvent::ReadMessage {
                chat_type: ChatKind::Project,
                chat_id: chat_id.to_string(),
                message_id,
            },
        );
        Ok(())
    }

    fn typing(&self, chat_id: &str) -> Result<(), ChatError> {
        self.emit(
            chat_id,
            &ServerEvent::Typing {
                chat_type: ChatKind::Project,
                chat_id: chat_id.to_string(),
                user_id: self.ctx.user_id,
                end_time: Utc::now() + TimeDelta::seconds(5),
            },
        );
        Ok(())
    }

    fn emit(&self, chat_id: &str, event: &ServerEvent) {
        self.engine
            .broker
            .group_send(&chat_room(chat_id), &OutboundFrame::event(event));
    }
}

#[cfg(test)]
mod tests {
    use huddle_gateway::broker::Delivery;
    use huddle_gateway::connection::{ConnectionCtx, FrameHandler};
    use tokio::sync::mpsc;

    use crate::testutil::{Harness, frames, harness};

    /// Project 10: leader 1, collaborator 2; its chat is 50. User 3 is an
    /// outsider. Chat members are subscribed to the chat room the way the
    /// group router would on connect.
    fn seed(h: &Harness) {
        h.db.create_user(1, "lena", true).unwrap();
        h.db.create_user(2, "marc", true).unwrap();
        h.db.create_user(3, "olga", true).unwrap();
        h.db.create_project(10, "atlas", 1).unwrap();
        h.db.add_collaborator(10, 2).unwrap();
        h.db.create_project_chat(50, 10).unwrap();
    }

    fn connect_member(
        h: &Harness,
        user_id: i64,
    ) -> (ConnectionCtx, mpsc::UnboundedReceiver<Delivery>) {
        let (ctx, rx) = h.connect(user_id);
        let memberships = h.db.list_collaborator_projects(user_id).unwrap();
        h.router.subscribe_chat(&ctx.channel, &memberships);
        (ctx, rx)
    }

    fn new_message(text: &str) -> String {
        format!(
            r#"{{"type":"NEW_MESSAGE","content":{{"chat_type":"project","chat_id":50,"text":"{text}"}}}}"#
        )
    }

    #[tokio::test]
    async fn non_member_is_rejected() {
        let h = harness();
        seed(&h);
        let (ctx, mut rx) = h.connect(3);

        h.engine.handle_frame(&ctx, &new_message("hi team")).await;

        let got = frames(&mut rx);
        assert_eq!(got.len(), 1);
        assert!(got[0]["error"].as_str().unwrap().contains("UserNotInChat"));
        assert!(h.db.get_message(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn message_fans_out_to_every_subscribed_member() {
        let h = harness();
        seed(&h);
        let (ctx1, mut rx1) = connect_member(&h, 1);
        let (_ctx2, mut rx2) = connect_member(&h, 2);
        let (_ctx3, mut rx3) = h.connect(3); // not in the room

        h.engine.handle_frame(&ctx1, &new_message("standup")).await;

        for rx in [&mut rx1, &mut rx2] {
            let got = frames(rx);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0]["type"], "NEW_MESSAGE");
            assert_eq!(got[0]["content"]["chat_id"], "50");
            assert_eq!(got[0]["content"]["message"]["chat_kind"], "project");
        }
        assert!(frames(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn unknown_project_chat_is_not_found() {
        let h = harness();
        seed(&h);
        let (ctx, mut rx) = h.connect(1);

        let frame = r#"{"type":"TYPING","content":{"chat_type":"project","chat_id":999}}"#;
        h.engine.handle_frame(&ctx, frame).await;
        assert!(
            frames(&mut rx)[0]["error"]
                .as_str()
                .unwrap()
                .contains("ChatNotFound")
        );
    }

    #[tokio::test]
    async fn edit_and_delete_stay_author_only() {
        let h = harness();
        seed(&h);
        let (ctx1, mut rx1) = connect_member(&h, 1);
        let (ctx2, mut rx2) = connect_member(&h, 2);

        h.engine.handle_frame(&ctx1, &new_message("draft")).await;
        let message_id = frames(&mut rx1)[0]["content"]["message"]["id"]
            .as_i64()
            .unwrap();
        frames(&mut rx2);

        let edit = format!(
            r#"{{"type":"EDIT_MESSAGE","content":{{"chat_type":"project","chat_id":50,"message_id":{message_id},"text":"hijack"}}}}"#
        );
        h.engine.handle_frame(&ctx2, &edit).await;
        assert!(
            frames(&mut rx2)[0]["error"]
                .as_str()
                .unwrap()
                .contains("UserNotMessageAuthor")
        );

        let delete = format!(
            r#"{{"type":"DELETE_MESSAGE","content":{{"chat_type":"project","chat_id":50,"message_id":{message_id}}}}}"#
        );
        h.engine.handle_frame(&ctx2, &delete).await;
        assert!(
            frames(&mut rx2)[0]["error"]
                .as_str()
                .unwrap()
                .contains("UserNotMessageAuthor")
        );
        assert!(!h.db.get_message(message_id).unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn delete_event_reaches_exactly_the_chat_members() {
        let h = harness();
        seed(&h);
        let (ctx1, mut rx1) = connect_member(&h, 1);
        let (_ctx2, mut rx2) = connect_member(&h, 2);
        let (_ctx3, mut rx3) = h.connect(3);

        h.engine.handle_frame(&ctx1, &new_message("oops")).await;
        let message_id = frames(&mut rx1)[0]["content"]["message"]["id"]
            .as_i64()
            .unwrap();
        frames(&mut rx2);

        let delete = format!(
            r#"{{"type":"DELETE_MESSAGE","content":{{"chat_type":"project","chat_id":50,"message_id":{message_id}}}}}"#
        );
        h.engine.handle_frame(&ctx1, &delete).await;

        for rx in [&mut rx1, &mut rx2] {
            let got = frames(rx);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0]["type"], "DELETE_MESSAGE");
            assert_eq!(got[0]["content"]["message_id"].as_i64().unwrap(), message_id);
        }
        assert!(frames(&mut rx3).is_empty());
        assert!(h.db.get_message(message_id).unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn read_requires_someone_elses_message() {
        let h = harness();
        seed(&h);
        let (ctx1, mut rx1) = connect_member(&h, 1);
        let (ctx2, mut rx2) = connect_member(&h, 2);

        h.engine.handle_frame(&ctx1, &new_message("read me")).await;
        let message_id = frames(&mut rx1)[0]["content"]["message"]["id"]
            .as_i64()
            .unwrap();
        frames(&mut rx2);

        // The author cannot mark their own message.
        let read = format!(
            r#"{{"type":"READ_MESSAGE","content":{{"chat_type":"project","chat_id":50,"message_id":{message_id}}}}}"#
        );
        h.engine.handle_frame(&ctx1, &read).await;
        assert!(
            frames(&mut rx1)[0]["error"]
                .as_str()
                .unwrap()
                .contains("WrongChatId")
        );

        // A fellow member can.
        h.engine.handle_frame(&ctx2, &read).await;
        assert!(h.db.get_message(message_id).unwrap().unwrap().is_read);
        assert_eq!(frames(&mut rx2)[0]["type"], "READ_MESSAGE");
    }

    #[tokio::test]
    async fn wrong_chat_id_on_cross_chat_message() {
        let h = harness();
        seed(&h);
        h.db.create_project(11, "borealis", 1).unwrap();
        h.db.create_project_chat(51, 11).unwrap();
        let (ctx, mut rx) = connect_member(&h, 1);

        h.engine.handle_frame(&ctx, &new_message("in 50")).await;
        let message_id = frames(&mut rx)[0]["content"]["message"]["id"]
            .as_i64()
            .unwrap();

        // Target the message through the other project's chat.
        let edit = format!(
            r#"{{"type":"EDIT_MESSAGE","content":{{"chat_type":"project","chat_id":51,"message_id":{message_id},"text":"x"}}}}"#
        );
        h.engine.handle_frame(&ctx, &edit).await;
        assert!(
            frames(&mut rx)[0]["error"]
                .as_str()
                .unwrap()
                .contains("WrongChatId")
        );
    }
}
