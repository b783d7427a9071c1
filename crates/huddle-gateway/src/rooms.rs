use std::sync::Arc;

use tracing::debug;

use huddle_db::models::ProjectMembership;

use crate::broker::Broker;

/// Every chat connection is subscribed here; presence transitions fan out to it.
pub const GENERAL_ROOM: &str = "general";

pub fn chat_room(chat_id: &str) -> String {
    format!("chats:{chat_id}")
}

pub fn kanban_room(project_id: i64) -> String {
    format!("kanban:{project_id}")
}

/// Membership-change directive produced when the surrounding platform adds or
/// removes a collaborator (or deletes a project). Applying one is idempotent.
#[derive(Debug, Clone)]
pub enum MembershipDirective {
    Join {
        channel: String,
        project_id: i64,
        chat_id: Option<i64>,
    },
    Leave {
        channel: String,
        project_id: i64,
        chat_id: Option<i64>,
    },
}

/// Computes and maintains the set of rooms a connection is entitled to.
#[derive(Clone)]
pub struct GroupRouter {
    broker: Arc<dyn Broker>,
}

impl GroupRouter {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// On chat connect: the general room plus one chat room per project the
    /// user belongs to.
    pub fn subscribe_chat(&self, channel: &str, memberships: &[ProjectMembership]) {
        self.broker.group_add(GENERAL_ROOM, channel);
        for membership in memberships {
            if let Some(chat_id) = membership.chat_id {
                self.broker
                    .group_add(&chat_room(&chat_id.to_string()), channel);
            }
        }
        debug!(channel, projects = memberships.len(), "chat rooms subscribed");
    }

    /// On kanban connect: one kanban room per project the user belongs to.
    pub fn subscribe_kanban(&self, channel: &str, memberships: &[ProjectMembership]) {
        for membership in memberships {
            self.broker
                .group_add(&kanban_room(membership.project_id), channel);
        }
        debug!(
            channel,
            projects = memberships.len(),
            "kanban rooms subscribed"
        );
    }

    pub fn apply(&self, directive: &MembershipDirective) {
        match directive {
            MembershipDirective::Join {
                channel,
                project_id,
                chat_id,
            } => {
                if let Some(chat_id) = chat_id {
                    self.broker
                        .group_add(&chat_room(&chat_id.to_string()), channel);
                }
                self.broker.group_add(&kanban_room(*project_id), channel);
            }
            MembershipDirective::Leave {
                channel,
                project_id,
                chat_id,
            } => {
                if let Some(chat_id) = chat_id {
                    self.broker
                        .group_discard(&chat_room(&chat_id.to_string()), channel);
                }
                self.broker
                    .group_discard(&kanban_room(*project_id), channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InProcessBroker, OutboundFrame};

    fn membership(project_id: i64, chat_id: Option<i64>) -> ProjectMembership {
        ProjectMembership {
            project_id,
            chat_id,
        }
    }

    #[tokio::test]
    async fn chat_connect_joins_general_and_project_chats() {
        let broker = Arc::new(InProcessBroker::new());
        let router = GroupRouter::new(broker.clone());
        let mut rx = broker.register("c1");

        router.subscribe_chat("c1", &[membership(10, Some(50)), membership(11, None)]);

        broker.group_send(GENERAL_ROOM, &OutboundFrame::error("general"));
        broker.group_send(&chat_room("50"), &OutboundFrame::error("chat"));
        // No chat row yet for project 11, so no room either.
        broker.group_send(&chat_room("51"), &OutboundFrame::error("missing"));
        // Chat connections do not receive kanban traffic.
        broker.group_send(&kanban_room(10), &OutboundFrame::error("kanban"));

        let mut received = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            if let crate::broker::Delivery::Frame(frame) = delivery {
                received.push(frame.text);
            }
        }
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("general"));
        assert!(received[1].contains("chat"));
    }

    #[tokio::test]
    async fn directives_are_idempotent() {
        let broker = Arc::new(InProcessBroker::new());
        let router = GroupRouter::new(broker.clone());
        let mut rx = broker.register("c1");

        let join = MembershipDirective::Join {
            channel: "c1".into(),
            project_id: 10,
            chat_id: Some(50),
        };
        router.apply(&join);
        router.apply(&join);

        broker.group_send(&chat_room("50"), &OutboundFrame::error("once"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        let leave = MembershipDirective::Leave {
            channel: "c1".into(),
            project_id: 10,
            chat_id: Some(50),
        };
        router.apply(&leave);
        router.apply(&leave);

        broker.group_send(&chat_room("50"), &OutboundFrame::error("silence"));
        broker.group_send(&kanban_room(10), &OutboundFrame::error("silence"));
        assert!(rx.try_recv().is_err());
    }
}
