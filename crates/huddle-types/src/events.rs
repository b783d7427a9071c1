use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChatKind, ColumnBody, MessageBody};

/// Raw inbound frame. The event type is matched by name so that an unknown
/// type can be told apart from a known type with a malformed payload: the
/// former closes the connection, the latter only produces an error frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// The closed set of inbound event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewMessage,
    EditMessage,
    DeleteMessage,
    ReadMessage,
    Typing,
    SetOnline,
    SetOffline,
}

impl EventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW_MESSAGE" => Some(Self::NewMessage),
            "EDIT_MESSAGE" => Some(Self::EditMessage),
            "DELETE_MESSAGE" => Some(Self::DeleteMessage),
            "READ_MESSAGE" => Some(Self::ReadMessage),
            "TYPING" => Some(Self::Typing),
            "SET_ONLINE" => Some(Self::SetOnline),
            "SET_OFFLINE" => Some(Self::SetOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "NEW_MESSAGE",
            Self::EditMessage => "EDIT_MESSAGE",
            Self::DeleteMessage => "DELETE_MESSAGE",
            Self::ReadMessage => "READ_MESSAGE",
            Self::Typing => "TYPING",
            Self::SetOnline => "SET_ONLINE",
            Self::SetOffline => "SET_OFFLINE",
        }
    }
}

/// Events sent from the server to connected clients, in the same
/// `{type, content}` shape clients use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ServerEvent {
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage {
        chat_type: ChatKind,
        chat_id: String,
        message: MessageBody,
    },

    #[serde(rename = "EDIT_MESSAGE")]
    EditMessage {
        chat_type: ChatKind,
        chat_id: String,
        message: MessageBody,
    },

    #[serde(rename = "DELETE_MESSAGE")]
    DeleteMessage {
        chat_type: ChatKind,
        chat_id: String,
        message_id: i64,
    },

    #[serde(rename = "READ_MESSAGE")]
    ReadMessage {
        chat_type: ChatKind,
        chat_id: String,
        message_id: i64,
    },

    /// Ephemeral typing indicator; `end_time` is when clients should stop
    /// showing it. Never persisted.
    #[serde(rename = "TYPING")]
    Typing {
        chat_type: ChatKind,
        chat_id: String,
        user_id: i64,
        end_time: DateTime<Utc>,
    },

    #[serde(rename = "SET_ONLINE")]
    SetOnline { user_id: i64 },

    #[serde(rename = "SET_OFFLINE")]
    SetOffline { user_id: i64 },

    #[serde(rename = "kanban_event")]
    Kanban(KanbanEvent),
}

/// Board-change notifications fanned out to `kanban:<project_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum KanbanEvent {
    #[serde(rename = "column.created")]
    ColumnCreated {
        board_id: i64,
        project_id: i64,
        column: ColumnBody,
    },

    #[serde(rename = "column.renamed")]
    ColumnRenamed {
        board_id: i64,
        project_id: i64,
        column: ColumnBody,
    },

    #[serde(rename = "column.deleted")]
    ColumnDeleted {
        board_id: i64,
        project_id: i64,
        column_id: i64,
        columns: Vec<ColumnBody>,
    },

    #[serde(rename = "column.reordered")]
    ColumnReordered {
        board_id: i64,
        project_id: i64,
        columns: Vec<ColumnBody>,
    },
}

/// Reply frame for a failed event, sent to the originating channel only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}
