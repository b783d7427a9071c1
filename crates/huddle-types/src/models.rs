use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Users are created and retired by the surrounding platform; the core only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
}

/// Which kind of conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Project,
}

impl ChatKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "project" => Some(Self::Project),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Project => "project",
        }
    }
}

/// Canonical id of a direct (1-to-1) conversation: `"min(a,b)_max(a,b)"`.
///
/// A given unordered pair of user ids maps to exactly one id, so either
/// participant can spell the id in either order. A self-chat (`a == b`) is a
/// legal conversation with a single participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectChatId {
    pub low: i64,
    pub high: i64,
}

impl DirectChatId {
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// Parse the `"a_b"` wire spelling. Does not canonicalize the order.
    pub fn parse(s: &str) -> Option<(i64, i64)> {
        let (a, b) = s.split_once('_')?;
        Some((a.parse().ok()?, b.parse().ok()?))
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The participant opposite to `user_id`; for a self-chat this is `user_id`.
    pub fn other(&self, user_id: i64) -> i64 {
        if self.low == user_id { self.high } else { self.low }
    }

    pub fn is_self_chat(&self) -> bool {
        self.low == self.high
    }
}

impl std::fmt::Display for DirectChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.low, self.high)
    }
}

/// Wire form of a stored message. Deleted messages keep their row but never
/// surface their text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub id: i64,
    pub chat_id: String,
    pub chat_kind: ChatKind,
    pub author_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub is_read: bool,
}

/// Wire form of a kanban column as carried by kanban events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBody {
    pub id: i64,
    pub order: i64,
    pub name: String,
}
