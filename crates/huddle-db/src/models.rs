/// Database row types — these map directly to SQLite rows.
/// Distinct from huddle-types wire models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
}

pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
}

/// One project the user belongs to (as leader or collaborator), with the id
/// of its chat if the chat row exists yet.
pub struct ProjectMembership {
    pub project_id: i64,
    pub chat_id: Option<i64>,
}

pub struct DirectChatRow {
    pub id: String,
}

pub struct ProjectChatRow {
    pub id: i64,
    pub project_id: i64,
}

#[derive(Clone)]
pub struct MessageRow {
    pub id: i64,
    pub chat_id: String,
    pub chat_kind: String,
    pub author_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub is_read: bool,
}

/// Partial update for a message row; `None` fields keep their current value.
#[derive(Default)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub edited_at: Option<String>,
    pub is_edited: Option<bool>,
    pub is_deleted: Option<bool>,
    pub is_read: Option<bool>,
}

pub struct BoardRow {
    pub id: i64,
    pub project_id: i64,
}

#[derive(Debug)]
pub struct BoardColumnRow {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub ord: i64,
    pub tasks_count: i64,
}
