use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket auth gateway.
/// Canonical definition lives here to eliminate duplication. `sub` is the
/// numeric user id minted by the surrounding platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Kanban board --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateColumnRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameColumnRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorderColumnRequest {
    /// 1-based target position; clamped to the column count of the board.
    pub new_order: i64,
}

#[derive(Debug, Serialize)]
pub struct ColumnResponse {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub order: i64,
    pub tasks_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub board_id: i64,
    pub project_id: i64,
    pub columns: Vec<ColumnResponse>,
}
