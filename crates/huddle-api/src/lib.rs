pub mod board;
pub mod middleware;

use std::sync::Arc;

use huddle_chat::KanbanBroadcaster;
use huddle_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub kanban: KanbanBroadcaster,
    pub jwt_secret: String,
}
