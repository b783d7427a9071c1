use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            is_active   INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS projects (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            leader_id   INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS project_collaborators (
            project_id  INTEGER NOT NULL REFERENCES projects(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            UNIQUE(project_id, user_id)
        );

        -- Direct chats are keyed by the canonical pair id 'min_max'.
        CREATE TABLE IF NOT EXISTS direct_chats (
            id          TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS project_chats (
            id          INTEGER PRIMARY KEY,
            project_id  INTEGER NOT NULL UNIQUE REFERENCES projects(id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id         TEXT NOT NULL,
            chat_kind       TEXT NOT NULL,
            author_id       INTEGER NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            reply_to_id     INTEGER REFERENCES messages(id),
            created_at      TEXT NOT NULL,
            edited_at       TEXT,
            is_edited       INTEGER NOT NULL DEFAULT 0,
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            is_read         INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS boards (
            id          INTEGER PRIMARY KEY,
            project_id  INTEGER NOT NULL UNIQUE REFERENCES projects(id)
        );

        CREATE TABLE IF NOT EXISTS board_columns (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            board_id    INTEGER NOT NULL REFERENCES boards(id),
            name        TEXT NOT NULL,
            ord         INTEGER NOT NULL,
            UNIQUE(board_id, ord),
            UNIQUE(board_id, name)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            column_id   INTEGER NOT NULL REFERENCES board_columns(id)
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_column
            ON tasks(column_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
