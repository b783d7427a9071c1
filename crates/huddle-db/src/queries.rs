use crate::Database;
use crate::models::{
    BoardColumnRow, BoardRow, DirectChatRow, MessagePatch, MessageRow, ProjectChatRow,
    ProjectMembership, ProjectRow, UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior};

/// Offset applied during phase A of the two-phase renumber. Lifts every
/// column clear of the live 1..n range so UNIQUE(board_id, ord) holds
/// through the rewrite.
const RENUMBER_OFFSET: i64 = 1000;

/// Column mutations that fail for domain reasons rather than storage ones.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColumnError {
    #[error("a board must keep at least one column")]
    LastColumn,
    #[error("column name already in use on this board")]
    DuplicateName,
    #[error("column not found")]
    NotFound,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: i64, username: &str, is_active: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, is_active) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, username, is_active],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, is_active FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Projects --

    pub fn create_project(&self, id: i64, name: &str, leader_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, leader_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, leader_id],
            )?;
            Ok(())
        })
    }

    pub fn get_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, leader_id FROM projects WHERE id = ?1",
                [id],
                |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        leader_id: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn add_collaborator(&self, project_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO project_collaborators (project_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![project_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn remove_collaborator(&self, project_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM project_collaborators WHERE project_id = ?1 AND user_id = ?2",
                rusqlite::params![project_id, user_id],
            )?;
            Ok(())
        })
    }

    /// True when the user is the project's leader or one of its collaborators.
    pub fn is_project_member(&self, project_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1 AND leader_id = ?2)
                     OR EXISTS(SELECT 1 FROM project_collaborators
                               WHERE project_id = ?1 AND user_id = ?2)",
                rusqlite::params![project_id, user_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }

    /// Every project where the user is leader or collaborator, with the id of
    /// the project's chat when one exists. Drives room entitlement on connect.
    pub fn list_collaborator_projects(&self, user_id: i64) -> Result<Vec<ProjectMembership>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, pc.id
                 FROM projects p
                 LEFT JOIN project_chats pc ON pc.project_id = p.id
                 WHERE p.leader_id = ?1
                    OR EXISTS (SELECT 1 FROM project_collaborators c
                               WHERE c.project_id = p.id AND c.user_id = ?1)
                 ORDER BY p.id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ProjectMembership {
                        project_id: row.get(0)?,
                        chat_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Chats --

    pub fn get_direct_chat(&self, id: &str) -> Result<Option<DirectChatRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM direct_chats WHERE id = ?1",
                [id],
                |row| Ok(DirectChatRow { id: row.get(0)? }),
            )
            .optional()
        })
    }

    /// Create the chat row for an unordered user pair. The canonical
    /// `min_max` id is computed here, so both orderings land on one row.
    pub fn create_direct_chat(&self, user_a: i64, user_b: i64) -> Result<DirectChatRow> {
        let id = format!("{}_{}", user_a.min(user_b), user_a.max(user_b));
        self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO direct_chats (id) VALUES (?1)", [&id])?;
            Ok(DirectChatRow { id: id.clone() })
        })
    }

    pub fn create_project_chat(&self, id: i64, project_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO project_chats (id, project_id) VALUES (?1, ?2)",
                rusqlite::params![id, project_id],
            )?;
            Ok(())
        })
    }

    pub fn get_project_chat(&self, id: i64) -> Result<Option<ProjectChatRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, project_id FROM project_chats WHERE id = ?1",
                [id],
                |row| {
                    Ok(ProjectChatRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Messages --

    pub fn create_message(
        &self,
        chat_id: &str,
        chat_kind: &str,
        author_id: i64,
        text: &str,
        reply_to_id: Option<i64>,
        created_at: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (chat_id, chat_kind, author_id, text, reply_to_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![chat_id, chat_kind, author_id, text, reply_to_id, created_at],
            )?;

            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                chat_id: chat_id.to_string(),
                chat_kind: chat_kind.to_string(),
                author_id,
                text: text.to_string(),
                reply_to_id,
                created_at: created_at.to_string(),
                edited_at: None,
                is_edited: false,
                is_deleted: false,
                is_read: false,
            })
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Patch a single message row; `None` fields are left untouched.
    pub fn update_message(&self, id: i64, patch: &MessagePatch) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET
                     text       = COALESCE(?2, text),
                     edited_at  = COALESCE(?3, edited_at),
                     is_edited  = COALESCE(?4, is_edited),
                     is_deleted = COALESCE(?5, is_deleted),
                     is_read    = COALESCE(?6, is_read)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.text,
                    patch.edited_at,
                    patch.is_edited,
                    patch.is_deleted,
                    patch.is_read
                ],
            )?;
            if updated == 0 {
                anyhow::bail!("message {} not found", id);
            }
            Ok(())
        })
    }

    // -- Boards --

    /// Boards are seeded with one column because a board may never be empty.
    pub fn create_board(&self, id: i64, project_id: i64, first_column: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO boards (id, project_id) VALUES (?1, ?2)",
                rusqlite::params![id, project_id],
            )?;
            conn.execute(
                "INSERT INTO board_columns (board_id, name, ord) VALUES (?1, ?2, 1)",
                rusqlite::params![id, first_column],
            )?;
            Ok(())
        })
    }

    pub fn get_board(&self, id: i64) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, project_id FROM boards WHERE id = ?1",
                [id],
                |row| {
                    Ok(BoardRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_board_by_project(&self, project_id: i64) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, project_id FROM boards WHERE project_id = ?1",
                [project_id],
                |row| {
                    Ok(BoardRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_board_column(&self, id: i64) -> Result<Option<BoardColumnRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id, c.board_id, c.name, c.ord, COUNT(t.id)
                 FROM board_columns c
                 LEFT JOIN tasks t ON t.column_id = c.id
                 WHERE c.id = ?1
                 GROUP BY c.id",
                [id],
                |row| {
                    Ok(BoardColumnRow {
                        id: row.get(0)?,
                        board_id: row.get(1)?,
                        name: row.get(2)?,
                        ord: row.get(3)?,
                        tasks_count: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn list_board_columns(&self, board_id: i64) -> Result<Vec<BoardColumnRow>> {
        self.with_conn(|conn| query_board_columns(conn, board_id))
    }

    /// Append a column at the end of the board.
    pub fn create_board_column(&self, board_id: i64, name: &str) -> Result<BoardColumnRow> {
        self.with_conn(|conn| {
            let next_ord: i64 = conn.query_row(
                "SELECT COALESCE(MAX(ord), 0) + 1 FROM board_columns WHERE board_id = ?1",
                [board_id],
                |row| row.get(0),
            )?;

            conn.execute(
                "INSERT INTO board_columns (board_id, name, ord) VALUES (?1, ?2, ?3)",
                rusqlite::params![board_id, name, next_ord],
            )
            .map_err(map_column_constraint)?;

            Ok(BoardColumnRow {
                id: conn.last_insert_rowid(),
                board_id,
                name: name.to_string(),
                ord: next_ord,
                tasks_count: 0,
            })
        })
    }

    pub fn rename_board_column(&self, id: i64, name: &str) -> Result<BoardColumnRow> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE board_columns SET name = ?2 WHERE id = ?1",
                    rusqlite::params![id, name],
                )
                .map_err(map_column_constraint)?;
            if updated == 0 {
                return Err(ColumnError::NotFound.into());
            }

            conn.query_row(
                "SELECT c.id, c.board_id, c.name, c.ord, COUNT(t.id)
                 FROM board_columns c
                 LEFT JOIN tasks t ON t.column_id = c.id
                 WHERE c.id = ?1
                 GROUP BY c.id",
                [id],
                |row| {
                    Ok(BoardColumnRow {
                        id: row.get(0)?,
                        board_id: row.get(1)?,
                        name: row.get(2)?,
                        ord: row.get(3)?,
                        tasks_count: row.get(4)?,
                    })
                },
            )
            .map_err(Into::into)
        })
    }

    /// Delete a column and close the gap it leaves. Refuses to remove the
    /// last column of a board.
    pub fn delete_board_column(&self, id: i64) -> Result<Vec<BoardColumnRow>> {
        self.with_conn_mut(|conn| {
            let board_id: i64 = {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let board_id: i64 = tx
                    .query_row(
                        "SELECT board_id FROM board_columns WHERE id = ?1",
                        [id],
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or(ColumnError::NotFound)?;

                let total: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM board_columns WHERE board_id = ?1",
                    [board_id],
                    |row| row.get(0),
                )?;
                if total <= 1 {
                    return Err(ColumnError::LastColumn.into());
                }

                tx.execute("DELETE FROM tasks WHERE column_id = ?1", [id])?;
                tx.execute("DELETE FROM board_columns WHERE id = ?1", [id])?;

                let survivors = ordered_column_ids(&tx, board_id)?;
                apply_orders(&tx, &survivors, RENUMBER_OFFSET)?;
                tx.commit()?;
                board_id
            };

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let survivors = ordered_column_ids(&tx, board_id)?;
            apply_orders(&tx, &survivors, 0)?;
            tx.commit()?;

            query_board_columns(conn, board_id)
        })
    }

    /// Move a column to a 1-based target index, clamped to the column count.
    ///
    /// The unique (board_id, ord) constraint holds through the rewrite via
    /// the two-phase renumber: every column is first lifted to a temporary
    /// order above the live range, committed, then assigned its final 1..n
    /// order. Requesting the column's current index is a no-op.
    pub fn reorder_board_columns(
        &self,
        board_id: i64,
        column_id: i64,
        new_order: i64,
    ) -> Result<Vec<BoardColumnRow>> {
        self.with_conn_mut(|conn| {
            {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let mut ids = ordered_column_ids(&tx, board_id)?;
                let pos = ids
                    .iter()
                    .position(|&cid| cid == column_id)
                    .ok_or(ColumnError::NotFound)?;

                let target = new_order.clamp(1, ids.len() as i64) as usize - 1;
                if target == pos {
                    return query_board_columns(&tx, board_id);
                }

                let moved = ids.remove(pos);
                ids.insert(target, moved);

                apply_orders(&tx, &ids, RENUMBER_OFFSET)?;
                tx.commit()?;
            }

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ids = ordered_column_ids(&tx, board_id)?;
            apply_orders(&tx, &ids, 0)?;
            tx.commit()?;

            query_board_columns(conn, board_id)
        })
    }
}

/// Column ids of a board in their current visual order.
fn ordered_column_ids(conn: &Connection, board_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM board_columns WHERE board_id = ?1 ORDER BY ord, id")?;
    let ids = stmt
        .query_map([board_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Write `offset + idx` (1-based) as the order of each column, in slice order.
fn apply_orders(conn: &Connection, ids: &[i64], offset: i64) -> Result<()> {
    for (i, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE board_columns SET ord = ?2 WHERE id = ?1",
            rusqlite::params![id, offset + i as i64 + 1],
        )?;
    }
    Ok(())
}

fn query_board_columns(conn: &Connection, board_id: i64) -> Result<Vec<BoardColumnRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.board_id, c.name, c.ord, COUNT(t.id)
         FROM board_columns c
         LEFT JOIN tasks t ON t.column_id = c.id
         WHERE c.board_id = ?1
         GROUP BY c.id
         ORDER BY c.ord, c.id",
    )?;

    let rows = stmt
        .query_map([board_id], |row| {
            Ok(BoardColumnRow {
                id: row.get(0)?,
                board_id: row.get(1)?,
                name: row.get(2)?,
                ord: row.get(3)?,
                tasks_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, chat_id, chat_kind, author_id, text, reply_to_id,
                created_at, edited_at, is_edited, is_deleted, is_read
         FROM messages WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                chat_kind: row.get(2)?,
                author_id: row.get(3)?,
                text: row.get(4)?,
                reply_to_id: row.get(5)?,
                created_at: row.get(6)?,
                edited_at: row.get(7)?,
                is_edited: row.get(8)?,
                is_deleted: row.get(9)?,
                is_read: row.get(10)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Map a UNIQUE(board_id, name) violation to its domain error.
fn map_column_constraint(e: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return ColumnError::DuplicateName.into();
        }
    }
    e.into()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("huddle.db")).unwrap();
        (dir, db)
    }

    fn seed_board(db: &Database, names: &[&str]) -> i64 {
        db.create_user(1, "lena", true).unwrap();
        db.create_project(10, "atlas", 1).unwrap();
        db.create_board(100, 10, names[0]).unwrap();
        for name in &names[1..] {
            db.create_board_column(100, name).unwrap();
        }
        100
    }

    fn order_names(db: &Database, board_id: i64) -> Vec<(i64, String)> {
        db.list_board_columns(board_id)
            .unwrap()
            .into_iter()
            .map(|c| (c.ord, c.name))
            .collect()
    }

    #[test]
    fn direct_chat_is_canonical_for_both_orderings() {
        let (_dir, db) = test_db();
        let ab = db.create_direct_chat(2, 1).unwrap();
        let ba = db.create_direct_chat(1, 2).unwrap();
        assert_eq!(ab.id, "1_2");
        assert_eq!(ba.id, "1_2");
        assert!(db.get_direct_chat("1_2").unwrap().is_some());
    }

    #[test]
    fn message_create_and_patch() {
        let (_dir, db) = test_db();
        db.create_user(1, "lena", true).unwrap();
        db.create_direct_chat(1, 1).unwrap();

        let msg = db
            .create_message("1_1", "direct", 1, "hello", None, "2026-08-07T10:00:00Z")
            .unwrap();
        assert!(!msg.is_edited && !msg.is_deleted && !msg.is_read);

        db.update_message(
            msg.id,
            &MessagePatch {
                text: Some("hi".into()),
                edited_at: Some("2026-08-07T10:01:00Z".into()),
                is_edited: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let row = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(row.text, "hi");
        assert!(row.is_edited);
        assert!(row.edited_at.is_some());
        // Untouched fields survive the patch.
        assert!(!row.is_deleted && !row.is_read);
    }

    #[test]
    fn update_missing_message_fails() {
        let (_dir, db) = test_db();
        let err = db
            .update_message(999, &MessagePatch::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn membership_covers_leader_and_collaborators() {
        let (_dir, db) = test_db();
        db.create_user(1, "lena", true).unwrap();
        db.create_user(2, "marc", true).unwrap();
        db.create_user(3, "outsider", true).unwrap();
        db.create_project(10, "atlas", 1).unwrap();
        db.add_collaborator(10, 2).unwrap();
        db.create_project_chat(50, 10).unwrap();

        assert!(db.is_project_member(10, 1).unwrap());
        assert!(db.is_project_member(10, 2).unwrap());
        assert!(!db.is_project_member(10, 3).unwrap());

        let projects = db.list_collaborator_projects(2).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project_id, 10);
        assert_eq!(projects[0].chat_id, Some(50));

        db.remove_collaborator(10, 2).unwrap();
        assert!(db.list_collaborator_projects(2).unwrap().is_empty());
    }

    #[test]
    fn reorder_moves_column_to_front() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B", "C"]);

        let c_id = db
            .list_board_columns(board)
            .unwrap()
            .into_iter()
            .find(|c| c.name == "C")
            .unwrap()
            .id;

        let cols = db.reorder_board_columns(board, c_id, 1).unwrap();
        let got: Vec<(i64, String)> = cols.into_iter().map(|c| (c.ord, c.name)).collect();
        assert_eq!(
            got,
            vec![(1, "C".into()), (2, "A".into()), (3, "B".into())]
        );
    }

    #[test]
    fn reorder_clamps_out_of_range_targets() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B", "C"]);
        let a_id = db.list_board_columns(board).unwrap()[0].id;

        db.reorder_board_columns(board, a_id, 99).unwrap();
        assert_eq!(
            order_names(&db, board),
            vec![(1, "B".into()), (2, "C".into()), (3, "A".into())]
        );

        db.reorder_board_columns(board, a_id, -5).unwrap();
        assert_eq!(
            order_names(&db, board),
            vec![(1, "A".into()), (2, "B".into()), (3, "C".into())]
        );
    }

    #[test]
    fn reorder_to_current_index_is_a_noop() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B", "C"]);
        let b_id = db.list_board_columns(board).unwrap()[1].id;

        let cols = db.reorder_board_columns(board, b_id, 2).unwrap();
        let got: Vec<(i64, String)> = cols.into_iter().map(|c| (c.ord, c.name)).collect();
        assert_eq!(
            got,
            vec![(1, "A".into()), (2, "B".into()), (3, "C".into())]
        );
    }

    #[test]
    fn orders_stay_a_permutation_across_moves() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B", "C", "D", "E"]);
        let ids: Vec<i64> = db
            .list_board_columns(board)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();

        for (column, target) in [(ids[4], 1), (ids[0], 3), (ids[2], 5), (ids[1], 2)] {
            db.reorder_board_columns(board, column, target).unwrap();
            let mut orders: Vec<i64> = db
                .list_board_columns(board)
                .unwrap()
                .into_iter()
                .map(|c| c.ord)
                .collect();
            orders.sort_unstable();
            assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn delete_refuses_last_column_and_renumbers_otherwise() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B", "C"]);
        let cols = db.list_board_columns(board).unwrap();

        let remaining = db.delete_board_column(cols[1].id).unwrap();
        let got: Vec<(i64, String)> = remaining.into_iter().map(|c| (c.ord, c.name)).collect();
        assert_eq!(got, vec![(1, "A".into()), (2, "C".into())]);

        db.delete_board_column(cols[0].id).unwrap();
        let last = db.list_board_columns(board).unwrap()[0].id;
        let err = db.delete_board_column(last).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ColumnError>(),
            Some(&ColumnError::LastColumn)
        );
    }

    #[test]
    fn duplicate_column_name_is_a_domain_error() {
        let (_dir, db) = test_db();
        let board = seed_board(&db, &["A", "B"]);

        let err = db.create_board_column(board, "A").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ColumnError>(),
            Some(&ColumnError::DuplicateName)
        );

        let b_id = db.list_board_columns(board).unwrap()[1].id;
        let err = db.rename_board_column(b_id, "A").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ColumnError>(),
            Some(&ColumnError::DuplicateName)
        );
    }
}
