use crate::models::{ChatRow, MemberRow, MessageRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str = "id, username, password, display_name, created_at, last_seen";
const CHAT_COLUMNS: &str = "id, name, is_group, creator_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str, display_name: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, display_name) VALUES (?1, ?2, ?3)",
                (username, password_hash, display_name),
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("User {} vanished after insert", id))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY username ASC LIMIT ?1 OFFSET ?2",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update whichever fields are `Some`. Returns `None` if the user does not exist.
    pub fn update_user(
        &self,
        id: i64,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET display_name = COALESCE(?2, display_name),
                     password = COALESCE(?3, password)
                 WHERE id = ?1",
                params![id, display_name, password_hash],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    /// Stamp `last_seen` with the current time and return it.
    pub fn touch_last_seen(&self, id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET last_seen = datetime('now') WHERE id = ?1",
                [id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row("SELECT last_seen FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()
        })
    }

    // -- Chats --

    pub fn create_chat(&self, name: &str, is_group: bool, creator_id: i64) -> Result<ChatRow> {
        self.with_conn(|conn| insert_chat(conn, name, is_group, creator_id))
    }

    pub fn get_chat(&self, id: i64) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat_by_id(conn, id))
    }

    /// Chats the user belongs to, most recently updated first.
    pub fn list_chats_for_user(&self, user_id: i64, limit: u32, offset: u32) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.is_group, c.creator_id, c.created_at, c.updated_at
                 FROM chats c
                 JOIN chat_members m ON m.chat_id = c.id
                 WHERE m.user_id = ?1
                 ORDER BY c.updated_at DESC, c.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit, offset], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rename_chat(&self, id: i64, name: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chats SET name = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![id, name],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_chat_by_id(conn, id)
        })
    }

    /// Delete a chat. Memberships and messages go with it (ON DELETE CASCADE).
    pub fn delete_chat(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| remove_chat(conn, id))
    }

    // -- Memberships --

    /// Fails if the (chat, user) pair already has a membership.
    pub fn add_member(&self, chat_id: i64, user_id: i64, is_admin: bool) -> Result<MemberRow> {
        self.with_conn(|conn| insert_member(conn, chat_id, user_id, is_admin))
    }

    pub fn get_member(&self, chat_id: i64, user_id: i64) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, chat_id, user_id))
    }

    pub fn member_exists(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM chat_members WHERE chat_id = ?1 AND user_id = ?2)",
                [chat_id, user_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn list_members(&self, chat_id: i64) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_id, m.user_id, u.username, m.is_admin, m.joined_at
                 FROM chat_members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.chat_id = ?1
                 ORDER BY m.joined_at ASC, m.id ASC",
            )?;
            let rows = stmt
                .query_map([chat_id], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn remove_member(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
                [chat_id, user_id],
            )?;
            Ok(removed > 0)
        })
    }

    // -- Messages --

    pub fn create_message(&self, chat_id: i64, sender_id: i64, content: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (chat_id, sender_id, content) VALUES (?1, ?2, ?3)",
                params![chat_id, sender_id, content],
            )?;
            let id = conn.last_insert_rowid();
            query_message_by_id(conn, id)?
                .ok_or_else(|| anyhow!("Message {} vanished after insert", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message_by_id(conn, id))
    }

    /// Messages in a chat, newest first.
    pub fn list_messages(&self, chat_id: i64, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE chat_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![chat_id, limit, offset], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_message(&self, id: i64, content: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET content = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![id, content],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_message_by_id(conn, id)
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }
}

// Connection-level writes, for callers that compose several steps inside one
// `Database::with_conn` call.

pub fn insert_chat(conn: &Connection, name: &str, is_group: bool, creator_id: i64) -> Result<ChatRow> {
    conn.execute(
        "INSERT INTO chats (name, is_group, creator_id) VALUES (?1, ?2, ?3)",
        params![name, is_group, creator_id],
    )?;
    let id = conn.last_insert_rowid();
    query_chat_by_id(conn, id)?.ok_or_else(|| anyhow!("Chat {} vanished after insert", id))
}

/// Fails if the (chat, user) pair already has a membership.
pub fn insert_member(conn: &Connection, chat_id: i64, user_id: i64, is_admin: bool) -> Result<MemberRow> {
    conn.execute(
        "INSERT INTO chat_members (chat_id, user_id, is_admin) VALUES (?1, ?2, ?3)",
        params![chat_id, user_id, is_admin],
    )?;
    query_member(conn, chat_id, user_id)?
        .ok_or_else(|| anyhow!("Membership ({}, {}) vanished after insert", chat_id, user_id))
}

pub fn remove_chat(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM chats WHERE id = ?1", [id])? > 0)
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], user_from_row).optional()
}

fn query_chat_by_id(conn: &Connection, id: i64) -> Result<Option<ChatRow>> {
    let sql = format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS);
    conn.query_row(&sql, [id], chat_from_row).optional()
}

fn query_member(conn: &Connection, chat_id: i64, user_id: i64) -> Result<Option<MemberRow>> {
    conn.query_row(
        "SELECT m.id, m.chat_id, m.user_id, u.username, m.is_admin, m.joined_at
         FROM chat_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.chat_id = ?1 AND m.user_id = ?2",
        [chat_id, user_id],
        member_from_row,
    )
    .optional()
}

fn query_message_by_id(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    conn.query_row(&sql, [id], message_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        created_at: row.get(4)?,
        last_seen: row.get(5)?,
    })
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_group: row.get(2)?,
        creator_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        is_admin: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
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

    fn db_with_users(names: &[&str]) -> (Database, Vec<i64>) {
        let db = Database::open_in_memory().unwrap();
        let ids = names
            .iter()
            .map(|name| db.create_user(name, "$argon2id$stub", name).unwrap().id)
            .collect();
        (db, ids)
    }

    #[test]
    fn missing_rows_are_none_not_errors() {
        let (db, _) = db_with_users(&[]);
        assert!(db.get_user_by_id(99).unwrap().is_none());
        assert!(db.get_chat(99).unwrap().is_none());
        assert!(db.get_member(99, 99).unwrap().is_none());
        assert!(db.get_message(99).unwrap().is_none());
        assert!(db.rename_chat(99, "x").unwrap().is_none());
        assert!(!db.delete_chat(99).unwrap());
        assert!(!db.user_exists(99).unwrap());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (db, _) = db_with_users(&["alice"]);
        let err = db.create_user("alice", "$argon2id$other", "").unwrap_err();
        assert!(crate::is_unique_violation(&err));

        let missing_creator = db.create_chat("team", true, 404).unwrap_err();
        assert!(!crate::is_unique_violation(&missing_creator));
    }

    #[test]
    fn membership_is_unique_per_chat() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let chat = db.create_chat("general", true, ids[0]).unwrap();

        db.add_member(chat.id, ids[1], false).unwrap();
        assert!(db.add_member(chat.id, ids[1], true).is_err());

        let member = db.get_member(chat.id, ids[1]).unwrap().unwrap();
        assert!(!member.is_admin);
        assert_eq!(member.username, "bob");
    }

    #[test]
    fn deleting_chat_cascades() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let chat = db.create_chat("general", true, ids[0]).unwrap();
        db.add_member(chat.id, ids[0], true).unwrap();
        db.add_member(chat.id, ids[1], false).unwrap();
        let message = db.create_message(chat.id, ids[1], "hi").unwrap();

        assert!(db.delete_chat(chat.id).unwrap());
        assert!(!db.member_exists(chat.id, ids[0]).unwrap());
        assert!(db.get_message(message.id).unwrap().is_none());
    }

    #[test]
    fn update_user_touches_only_given_fields() {
        let (db, ids) = db_with_users(&["alice"]);
        let updated = db.update_user(ids[0], Some("Alice A."), None).unwrap().unwrap();
        assert_eq!(updated.display_name, "Alice A.");
        assert_eq!(updated.password, "$argon2id$stub");

        let updated = db.update_user(ids[0], None, Some("$argon2id$new")).unwrap().unwrap();
        assert_eq!(updated.display_name, "Alice A.");
        assert_eq!(updated.password, "$argon2id$new");
    }

    #[test]
    fn chats_listed_only_for_members() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let chat = db.create_chat("general", true, ids[0]).unwrap();
        db.add_member(chat.id, ids[0], true).unwrap();

        assert_eq!(db.list_chats_for_user(ids[0], 50, 0).unwrap().len(), 1);
        assert!(db.list_chats_for_user(ids[1], 50, 0).unwrap().is_empty());
    }

    #[test]
    fn messages_listed_newest_first() {
        let (db, ids) = db_with_users(&["alice"]);
        let chat = db.create_chat("notes", false, ids[0]).unwrap();
        let first = db.create_message(chat.id, ids[0], "one").unwrap();
        let second = db.create_message(chat.id, ids[0], "two").unwrap();

        let listed: Vec<i64> = db.list_messages(chat.id, 50, 0).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);
        assert_eq!(db.list_messages(chat.id, 1, 1).unwrap()[0].id, first.id);
    }
}
